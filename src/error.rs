//! Error taxonomy for the ingestion pipeline.
//!
//! Errors split into two families. Per-file errors ([`IngestError::Decode`],
//! [`IngestError::EmptyContent`], [`IngestError::Model`],
//! [`IngestError::Write`]) are recorded in the run statistics and the batch
//! moves on. Fatal errors ([`IngestError::StoreUnavailable`],
//! [`IngestError::ModelUnavailable`], [`IngestError::CorpusMissing`]) abort the
//! run before the first file is touched.
//!
//! [`IngestError::DuplicateKey`] is neither: it is the expected outcome of
//! re-ingesting content that is already stored.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("could not decode {file} with any of: {tried}")]
    Decode { file: String, tried: String },
    #[error("{file} is empty after trimming whitespace")]
    EmptyContent { file: String },
    #[error("embedding failed: {0}")]
    Model(String),
    #[error("document {id} already stored")]
    DuplicateKey { id: String },
    #[error("write failed: {0}")]
    Write(String),
    #[error("document store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("corpus directory not found: {}", .0.display())]
    CorpusMissing(PathBuf),
    #[error("io error reading {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

impl IngestError {
    /// Process exit code for errors that stop the run before any file is
    /// processed. `None` for per-file errors.
    pub fn exit_code(&self) -> Option<u8> {
        match self {
            IngestError::CorpusMissing(_) => Some(3),
            IngestError::StoreUnavailable(_) => Some(4),
            IngestError::ModelUnavailable(_) => Some(5),
            _ => None,
        }
    }
}

pub type IngestResult<T> = Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_exit_codes() {
        assert_eq!(IngestError::CorpusMissing(PathBuf::from("/nope")).exit_code(), Some(3));
        assert_eq!(IngestError::StoreUnavailable("down".into()).exit_code(), Some(4));
        assert_eq!(IngestError::ModelUnavailable("no weights".into()).exit_code(), Some(5));
        assert_eq!(IngestError::Write("timeout".into()).exit_code(), None);
        assert_eq!(IngestError::DuplicateKey { id: "ab".into() }.exit_code(), None);
        assert_eq!(IngestError::EmptyContent { file: "a.txt".into() }.exit_code(), None);
    }

    #[test]
    fn decode_message_names_file() {
        let err = IngestError::Decode {
            file: "speech.txt".into(),
            tried: "utf-8".into(),
        };
        assert_eq!(
            err.to_string(),
            "could not decode speech.txt with any of: utf-8"
        );
    }
}

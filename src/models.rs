//! Core data types that flow through the ingestion pipeline.
//!
//! A [`CorpusFile`] is discovered by the scanner, turned into a [`Record`]
//! by the pipeline, and ends in one [`FileOutcome`].

use std::path::PathBuf;

use serde::Serialize;

use crate::fingerprint::fingerprint;

/// A file found in the corpus directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusFile {
    pub path: PathBuf,
    /// Path relative to the corpus root, used for ordering.
    pub relative: String,
    /// File name, used only for error reporting.
    pub name: String,
}

/// The persisted unit: `{ _id, text, embedding }`.
///
/// The id is derived from the text inside [`Record::new`] and cannot be set
/// any other way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    #[serde(rename = "_id")]
    id: String,
    text: String,
    embedding: Vec<f32>,
}

impl Record {
    pub fn new(text: String, embedding: Vec<f32>) -> Self {
        Self {
            id: fingerprint(&text),
            text,
            embedding,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }
}

/// Terminal state of one processed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Inserted { id: String },
    Duplicate { id: String },
    Failed { reason: String },
}

impl FileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FileOutcome::Inserted { .. } => "inserted",
            FileOutcome::Duplicate { .. } => "duplicate",
            FileOutcome::Failed { .. } => "failed",
        }
    }
}

/// A per-file failure kept for the end-of-run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub file: String,
    pub error: String,
}

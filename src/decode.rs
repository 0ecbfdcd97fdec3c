//! Text decoding with ordered encoding fallback.
//!
//! Corpus files come from many editors and eras, so a file is tried under a
//! fixed priority list of encodings and the first one that decodes wins.
//! [`decode_bytes`] is the pure core; [`read_document`] adds file I/O and the
//! error mapping the pipeline records.
//!
//! # Encodings
//!
//! | Label | Behaviour |
//! |-------|-----------|
//! | `utf-8` | strict, fails on any invalid sequence |
//! | `latin-1` | every byte maps to the code point of the same value; never fails |
//! | `iso-8859-1` | same mapping as `latin-1` |
//! | `cp1252` | Windows-1252; fails on the five unassigned bytes |
//!
//! Because `latin-1` accepts every input, anything listed after it is only
//! reached when it is removed from `[decoding].encodings`.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{IngestError, IngestResult};

/// A supported text encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum TextEncoding {
    Utf8,
    Latin1,
    Iso8859_1,
    Cp1252,
}

/// Default fallback order.
pub const DEFAULT_ENCODINGS: [TextEncoding; 4] = [
    TextEncoding::Utf8,
    TextEncoding::Latin1,
    TextEncoding::Iso8859_1,
    TextEncoding::Cp1252,
];

/// Bytes with no assigned character in Windows-1252.
const CP1252_UNDEFINED: [u8; 5] = [0x81, 0x8D, 0x8F, 0x90, 0x9D];

impl TextEncoding {
    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Iso8859_1 => "iso-8859-1",
            TextEncoding::Cp1252 => "cp1252",
        }
    }

    /// Decode `bytes` strictly. Returns `None` when the input is not valid
    /// in this encoding.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_owned),
            TextEncoding::Latin1 | TextEncoding::Iso8859_1 => {
                Some(bytes.iter().map(|&b| b as char).collect())
            }
            TextEncoding::Cp1252 => {
                if bytes.iter().any(|b| CP1252_UNDEFINED.contains(b)) {
                    return None;
                }
                encoding_rs::WINDOWS_1252
                    .decode_without_bom_handling_and_without_replacement(bytes)
                    .map(|text| text.into_owned())
            }
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "latin-1" | "latin1" => Ok(TextEncoding::Latin1),
            "iso-8859-1" | "iso8859-1" => Ok(TextEncoding::Iso8859_1),
            "cp1252" | "windows-1252" => Ok(TextEncoding::Cp1252),
            other => Err(format!(
                "Unknown encoding: '{}'. Must be utf-8, latin-1, iso-8859-1, or cp1252.",
                other
            )),
        }
    }
}

impl TryFrom<String> for TextEncoding {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Successful decode: trimmed text plus the encoding that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    pub encoding: TextEncoding,
}

/// Why [`decode_bytes`] gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeFailure {
    /// No encoding in the list accepted the bytes.
    NoEncoding { tried: Vec<TextEncoding> },
    /// An encoding matched but nothing is left after trimming.
    Empty { encoding: TextEncoding },
}

/// Try each encoding in order and return the first successful decode.
///
/// Line endings are folded to `\n` before trimming. Trimming strips Unicode
/// whitespace plus the ASCII separators U+001C..U+001F, which some exports
/// leave at the end of a file.
pub fn decode_bytes(bytes: &[u8], encodings: &[TextEncoding]) -> Result<Decoded, DecodeFailure> {
    for &encoding in encodings {
        let Some(raw) = encoding.decode(bytes) else {
            continue;
        };
        let text = trim_text(&normalize_newlines(&raw)).to_string();
        if text.is_empty() {
            return Err(DecodeFailure::Empty { encoding });
        }
        return Ok(Decoded { text, encoding });
    }
    Err(DecodeFailure::NoEncoding {
        tried: encodings.to_vec(),
    })
}

/// Read a corpus file and decode it.
pub fn read_document(path: &Path, encodings: &[TextEncoding]) -> IngestResult<Decoded> {
    let file = display_name(path);
    let bytes = std::fs::read(path).map_err(|source| IngestError::Io {
        file: file.clone(),
        source,
    })?;

    decode_bytes(&bytes, encodings).map_err(|failure| match failure {
        DecodeFailure::NoEncoding { tried } => IngestError::Decode {
            file,
            tried: tried
                .iter()
                .map(TextEncoding::label)
                .collect::<Vec<_>>()
                .join(", "),
        },
        DecodeFailure::Empty { .. } => IngestError::EmptyContent { file },
    })
}

/// File name used in logs and failure reports.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn trim_text(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || ('\x1c'..='\x1f').contains(&c))
}

fn normalize_newlines(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

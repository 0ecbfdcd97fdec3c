//! Ingestion progress reporting.
//!
//! Reports observable progress during `ingest run` so operators see which
//! file is being processed and how much is left. Progress is emitted on
//! **stderr** so stdout stays reserved for the final report.

use std::io::Write;

use crate::models::FileOutcome;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// The corpus has been scanned; `total` files will be processed.
    Scanned { total: u64 },
    /// File `n` of `total` reached a terminal outcome.
    File {
        n: u64,
        total: u64,
        name: String,
        outcome: &'static str,
    },
    /// The run stopped before the last file.
    Interrupted { processed: u64, total: u64 },
}

impl ProgressEvent {
    pub fn file(n: u64, total: u64, name: &str, outcome: &FileOutcome) -> Self {
        ProgressEvent::File {
            n,
            total,
            name: name.to_string(),
            outcome: outcome.label(),
        }
    }
}

/// Receives progress events from the pipeline.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "ingest  1,234 / 5,000  speech.txt  inserted".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Scanned { total } => {
                format!("ingest  {} files to process\n", format_number(*total))
            }
            ProgressEvent::File {
                n,
                total,
                name,
                outcome,
            } => format!(
                "ingest  {} / {}  {}  {}\n",
                format_number(*n),
                format_number(*total),
                name,
                outcome
            ),
            ProgressEvent::Interrupted { processed, total } => format!(
                "ingest  interrupted after {} / {}\n",
                format_number(*processed),
                format_number(*total)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Scanned { total } => serde_json::json!({
                "event": "scanned",
                "total": total
            }),
            ProgressEvent::File {
                n,
                total,
                name,
                outcome,
            } => serde_json::json!({
                "event": "file",
                "n": n,
                "total": total,
                "file": name,
                "outcome": outcome
            }),
            ProgressEvent::Interrupted { processed, total } => serde_json::json!({
                "event": "interrupted",
                "n": processed,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn file_event_carries_outcome_label() {
        let outcome = FileOutcome::Duplicate { id: "ab".into() };
        match ProgressEvent::file(3, 10, "c.txt", &outcome) {
            ProgressEvent::File { n, outcome, .. } => {
                assert_eq!(n, 3);
                assert_eq!(outcome, "duplicate");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}

//! Run statistics and the end-of-run report.
//!
//! [`RunStatistics`] is owned by a single pipeline run and updated once per
//! file. At the end it is frozen into a [`RunReport`], whose `Display`
//! implementation is the human summary printed by `ingest run`.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::models::{FailureRecord, FileOutcome};
use crate::progress::format_number;

/// Failures listed in the summary before collapsing into "... and N more".
pub const MAX_REPORTED_FAILURES: usize = 5;

/// Counters for one run. Never persisted.
#[derive(Debug, Clone)]
pub struct RunStatistics {
    pub inserted: u64,
    pub duplicates: u64,
    pub failed: u64,
    pub started: Instant,
    pub started_at: DateTime<Utc>,
    pub failures: Vec<FailureRecord>,
}

impl Default for RunStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStatistics {
    pub fn new() -> Self {
        Self {
            inserted: 0,
            duplicates: 0,
            failed: 0,
            started: Instant::now(),
            started_at: Utc::now(),
            failures: Vec::new(),
        }
    }

    /// Count one terminal outcome.
    pub fn record(&mut self, file: &str, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Inserted { .. } => self.inserted += 1,
            FileOutcome::Duplicate { .. } => self.duplicates += 1,
            FileOutcome::Failed { reason } => {
                self.failed += 1;
                self.failures.push(FailureRecord {
                    file: file.to_string(),
                    error: reason.clone(),
                });
            }
        }
    }

    pub fn processed(&self) -> u64 {
        self.inserted + self.duplicates + self.failed
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Freeze the statistics into a report.
    pub fn finish(self, interrupted: bool, total_stored: Option<u64>) -> RunReport {
        let elapsed = self.elapsed();
        RunReport {
            stats: self,
            interrupted,
            total_stored,
            elapsed,
        }
    }
}

/// Final outcome of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub stats: RunStatistics,
    pub interrupted: bool,
    /// Documents in the collection after the run; `None` if the count failed.
    pub total_stored: Option<u64>,
    pub elapsed: Duration,
}

impl RunReport {
    /// Inserted records per second of wall-clock time.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.stats.inserted as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.stats;
        writeln!(f, "Ingestion report")?;
        writeln!(f, "================")?;
        writeln!(
            f,
            "  Started:     {}",
            stats.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        if self.interrupted {
            writeln!(f, "  Status:      interrupted")?;
        }
        writeln!(f, "  Inserted:    {}", format_number(stats.inserted))?;
        writeln!(f, "  Duplicates:  {}", format_number(stats.duplicates))?;
        writeln!(f, "  Failed:      {}", format_number(stats.failed))?;
        writeln!(f, "  Elapsed:     {:.2}s", self.elapsed.as_secs_f64())?;
        writeln!(f, "  Throughput:  {:.2} records/s", self.throughput())?;
        match self.total_stored {
            Some(total) => writeln!(f, "  Stored:      {}", format_number(total))?,
            None => writeln!(f, "  Stored:      unknown")?,
        }

        if !stats.failures.is_empty() {
            writeln!(f)?;
            writeln!(f, "  Failures:")?;
            for failure in stats.failures.iter().take(MAX_REPORTED_FAILURES) {
                writeln!(f, "    {}: {}", failure.file, failure.error)?;
            }
            if stats.failures.len() > MAX_REPORTED_FAILURES {
                writeln!(
                    f,
                    "    ... and {} more",
                    stats.failures.len() - MAX_REPORTED_FAILURES
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(reason: &str) -> FileOutcome {
        FileOutcome::Failed {
            reason: reason.to_string(),
        }
    }

    #[test]
    fn outcomes_are_counted() {
        let mut stats = RunStatistics::new();
        stats.record("a.txt", &FileOutcome::Inserted { id: "a".into() });
        stats.record("b.txt", &FileOutcome::Duplicate { id: "a".into() });
        stats.record("c.txt", &failed("empty"));
        assert_eq!((stats.inserted, stats.duplicates, stats.failed), (1, 1, 1));
        assert_eq!(stats.processed(), 3);
        assert_eq!(stats.failures[0].file, "c.txt");
    }

    #[test]
    fn summary_caps_failure_list() {
        let mut stats = RunStatistics::new();
        for i in 0..8 {
            stats.record(&format!("f{}.txt", i), &failed("write failed: timeout"));
        }
        let text = stats.finish(false, Some(0)).to_string();
        assert!(text.contains("Failed:      8"));
        assert!(text.contains("f4.txt: write failed: timeout"));
        assert!(!text.contains("f5.txt"));
        assert!(text.contains("... and 3 more"));
        assert!(!text.contains("interrupted"));
    }

    #[test]
    fn interrupted_and_unknown_total() {
        let report = RunStatistics::new().finish(true, None);
        let text = report.to_string();
        assert!(text.contains("Status:      interrupted"));
        assert!(text.contains("Stored:      unknown"));
        assert_eq!(report.throughput(), 0.0);
    }
}

//! Post-run validation pass.
//!
//! Read-only checks over the stored collection: total count, one sampled
//! document's field presence, records grouped by embedding length, counts of
//! records missing `text` or `embedding`, and replica-set health. Each check
//! is best-effort; a failing query becomes a warning in the report and the
//! remaining checks still run. Findings never modify data.

use std::fmt;

use tracing::{info, warn};

use crate::progress::format_number;
use crate::store::{
    CountFilter, DimensionGroup, DocumentStore, RecordField, ReplicaSetStatus, SampleDocument,
};

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub total: Option<u64>,
    pub sample: Option<SampleDocument>,
    /// Largest group first.
    pub dimension_groups: Vec<DimensionGroup>,
    pub missing_text: Option<u64>,
    pub missing_embedding: Option<u64>,
    pub replica: Option<ReplicaSetStatus>,
    /// Queries that failed and findings worth an operator's attention.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// The most common embedding length.
    pub fn majority(&self) -> Option<&DimensionGroup> {
        self.dimension_groups.first()
    }

    /// Every group other than the majority.
    pub fn minority(&self) -> &[DimensionGroup] {
        self.dimension_groups.get(1..).unwrap_or(&[])
    }

    pub fn dimensions_consistent(&self) -> bool {
        self.dimension_groups.len() <= 1
    }

    fn note(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Run every check against `store`.
pub async fn validate_store(store: &dyn DocumentStore) -> ValidationReport {
    let mut report = ValidationReport::default();
    info!(store = %store.describe(), "validation started");

    match store.count_documents(CountFilter::All).await {
        Ok(total) => report.total = Some(total),
        Err(e) => report.note(format!("count failed: {}", e)),
    }
    if report.total == Some(0) {
        report.note("collection is empty".to_string());
    }

    match store.sample().await {
        Ok(sample) => report.sample = sample,
        Err(e) => report.note(format!("sample failed: {}", e)),
    }
    if let Some(sample) = &report.sample {
        if sample.text.is_none() || sample.embedding_len.is_none() {
            let id = sample.id.clone().unwrap_or_else(|| "?".to_string());
            report.note(format!("sampled document {} is missing fields", id));
        }
    }

    match store.embedding_dimensions().await {
        Ok(groups) => report.dimension_groups = groups,
        Err(e) => report.note(format!("embedding size aggregation failed: {}", e)),
    }
    if !report.dimensions_consistent() {
        let minority: u64 = report.minority().iter().map(|g| g.count).sum();
        report.note(format!(
            "inconsistent embedding dimensions: {} records outside the majority group",
            minority
        ));
    }

    match store
        .count_documents(CountFilter::Missing(RecordField::Text))
        .await
    {
        Ok(n) => report.missing_text = Some(n),
        Err(e) => report.note(format!("missing-text count failed: {}", e)),
    }
    match store
        .count_documents(CountFilter::Missing(RecordField::Embedding))
        .await
    {
        Ok(n) => report.missing_embedding = Some(n),
        Err(e) => report.note(format!("missing-embedding count failed: {}", e)),
    }
    let missing = report.missing_text.unwrap_or(0) + report.missing_embedding.unwrap_or(0);
    if missing > 0 {
        report.note(format!("{} records are missing text or embedding", missing));
    }

    match store.replica_status().await {
        Ok(status) => {
            if status.set_name.is_some() && status.primary_count() != 1 {
                report.note(format!(
                    "replica set has {} primaries, expected exactly 1",
                    status.primary_count()
                ));
            }
            report.replica = Some(status);
        }
        Err(e) => report.note(format!("replica status failed: {}", e)),
    }

    info!(warnings = report.warnings.len(), "validation finished");
    report
}

fn dims_label(dims: Option<usize>) -> String {
    dims.map(|d| d.to_string())
        .unwrap_or_else(|| "none".to_string())
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Validation")?;
        writeln!(f, "==========")?;
        match self.total {
            Some(total) => writeln!(f, "  Documents:   {}", format_number(total))?,
            None => writeln!(f, "  Documents:   unknown")?,
        }

        if let Some(sample) = &self.sample {
            writeln!(
                f,
                "  Sample:      _id={} text={} embedding={}",
                if sample.id.is_some() { "yes" } else { "no" },
                if sample.text.is_some() { "yes" } else { "no" },
                dims_label(sample.embedding_len)
            )?;
        }

        if let Some(majority) = self.majority() {
            writeln!(
                f,
                "  Dimensions:  {} ({} records)",
                dims_label(majority.dims),
                format_number(majority.count)
            )?;
            for group in self.minority() {
                writeln!(
                    f,
                    "    minority:  {} ({} records)",
                    dims_label(group.dims),
                    format_number(group.count)
                )?;
            }
        }

        if let (Some(text), Some(embedding)) = (self.missing_text, self.missing_embedding) {
            writeln!(f, "  Missing:     text={} embedding={}", text, embedding)?;
        }

        if let Some(replica) = &self.replica {
            if let Some(version) = &replica.version {
                writeln!(f, "  Server:      {}", version)?;
            }
            match &replica.set_name {
                Some(name) => writeln!(
                    f,
                    "  Replica set: {} ({} members, {} primary)",
                    name,
                    replica.members.len(),
                    replica.primary_count()
                )?,
                None => writeln!(f, "  Replica set: none")?,
            }
        }

        for warning in &self.warnings {
            writeln!(f, "  WARNING: {}", warning)?;
        }
        Ok(())
    }
}

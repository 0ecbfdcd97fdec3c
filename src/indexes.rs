//! Post-run indexing pass.
//!
//! Ensures the full-text index on `text` and the sparse index on
//! `embedding`. Creating an index that already exists is a no-op on the
//! server, so the pass runs after every completed ingestion.

use std::fmt;

use tracing::{info, warn};

use crate::store::{DocumentStore, IndexSpec};

/// Result of ensuring one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOutcome {
    pub name: String,
    pub error: Option<String>,
}

impl IndexOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Display for IndexOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            None => write!(f, "index {}: ok", self.name),
            Some(e) => write!(f, "index {}: FAILED ({})", self.name, e),
        }
    }
}

pub fn required_indexes() -> Vec<IndexSpec> {
    vec![IndexSpec::text(), IndexSpec::embedding_presence()]
}

/// Create every required index. A failure is logged and reported but does
/// not stop the remaining indexes.
pub async fn ensure_indexes(store: &dyn DocumentStore) -> Vec<IndexOutcome> {
    let mut outcomes = Vec::new();
    for spec in required_indexes() {
        let error = match store.create_index(&spec).await {
            Ok(()) => {
                info!(index = %spec.name, "index ready");
                None
            }
            Err(e) => {
                warn!(index = %spec.name, error = %e, "index creation failed");
                Some(e.to_string())
            }
        };
        outcomes.push(IndexOutcome {
            name: spec.name,
            error,
        });
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use crate::store::IndexKind;

    #[tokio::test]
    async fn creates_text_and_sparse_indexes() {
        let store = InMemoryStore::new();
        let outcomes = ensure_indexes(&store).await;
        assert!(outcomes.iter().all(IndexOutcome::is_ok));
        assert_eq!(outcomes[0].to_string(), "index text_index: ok");

        let indexes = store.indexes();
        assert_eq!(indexes.len(), 2);
        assert_eq!(indexes[0].kind, IndexKind::FullText);
        assert_eq!(indexes[1].name, "embedding_index");
        assert_eq!(indexes[1].kind, IndexKind::Sparse);

        ensure_indexes(&store).await;
        assert_eq!(store.indexes().len(), 2);
    }
}

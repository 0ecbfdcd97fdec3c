//! In-memory [`DocumentStore`] for tests and dry runs.
//!
//! Keeps documents in insertion order behind a `Mutex` and enforces the same
//! duplicate-key rule as the real store. Documents with missing fields can be
//! planted with [`InMemoryStore::insert_raw`] to exercise validation, and
//! [`InMemoryStore::rejecting_writes`] builds a store whose every insert fails.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use async_trait::async_trait;

use crate::error::{IngestError, IngestResult};
use crate::models::Record;

use super::{
    CountFilter, DimensionGroup, DocumentStore, IndexSpec, RecordField, ReplicaSetStatus,
    SampleDocument, WriteAck,
};

/// A stored document. Fields are optional so malformed documents can exist.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub text: Option<String>,
    pub embedding: Option<Vec<f32>>,
}

impl From<&Record> for StoredDocument {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id().to_string(),
            text: Some(record.text().to_string()),
            embedding: Some(record.embedding().to_vec()),
        }
    }
}

#[derive(Default)]
struct State {
    docs: Vec<StoredDocument>,
    ids: HashSet<String>,
    indexes: Vec<IndexSpec>,
    acks: Vec<WriteAck>,
}

/// In-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    reject_writes: Option<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that fails every insert with `reason`, as if it became
    /// unreachable after the initial connection.
    pub fn rejecting_writes(reason: impl Into<String>) -> Self {
        Self {
            state: Mutex::default(),
            reject_writes: Some(reason.into()),
        }
    }

    /// Plant a document directly, bypassing the duplicate check.
    pub fn insert_raw(&self, doc: StoredDocument) {
        let mut state = self.lock();
        state.ids.insert(doc.id.clone());
        state.docs.push(doc);
    }

    pub fn documents(&self) -> Vec<StoredDocument> {
        self.lock().docs.clone()
    }

    pub fn ids(&self) -> HashSet<String> {
        self.lock().ids.clone()
    }

    pub fn indexes(&self) -> Vec<IndexSpec> {
        self.lock().indexes.clone()
    }

    /// Acknowledgement policies requested by successful inserts, in order.
    pub fn acks(&self) -> Vec<WriteAck> {
        self.lock().acks.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn has_field(doc: &StoredDocument, field: RecordField) -> bool {
    match field {
        RecordField::Id => true,
        RecordField::Text => doc.text.is_some(),
        RecordField::Embedding => doc.embedding.is_some(),
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn describe(&self) -> String {
        "in-memory".to_string()
    }

    async fn insert(&self, record: &Record, ack: &WriteAck) -> IngestResult<()> {
        if let Some(reason) = &self.reject_writes {
            return Err(IngestError::Write(reason.clone()));
        }
        let mut state = self.lock();
        if !state.ids.insert(record.id().to_string()) {
            return Err(IngestError::DuplicateKey {
                id: record.id().to_string(),
            });
        }
        state.docs.push(StoredDocument::from(record));
        state.acks.push(*ack);
        Ok(())
    }

    async fn count_documents(&self, filter: CountFilter) -> Result<u64> {
        let state = self.lock();
        let count = match filter {
            CountFilter::All => state.docs.len(),
            CountFilter::Missing(field) => {
                state.docs.iter().filter(|d| !has_field(d, field)).count()
            }
        };
        Ok(count as u64)
    }

    async fn sample(&self) -> Result<Option<SampleDocument>> {
        Ok(self.lock().docs.first().map(|d| SampleDocument {
            id: Some(d.id.clone()),
            text: d.text.clone(),
            embedding_len: d.embedding.as_ref().map(Vec::len),
        }))
    }

    async fn embedding_dimensions(&self) -> Result<Vec<DimensionGroup>> {
        let state = self.lock();
        let mut groups: Vec<DimensionGroup> = Vec::new();
        for doc in &state.docs {
            let dims = doc.embedding.as_ref().map(Vec::len);
            match groups.iter_mut().find(|g| g.dims == dims) {
                Some(group) => group.count += 1,
                None => groups.push(DimensionGroup { dims, count: 1 }),
            }
        }
        groups.sort_by(|a, b| b.count.cmp(&a.count).then(a.dims.cmp(&b.dims)));
        Ok(groups)
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        let mut state = self.lock();
        if !state.indexes.iter().any(|i| i.name == spec.name) {
            state.indexes.push(spec.clone());
        }
        Ok(())
    }

    async fn replica_status(&self) -> Result<ReplicaSetStatus> {
        Ok(ReplicaSetStatus::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ack() -> WriteAck {
        WriteAck::majority(Duration::from_millis(5000))
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = InMemoryStore::new();
        let record = Record::new("uno".to_string(), vec![0.0; 3]);
        store.insert(&record, &ack()).await.unwrap();
        match store.insert(&record, &ack()).await {
            Err(IngestError::DuplicateKey { id }) => assert_eq!(id, record.id()),
            other => panic!("expected DuplicateKey, got {:?}", other),
        }
        assert_eq!(store.count_documents(CountFilter::All).await.unwrap(), 1);
        assert_eq!(store.acks(), vec![ack()]);
    }

    #[tokio::test]
    async fn rejecting_store_fails_every_write() {
        let store = InMemoryStore::rejecting_writes("not primary");
        let record = Record::new("dos".to_string(), vec![0.0; 3]);
        assert!(matches!(
            store.insert(&record, &ack()).await,
            Err(IngestError::Write(_))
        ));
        assert_eq!(store.count_documents(CountFilter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_fields_are_counted() {
        let store = InMemoryStore::new();
        store.insert_raw(StoredDocument {
            id: "a".into(),
            text: None,
            embedding: Some(vec![1.0]),
        });
        store.insert_raw(StoredDocument {
            id: "b".into(),
            text: Some("b".into()),
            embedding: None,
        });
        let missing_text = store
            .count_documents(CountFilter::Missing(RecordField::Text))
            .await
            .unwrap();
        let missing_embedding = store
            .count_documents(CountFilter::Missing(RecordField::Embedding))
            .await
            .unwrap();
        assert_eq!((missing_text, missing_embedding), (1, 1));

        let groups = store.embedding_dimensions().await.unwrap();
        assert_eq!(groups.len(), 2);
        assert!(groups.contains(&DimensionGroup {
            dims: None,
            count: 1
        }));
    }

    #[tokio::test]
    async fn create_index_is_idempotent() {
        let store = InMemoryStore::new();
        store.create_index(&IndexSpec::text()).await.unwrap();
        store.create_index(&IndexSpec::text()).await.unwrap();
        store
            .create_index(&IndexSpec::embedding_presence())
            .await
            .unwrap();
        assert_eq!(store.indexes().len(), 2);
    }
}

//! Document store abstraction.
//!
//! The [`DocumentStore`] trait is everything the pipeline and the
//! validation/indexing passes need from the replicated store:
//!
//! | Method | Used by |
//! |--------|---------|
//! | [`insert`](DocumentStore::insert) | ingestion hot path |
//! | [`count_documents`](DocumentStore::count_documents) | report, validation |
//! | [`sample`](DocumentStore::sample) | validation |
//! | [`embedding_dimensions`](DocumentStore::embedding_dimensions) | validation |
//! | [`create_index`](DocumentStore::create_index) | indexing pass |
//! | [`replica_status`](DocumentStore::replica_status) | validation, `ingest status` |
//!
//! Backends: [`mongo::MongoStore`] for real runs and
//! [`memory::InMemoryStore`] for tests and dry runs.

pub mod connect;
pub mod memory;
pub mod mongo;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::IngestResult;
use crate::models::Record;

/// Write acknowledgement policy: a majority of replica members must confirm
/// each write within `timeout`.
///
/// When the wait elapses the write is reported as failed; it is never
/// downgraded to a weaker level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteAck {
    pub timeout: Duration,
}

impl WriteAck {
    pub fn majority(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Top-level fields of a persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Id,
    Text,
    Embedding,
}

impl RecordField {
    pub fn name(&self) -> &'static str {
        match self {
            RecordField::Id => "_id",
            RecordField::Text => "text",
            RecordField::Embedding => "embedding",
        }
    }
}

/// Filter for [`DocumentStore::count_documents`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountFilter {
    All,
    /// Documents where the field is absent.
    Missing(RecordField),
}

/// One bucket of the group-by-embedding-length aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionGroup {
    /// `None` when the embedding is absent or not an array.
    pub dims: Option<usize>,
    pub count: u64,
}

/// Field presence summary of one stored document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleDocument {
    pub id: Option<String>,
    pub text: Option<String>,
    pub embedding_len: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    FullText,
    Sparse,
}

/// An index to create on the record collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub field: RecordField,
    pub kind: IndexKind,
}

impl IndexSpec {
    /// Full-text index over `text`.
    pub fn text() -> Self {
        Self {
            name: "text_index".to_string(),
            field: RecordField::Text,
            kind: IndexKind::FullText,
        }
    }

    /// Sparse index over `embedding`, skipping documents without one.
    pub fn embedding_presence() -> Self {
        Self {
            name: "embedding_index".to_string(),
            field: RecordField::Embedding,
            kind: IndexKind::Sparse,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberStatus {
    pub name: String,
    pub state: String,
}

/// Server and replica-set information.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicaSetStatus {
    pub version: Option<String>,
    /// `None` when the server is not part of a replica set.
    pub set_name: Option<String>,
    pub members: Vec<MemberStatus>,
}

impl ReplicaSetStatus {
    pub fn primary_count(&self) -> usize {
        self.members.iter().filter(|m| m.state == "PRIMARY").count()
    }
}

/// Storage backend for ingested records.
///
/// `insert` returns [`IngestError::DuplicateKey`](crate::error::IngestError::DuplicateKey)
/// when the id is already stored and
/// [`IngestError::Write`](crate::error::IngestError::Write) for every other
/// failure, including an acknowledgement timeout. The remaining methods are
/// best-effort helpers for reporting and return `anyhow` errors.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short description for logs (e.g. the connection target).
    fn describe(&self) -> String;

    /// Durably insert a record. Never overwrites.
    async fn insert(&self, record: &Record, ack: &WriteAck) -> IngestResult<()>;

    async fn count_documents(&self, filter: CountFilter) -> Result<u64>;

    /// Any one stored document, or `None` when the collection is empty.
    async fn sample(&self) -> Result<Option<SampleDocument>>;

    /// Record counts grouped by embedding length, largest group first.
    async fn embedding_dimensions(&self) -> Result<Vec<DimensionGroup>>;

    async fn create_index(&self, spec: &IndexSpec) -> Result<()>;

    async fn replica_status(&self) -> Result<ReplicaSetStatus>;
}

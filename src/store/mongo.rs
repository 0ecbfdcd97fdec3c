//! MongoDB replica-set backend.
//!
//! Uses the official `mongodb` driver. Connection goes through
//! [`connect_with_fallback`]: each member is opened with
//! `directConnection=true` and kept only if it is the writable primary;
//! otherwise the replica-set URI lets the driver locate the primary.
//!
//! Inserts run against a collection handle carrying the requested write
//! concern (`w: majority` plus `wtimeout`), so an acknowledgement timeout
//! surfaces as a write error instead of a silent success.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{
    Acknowledgment, ClientOptions, CollectionOptions, IndexOptions, WriteConcern,
};
use mongodb::{Client, Collection, IndexModel};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{IngestError, IngestResult};
use crate::models::Record;

use super::connect::{connect_with_fallback, ConnectionPlan, ConnectionTarget};
use super::{
    CountFilter, DimensionGroup, DocumentStore, IndexKind, IndexSpec, MemberStatus,
    ReplicaSetStatus, SampleDocument, WriteAck,
};

/// Server error code for a unique index violation.
const DUPLICATE_KEY_CODE: i32 = 11000;

pub struct MongoStore {
    client: Client,
    target: ConnectionTarget,
    database: String,
    collection: String,
}

impl MongoStore {
    /// Connect following the primary-seeking plan built from `config`.
    pub async fn connect(config: &StoreConfig) -> IngestResult<Self> {
        let plan = ConnectionPlan::from_config(config);
        let (client, target) =
            connect_with_fallback(&plan, |target| async move { open_client(&target).await })
                .await?;

        Ok(Self {
            client,
            target,
            database: config.database.clone(),
            collection: config.collection.clone(),
        })
    }

    /// Shut the client down, waiting for in-flight operations.
    pub async fn close(self) {
        self.client.shutdown().await;
        info!("document store connection closed");
    }

    fn documents(&self) -> Collection<Document> {
        self.client
            .database(&self.database)
            .collection::<Document>(&self.collection)
    }

    fn records(&self, ack: &WriteAck) -> Collection<Record> {
        let write_concern = WriteConcern::builder()
            .w(Acknowledgment::Majority)
            .w_timeout(ack.timeout)
            .build();
        self.client.database(&self.database).collection_with_options::<Record>(
            &self.collection,
            CollectionOptions::builder()
                .write_concern(write_concern)
                .build(),
        )
    }
}

async fn open_client(target: &ConnectionTarget) -> Result<Client> {
    let options = ClientOptions::parse(target.uri())
        .await
        .context("Failed to parse MongoDB connection string")?;
    let client = Client::with_options(options).context("Failed to create MongoDB client")?;
    let admin = client.database("admin");

    admin
        .run_command(doc! { "ping": 1 })
        .await
        .context("ping failed")?;

    if target.is_direct() {
        let hello = admin
            .run_command(doc! { "hello": 1 })
            .await
            .context("hello failed")?;
        let writable = hello
            .get_bool("isWritablePrimary")
            .or_else(|_| hello.get_bool("ismaster"))
            .unwrap_or(false);
        if !writable {
            bail!("member is reachable but not the writable primary");
        }
    }

    Ok(client)
}

fn classify_insert_error(id: &str, err: mongodb::error::Error) -> IngestError {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE =>
        {
            IngestError::DuplicateKey { id: id.to_string() }
        }
        _ => IngestError::Write(err.to_string()),
    }
}

fn bson_to_u64(value: &Bson) -> Option<u64> {
    match value {
        Bson::Int32(v) => u64::try_from(*v).ok(),
        Bson::Int64(v) => u64::try_from(*v).ok(),
        Bson::Double(v) if *v >= 0.0 => Some(*v as u64),
        _ => None,
    }
}

fn count_filter(filter: CountFilter) -> Document {
    match filter {
        CountFilter::All => doc! {},
        CountFilter::Missing(field) => {
            let key = field.name();
            doc! { key: { "$exists": false } }
        }
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn describe(&self) -> String {
        format!("{} {}.{}", self.target, self.database, self.collection)
    }

    async fn insert(&self, record: &Record, ack: &WriteAck) -> IngestResult<()> {
        self.records(ack)
            .insert_one(record)
            .await
            .map(|_| ())
            .map_err(|e| classify_insert_error(record.id(), e))
    }

    async fn count_documents(&self, filter: CountFilter) -> Result<u64> {
        let count = self
            .documents()
            .count_documents(count_filter(filter))
            .await
            .context("count_documents failed")?;
        Ok(count)
    }

    async fn sample(&self) -> Result<Option<SampleDocument>> {
        let found = self
            .documents()
            .find_one(doc! {})
            .await
            .context("find_one failed")?;

        Ok(found.map(|d| SampleDocument {
            id: d.get_str("_id").ok().map(str::to_owned),
            text: d.get_str("text").ok().map(str::to_owned),
            embedding_len: d.get_array("embedding").ok().map(Vec::len),
        }))
    }

    async fn embedding_dimensions(&self) -> Result<Vec<DimensionGroup>> {
        let pipeline = vec![
            doc! { "$project": {
                "embedding_size": {
                    "$cond": [ { "$isArray": "$embedding" }, { "$size": "$embedding" }, null ]
                }
            }},
            doc! { "$group": { "_id": "$embedding_size", "count": { "$sum": 1 } } },
            doc! { "$sort": { "count": -1 } },
        ];

        let mut cursor = self
            .documents()
            .aggregate(pipeline)
            .await
            .context("embedding size aggregation failed")?;

        let mut groups = Vec::new();
        while cursor
            .advance()
            .await
            .context("Failed to advance aggregation cursor")?
        {
            let row: Document = cursor
                .deserialize_current()
                .context("Failed to read aggregation row")?;
            let dims = row
                .get("_id")
                .and_then(bson_to_u64)
                .map(|v| v as usize);
            let count = row.get("count").and_then(bson_to_u64).unwrap_or(0);
            groups.push(DimensionGroup { dims, count });
        }
        Ok(groups)
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        let field = spec.field.name();
        let (keys, options) = match spec.kind {
            IndexKind::FullText => (
                doc! { field: "text" },
                IndexOptions::builder().name(spec.name.clone()).build(),
            ),
            IndexKind::Sparse => (
                doc! { field: 1 },
                IndexOptions::builder()
                    .name(spec.name.clone())
                    .sparse(true)
                    .build(),
            ),
        };
        let model = IndexModel::builder().keys(keys).options(options).build();

        self.documents()
            .create_index(model)
            .await
            .with_context(|| format!("Failed to create index '{}'", spec.name))?;
        debug!(index = %spec.name, "index ensured");
        Ok(())
    }

    async fn replica_status(&self) -> Result<ReplicaSetStatus> {
        let admin = self.client.database("admin");
        let mut status = ReplicaSetStatus::default();

        if let Ok(build) = admin.run_command(doc! { "buildInfo": 1 }).await {
            status.version = build.get_str("version").ok().map(str::to_owned);
        }

        let hello = admin
            .run_command(doc! { "hello": 1 })
            .await
            .context("hello failed")?;
        if hello.get_str("setName").is_err() {
            return Ok(status);
        }

        let repl = admin
            .run_command(doc! { "replSetGetStatus": 1 })
            .await
            .context("replSetGetStatus failed")?;
        status.set_name = repl.get_str("set").ok().map(str::to_owned);
        if let Ok(members) = repl.get_array("members") {
            status.members = members
                .iter()
                .filter_map(Bson::as_document)
                .map(|m| MemberStatus {
                    name: m.get_str("name").unwrap_or("unknown").to_string(),
                    state: m.get_str("stateStr").unwrap_or("UNKNOWN").to_string(),
                })
                .collect();
        }
        Ok(status)
    }
}

//! Ingestion pipeline orchestration.
//!
//! Coordinates the full run: corpus scan → decode → fingerprint → embed →
//! majority-acknowledged insert → statistics, one file at a time, followed
//! by the validation and indexing passes.
//!
//! # Per-file outcome
//!
//! | Step | Failure | Outcome |
//! |------|---------|---------|
//! | read + decode | no encoding fits, empty text, io error | `Failed` |
//! | embed | provider error, wrong vector length | `Failed` |
//! | insert | `_id` already stored | `Duplicate` |
//! | insert | anything else, including ack timeout | `Failed` |
//!
//! Every file ends in exactly one outcome and the loop always moves on to the
//! next file. The only things that stop a run early are fatal errors before
//! the first file (store, model, corpus) and an interrupt, which is honoured
//! between files.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::corpus::scan_corpus;
use crate::decode::{read_document, TextEncoding};
use crate::embedding::{
    create_provider, embed_checked, ensure_available, EmbeddingProvider, NullProvider, DEFAULT_DIMS,
};
use crate::error::IngestError;
use crate::indexes::ensure_indexes;
use crate::models::{CorpusFile, FileOutcome, Record};
use crate::progress::{NoProgress, ProgressEvent, ProgressReporter};
use crate::stats::{RunReport, RunStatistics};
use crate::store::memory::InMemoryStore;
use crate::store::mongo::MongoStore;
use crate::store::{CountFilter, DocumentStore, WriteAck};
use crate::validate::validate_store;

/// Sleep `pause` after every `every` files. `every == 0` disables it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub every: usize,
    pub pause: Duration,
}

impl Pacing {
    pub fn none() -> Self {
        Self {
            every: 0,
            pause: Duration::ZERO,
        }
    }

    fn due_after(&self, processed: usize, total: usize) -> bool {
        self.every > 0 && processed % self.every == 0 && processed < total
    }
}

/// Sequential per-file pipeline over a store and an embedding provider.
pub struct IngestionPipeline<'a> {
    store: &'a dyn DocumentStore,
    embedder: &'a dyn EmbeddingProvider,
    encodings: Vec<TextEncoding>,
    ack: WriteAck,
    pacing: Pacing,
    progress: Box<dyn ProgressReporter>,
    stop: Arc<AtomicBool>,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        embedder: &'a dyn EmbeddingProvider,
        encodings: Vec<TextEncoding>,
        ack: WriteAck,
    ) -> Self {
        Self {
            store,
            embedder,
            encodings,
            ack,
            pacing: Pacing::none(),
            progress: Box::new(NoProgress),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Share a flag that, once set, stops the run before the next file.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Take one file to its terminal outcome.
    pub async fn process_file(&self, file: &CorpusFile) -> FileOutcome {
        let decoded = match read_document(&file.path, &self.encodings) {
            Ok(decoded) => decoded,
            Err(e) => return failed(file, e),
        };
        debug!(file = %file.name, encoding = %decoded.encoding, "decoded");

        let embedding = match embed_checked(self.embedder, &decoded.text).await {
            Ok(vector) => vector,
            Err(e) => return failed(file, e),
        };

        let record = Record::new(decoded.text, embedding);
        match self.store.insert(&record, &self.ack).await {
            Ok(()) => {
                debug!(file = %file.name, id = record.id(), "inserted");
                FileOutcome::Inserted {
                    id: record.id().to_string(),
                }
            }
            Err(IngestError::DuplicateKey { id }) => {
                info!(file = %file.name, id = %id, "already stored, skipping");
                FileOutcome::Duplicate { id }
            }
            Err(e) => failed(file, e),
        }
    }

    /// Process `files` in order and build the run report.
    pub async fn run(&self, files: &[CorpusFile]) -> RunReport {
        let mut stats = RunStatistics::new();
        let total = files.len();
        let mut interrupted = false;

        if files.is_empty() {
            error!("no input files found in the corpus directory");
        } else {
            info!(files = total, store = %self.store.describe(), "ingestion started");
        }
        self.progress.report(ProgressEvent::Scanned {
            total: total as u64,
        });

        for (i, file) in files.iter().enumerate() {
            if self.stop.load(Ordering::SeqCst) {
                warn!(processed = i, total, "interrupted, stopping before next file");
                self.progress.report(ProgressEvent::Interrupted {
                    processed: i as u64,
                    total: total as u64,
                });
                interrupted = true;
                break;
            }

            let outcome = self.process_file(file).await;
            stats.record(&file.name, &outcome);
            self.progress.report(ProgressEvent::file(
                (i + 1) as u64,
                total as u64,
                &file.name,
                &outcome,
            ));

            if self.pacing.due_after(i + 1, total) {
                debug!(processed = i + 1, "pacing pause");
                tokio::time::sleep(self.pacing.pause).await;
            }
        }

        let total_stored = match self.store.count_documents(CountFilter::All).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(error = %e, "could not count stored documents");
                None
            }
        };

        info!(
            inserted = stats.inserted,
            duplicates = stats.duplicates,
            failed = stats.failed,
            interrupted,
            "ingestion finished"
        );
        stats.finish(interrupted, total_stored)
    }
}

fn failed(file: &CorpusFile, err: IngestError) -> FileOutcome {
    warn!(file = %file.name, error = %err, "file failed");
    FileOutcome::Failed {
        reason: err.to_string(),
    }
}

/// Options for [`run_ingest`], mostly from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub limit: Option<usize>,
    pub dry_run: bool,
    pub skip_validation: bool,
    pub skip_indexes: bool,
}

/// Scan, connect, ingest, validate and index. Prints the reports to stdout.
///
/// Fatal errors ([`IngestError::exit_code`]) are returned before any file is
/// processed. Per-file failures only show up in the returned report.
pub async fn run_ingest(
    config: &Config,
    options: &RunOptions,
    progress: Box<dyn ProgressReporter>,
    stop: Arc<AtomicBool>,
) -> Result<RunReport> {
    let mut files = scan_corpus(&config.corpus)?;
    if let Some(limit) = options.limit {
        files.truncate(limit);
    }

    let ack = WriteAck::majority(Duration::from_millis(config.store.write_timeout_ms));
    let encodings = config.decoding.encodings.clone();
    let null_dims = config.embedding.dims.unwrap_or(DEFAULT_DIMS);

    if options.dry_run {
        // Nothing here reaches the network.
        let store = InMemoryStore::new();
        let embedder = NullProvider::new(null_dims);
        let report = IngestionPipeline::new(&store, &embedder, encodings, ack)
            .with_progress(progress)
            .with_stop_flag(stop)
            .run(&files)
            .await;
        println!("ingest (dry-run)");
        print!("{}", report);
        return Ok(report);
    }

    let store = MongoStore::connect(&config.store).await?;
    let embedder: Box<dyn EmbeddingProvider> = if files.is_empty() {
        info!("no files to embed, skipping model load");
        Box::new(NullProvider::new(null_dims))
    } else {
        let provider = create_provider(&config.embedding).await?;
        ensure_available(provider.as_ref()).await?;
        provider
    };

    let report = IngestionPipeline::new(&store, embedder.as_ref(), encodings, ack)
        .with_pacing(Pacing {
            every: config.pipeline.pause_every,
            pause: Duration::from_millis(config.pipeline.pause_ms),
        })
        .with_progress(progress)
        .with_stop_flag(stop)
        .run(&files)
        .await;
    finish_run(&store, config, options, &report).await;

    store.close().await;
    Ok(report)
}

/// Print the run report, then run the validation and indexing passes unless
/// the run was interrupted or they are switched off.
pub async fn finish_run(
    store: &dyn DocumentStore,
    config: &Config,
    options: &RunOptions,
    report: &RunReport,
) {
    print!("{}", report);
    if report.interrupted {
        return;
    }
    if config.pipeline.validate && !options.skip_validation {
        println!();
        print!("{}", validate_store(store).await);
    }
    if config.pipeline.create_indexes && !options.skip_indexes {
        println!();
        for outcome in ensure_indexes(store).await {
            println!("{}", outcome);
        }
    }
}

/// Set `stop` on the first signal and return on the second, so the caller
/// can exit without waiting for the file in flight.
pub async fn watch_interrupts<S, Fut>(mut signal: S, stop: Arc<AtomicBool>)
where
    S: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    for received in 0..2 {
        if let Err(e) = signal().await {
            warn!(error = %e, "cannot listen for interrupts");
            std::future::pending::<()>().await;
        }
        if received == 0 {
            warn!("interrupt received, finishing current file (press again to abort)");
            stop.store(true, Ordering::SeqCst);
        }
    }
}

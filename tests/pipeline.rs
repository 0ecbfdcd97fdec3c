use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tempfile::TempDir;

use corpus_ingest::config::CorpusConfig;
use corpus_ingest::corpus::scan_corpus;
use corpus_ingest::decode::{read_document, TextEncoding, DEFAULT_ENCODINGS};
use corpus_ingest::embedding::EmbeddingProvider;
use corpus_ingest::fingerprint::{fingerprint, is_fingerprint};
use corpus_ingest::ingest::IngestionPipeline;
use corpus_ingest::models::{CorpusFile, FileOutcome, Record};
use corpus_ingest::store::memory::InMemoryStore;
use corpus_ingest::store::{DimensionGroup, DocumentStore, WriteAck};
use corpus_ingest::validate::validate_store;

/// Deterministic embedder: spreads the text bytes over `dims` buckets.
struct HashEmbedder {
    dims: usize,
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dims];
        for (i, b) in text.bytes().enumerate() {
            vector[(i + b as usize) % self.dims] += 1.0;
        }
        Ok(vector)
    }
}

/// Embedder whose model has gone away mid-run.
struct BrokenEmbedder;

#[async_trait]
impl EmbeddingProvider for BrokenEmbedder {
    fn model_name(&self) -> &str {
        "broken"
    }
    fn dims(&self) -> usize {
        384
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("inference session closed")
    }
}

fn ack() -> WriteAck {
    WriteAck::majority(Duration::from_millis(5000))
}

fn embedder() -> HashEmbedder {
    HashEmbedder { dims: 384 }
}

fn scan(root: &Path) -> Vec<CorpusFile> {
    scan_corpus(&CorpusConfig {
        root: root.to_path_buf(),
        ..CorpusConfig::default()
    })
    .unwrap()
}

/// Ten speeches where #3 and #7 are byte-identical.
fn ten_file_corpus() -> TempDir {
    let tmp = TempDir::new().unwrap();
    for i in 1..=10 {
        let body = if i == 7 {
            "Discurso número 3".to_string()
        } else {
            format!("Discurso número {}", i)
        };
        fs::write(tmp.path().join(format!("speech_{:02}.txt", i)), body).unwrap();
    }
    tmp
}

#[tokio::test]
async fn identical_files_store_one_record() {
    let corpus = ten_file_corpus();
    let files = scan(corpus.path());
    assert_eq!(files.len(), 10);

    let store = InMemoryStore::new();
    let embedder = embedder();
    let report = IngestionPipeline::new(&store, &embedder, DEFAULT_ENCODINGS.to_vec(), ack())
        .run(&files)
        .await;

    assert_eq!(report.stats.inserted, 9);
    assert_eq!(report.stats.duplicates, 1);
    assert_eq!(report.stats.failed, 0);
    assert!(!report.interrupted);
    assert_eq!(report.total_stored, Some(9));
    assert_eq!(store.ids().len(), 9);
    assert!(store.acks().iter().all(|a| *a == ack()));
}

#[tokio::test]
async fn rerun_is_idempotent() {
    let corpus = ten_file_corpus();
    let files = scan(corpus.path());
    let store = InMemoryStore::new();
    let embedder = embedder();
    let pipeline = IngestionPipeline::new(&store, &embedder, DEFAULT_ENCODINGS.to_vec(), ack());

    pipeline.run(&files).await;
    fs::write(corpus.path().join("speech_11.txt"), "Discurso nuevo").unwrap();
    let second = pipeline.run(&scan(corpus.path())).await;

    assert_eq!(second.stats.inserted, 1);
    assert_eq!(second.stats.duplicates, 10);
    assert_eq!(second.stats.failed, 0);
    assert_eq!(store.ids().len(), 10);
}

#[tokio::test]
async fn rejecting_store_fails_every_file_and_completes() {
    let corpus = ten_file_corpus();
    let files = scan(corpus.path());
    let store = InMemoryStore::rejecting_writes("not primary and secondaryOk=false");
    let embedder = embedder();

    let report = IngestionPipeline::new(&store, &embedder, DEFAULT_ENCODINGS.to_vec(), ack())
        .run(&files)
        .await;

    assert_eq!(report.stats.failed, 10);
    assert_eq!(report.stats.inserted + report.stats.duplicates, 0);
    let summary = report.to_string();
    assert!(summary.contains("Failed:      10"));
    assert!(summary.contains("speech_01.txt: write failed: not primary"));
    assert!(summary.contains("... and 5 more"));
}

#[tokio::test]
async fn empty_and_undecodable_files_do_not_stop_the_batch() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a_empty.txt"), "   \r\n\t").unwrap();
    fs::write(tmp.path().join("b_bad.txt"), b"caf\x81").unwrap();
    fs::write(tmp.path().join("c_good.txt"), "Buenas tardes").unwrap();
    let files = scan(tmp.path());

    let store = InMemoryStore::new();
    let embedder = embedder();
    let encodings = vec![TextEncoding::Utf8, TextEncoding::Cp1252];
    let pipeline = IngestionPipeline::new(&store, &embedder, encodings, ack());

    let outcomes = [
        pipeline.process_file(&files[0]).await,
        pipeline.process_file(&files[1]).await,
        pipeline.process_file(&files[2]).await,
    ];
    match &outcomes[0] {
        FileOutcome::Failed { reason } => assert!(reason.contains("a_empty.txt is empty")),
        other => panic!("expected empty failure, got {:?}", other),
    }
    match &outcomes[1] {
        FileOutcome::Failed { reason } => {
            assert!(reason.contains("could not decode b_bad.txt"), "{}", reason)
        }
        other => panic!("expected decode failure, got {:?}", other),
    }
    assert!(matches!(outcomes[2], FileOutcome::Inserted { .. }));
    assert_eq!(store.documents().len(), 1);
}

#[tokio::test]
async fn model_errors_are_per_file() {
    let corpus = ten_file_corpus();
    let files = scan(corpus.path());
    let store = InMemoryStore::new();

    let report = IngestionPipeline::new(&store, &BrokenEmbedder, DEFAULT_ENCODINGS.to_vec(), ack())
        .run(&files)
        .await;
    assert_eq!(report.stats.failed, 10);
    assert!(report.stats.failures[0]
        .error
        .contains("inference session closed"));
    assert!(store.documents().is_empty());
}

#[tokio::test]
async fn stored_id_reproduces_outside_the_pipeline() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("speech.txt"),
        b"\xef\xbb\xbfDiscurso\r\nSegunda l\xc3\xadnea\r\n",
    )
    .unwrap();
    let files = scan(tmp.path());

    let store = InMemoryStore::new();
    let embedder = embedder();
    let outcome = IngestionPipeline::new(&store, &embedder, DEFAULT_ENCODINGS.to_vec(), ack())
        .process_file(&files[0])
        .await;
    let FileOutcome::Inserted { id } = outcome else {
        panic!("expected insert, got {:?}", outcome);
    };

    let decoded = read_document(&files[0].path, &DEFAULT_ENCODINGS).unwrap();
    assert_eq!(decoded.text, "\u{feff}Discurso\nSegunda línea");
    assert_eq!(id, fingerprint(&decoded.text));
    assert!(is_fingerprint(&id));
}

#[tokio::test]
async fn validation_reports_minority_dimensions() {
    let store = InMemoryStore::new();
    for i in 0..9 {
        let record = Record::new(format!("texto {}", i), vec![0.1; 384]);
        store.insert(&record, &ack()).await.unwrap();
    }
    let odd = Record::new("texto raro".to_string(), vec![0.1; 300]);
    store.insert(&odd, &ack()).await.unwrap();

    let report = validate_store(&store).await;
    assert_eq!(report.total, Some(10));
    assert_eq!(
        report.majority(),
        Some(&DimensionGroup {
            dims: Some(384),
            count: 9
        })
    );
    assert_eq!(
        report.minority(),
        &[DimensionGroup {
            dims: Some(300),
            count: 1
        }]
    );
    assert!(!report.dimensions_consistent());
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("inconsistent embedding dimensions")));
    assert_eq!(store.documents().len(), 10);
}

#[tokio::test]
async fn empty_corpus_completes_with_zero_counts() {
    let tmp = TempDir::new().unwrap();
    let store = InMemoryStore::new();
    let embedder = embedder();
    let report = IngestionPipeline::new(&store, &embedder, DEFAULT_ENCODINGS.to_vec(), ack())
        .run(&scan(tmp.path()))
        .await;
    assert_eq!(report.stats.processed(), 0);
    assert_eq!(report.total_stored, Some(0));
    assert!(!report.interrupted);
}

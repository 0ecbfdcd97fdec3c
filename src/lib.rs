//! # corpus-ingest
//!
//! Idempotent ingestion of a text corpus into a replicated MongoDB
//! collection, with one semantic embedding per document.
//!
//! Each file is decoded under an ordered list of encodings, trimmed,
//! identified by the SHA-256 of its text and embedded. The resulting record
//! `{ _id, text, embedding }` is written with majority acknowledgement. The
//! id is derived from the content, so re-running over the same corpus (or a
//! superset) stores each distinct text exactly once. An already stored text
//! is reported as a duplicate, never as a failure.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌─────────────┐   ┌───────────┐
//! │  Corpus  │──▶│  Decode  │──▶│ Fingerprint │──▶│  MongoDB  │
//! │  *.txt   │   │ utf-8... │   │ + Embedding │   │ w:majority│
//! └──────────┘   └──────────┘   └─────────────┘   └─────┬─────┘
//!                                                       │
//!                                     validation + indexing pass
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`corpus`] | Corpus directory scanning |
//! | [`decode`] | Multi-encoding text decoding |
//! | [`fingerprint`] | Content-derived record ids |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Document store trait, MongoDB and in-memory backends |
//! | [`ingest`] | Pipeline orchestration |
//! | [`validate`] | Post-run validation pass |
//! | [`indexes`] | Post-run indexing pass |
//! | [`stats`] | Run statistics and report |
//! | [`progress`] | Progress reporting |
//! | [`telemetry`] | Logging setup |
//! | [`error`] | Error taxonomy |

pub mod config;
pub mod corpus;
pub mod decode;
pub mod embedding;
pub mod error;
pub mod fingerprint;
pub mod indexes;
pub mod ingest;
pub mod models;
pub mod progress;
pub mod stats;
pub mod store;
pub mod telemetry;
pub mod validate;

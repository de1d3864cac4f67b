//! Cartograph: incremental knowledge-graph ingestion for source codebases
//!
//! Cartograph keeps a queryable code graph (functions, modules, call and
//! import edges, per-file context packs) synchronized with a changing
//! codebase at minimal re-processing cost. It owns change detection,
//! per-file orchestration, edge confidence scoring, cross-file call
//! resolution, and atomic persistence; source parsing and embedding
//! vectors are consumed through the [`extraction`] traits and are the
//! caller's concern.
//!
//! # Pipeline
//!
//! A task is an ordered list of file paths, processed strictly one at a
//! time:
//! 1. change detection gates each file (exclusion rules, size limit,
//!    binary heuristic, SHA-256 checksum vs stored artifacts)
//! 2. the extraction adapter produces functions, module facts, and raw
//!    call edges for files that need work
//! 3. edges are scored by the deterministic confidence model and
//!    committed with everything else in one all-or-nothing transaction
//! 4. after the last file, a resolution pass upgrades external call
//!    placeholders whose target function now exists in the graph
//!
//! A stored checksum only ever advances inside a successful commit, so a
//! checksum match always implies the file's artifacts are consistent
//! with that exact content.
//!
//! # Failure model
//!
//! Per-file failures are recoverable: they are recorded on the task
//! result and the task moves on. Systemic causes (budget exhaustion,
//! extraction provider failure, fail-policy timeouts) are fatal: the
//! task finalizes what it has, durably records the partial run, and
//! re-throws the cause unmodified. Fatal causes are recognized by the
//! stable sentinel codes in [`error`].

pub mod change;
pub mod confidence;
pub mod config;
pub mod edges;
pub mod error;
pub mod events;
pub mod extraction;
pub mod governor;
pub mod graph;
pub mod indexer;
pub mod schema;
pub mod storage;

pub use change::{ChangeDecision, ChangeDetector, ReindexReason, SkipReason};
pub use config::{IndexingConfig, TaskOptions, TimeoutPolicy};
pub use events::{ChannelEventSink, EventSink, IndexEvent, NullEventSink};
pub use extraction::{Embedder, ExtractionAdapter, FileExtraction};
pub use governor::{Governor, TokenBudget, UnlimitedGovernor};
pub use indexer::{ExternalEdgeResolver, FileOutcome, TaskOrchestrator};
pub use schema::{IndexingResult, IndexingTask};
pub use storage::{GraphStore, SqliteStore};

/// Crate version, stamped onto every task result.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Storage contracts
//!
//! One object-safe trait covers the read surface and the atomic
//! per-file commit. Everything a successful file index produces
//! (functions, embeddings, module record, edges, context packs,
//! checksum) lands in a single all-or-nothing transaction, so a stored
//! checksum
//! match always implies artifact consistency.

mod sqlite;

pub use sqlite::SqliteStore;

use anyhow::Result;
use std::collections::BTreeMap;

use crate::confidence::EdgeSource;
use crate::graph::FunctionMetrics;
use crate::schema::{
    ContextPack, EdgeTarget, EdgeType, FunctionRecord, GraphEdge, IndexingResult, ModuleRecord,
    TaskRunRecord,
};

/// Stored vs recorded artifact counts for one file, used by the
/// completeness half of change detection. `recorded_*` values are what
/// the last successful commit wrote on the file row; the rest are live
/// counts of the artifacts themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactCounts {
    pub recorded_functions: i64,
    pub recorded_modules: i64,
    pub recorded_packs: i64,
    /// The last commit came from a truncated extraction; the file is
    /// never complete until a full extraction recommits it.
    pub partial: bool,
    pub functions: i64,
    pub modules: i64,
    pub embeddings: i64,
    pub context_packs: i64,
}

/// One function plus its embedding, headed for a commit.
#[derive(Debug, Clone)]
pub struct FunctionCommit {
    pub record: FunctionRecord,
    pub embedding: Option<Vec<f32>>,
}

/// Module record plus its vector artifacts, headed for a commit.
#[derive(Debug, Clone)]
pub struct ModuleCommit {
    pub record: ModuleRecord,
    pub embedding: Option<Vec<f32>>,
    /// Multi-vector record (one vector per summarized export).
    pub vectors: Vec<Vec<f32>>,
}

/// Source side of an edge before row ids exist.
///
/// Function sources are named; the commit maps names to the ids minted
/// by the same transaction. `Module` refers to the file's own module.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftSource {
    Function(String),
    Module,
}

/// A scored edge awaiting commit.
#[derive(Debug, Clone)]
pub struct EdgeDraft {
    pub from: DraftSource,
    pub to: EdgeTarget,
    pub edge_type: EdgeType,
    pub source: EdgeSource,
    pub ambiguous: bool,
    pub source_line: Option<u32>,
    pub confidence: f64,
}

/// Everything one successfully-extracted file commits atomically.
#[derive(Debug, Clone)]
pub struct FileCommit {
    pub path: String,
    pub checksum: String,
    /// The extraction stopped early and this artifact set is known to
    /// be truncated. The commit still lands atomically, but the file
    /// row is marked incomplete so the next pass re-indexes it.
    pub partial: bool,
    pub functions: Vec<FunctionCommit>,
    pub module: Option<ModuleCommit>,
    pub edges: Vec<EdgeDraft>,
    pub context_packs: Vec<ContextPack>,
}

/// What a commit actually wrote. Sorted maps keep downstream event
/// emission deterministic.
#[derive(Debug, Clone, Default)]
pub struct CommitReceipt {
    /// Function name -> row id for every committed function.
    pub function_ids: BTreeMap<String, i64>,
    /// Ids minted by this commit (as opposed to reused).
    pub created_functions: Vec<i64>,
    pub module_id: Option<i64>,
    pub module_created: bool,
    pub edges_deleted: usize,
    pub edges_inserted: usize,
    pub context_packs: usize,
}

/// Read surface plus atomic writer for the knowledge graph.
///
/// Implementations must make [`GraphStore::commit_file`] all-or-nothing:
/// the checksum only advances when every artifact in the commit landed.
pub trait GraphStore: Send + Sync {
    // ===== Read surface =====

    /// Stored content checksum for a path, if the file was ever committed.
    fn get_checksum(&self, path: &str) -> Result<Option<String>>;

    /// Artifact counts for the completeness check; `None` for unknown files.
    fn artifact_counts(&self, path: &str) -> Result<Option<ArtifactCounts>>;

    /// Function by identity `(file_path, name)`.
    fn get_function(&self, path: &str, name: &str) -> Result<Option<FunctionRecord>>;

    /// All stored modules (seed for the task-scoped module-path cache).
    fn list_modules(&self) -> Result<Vec<ModuleRecord>>;

    /// All stored functions, bounded.
    fn list_functions(&self, limit: usize) -> Result<Vec<FunctionRecord>>;

    /// All stored edges of one type.
    fn list_edges(&self, edge_type: EdgeType) -> Result<Vec<GraphEdge>>;

    /// Edges owned by one source file, for verification and tooling.
    fn edges_for_file(&self, path: &str) -> Result<Vec<GraphEdge>>;

    /// Stored embedding for a function, if any.
    fn function_embedding(&self, function_id: i64) -> Result<Option<Vec<f32>>>;

    /// Batched metrics row for a function, if any.
    fn get_graph_metrics(&self, function_id: i64) -> Result<Option<FunctionMetrics>>;

    /// Durably recorded task run, if any.
    fn get_task_run(&self, task_id: &str) -> Result<Option<TaskRunRecord>>;

    // ===== Writers =====

    /// Atomic per-file commit. Upserts functions and their embeddings,
    /// upserts the module and its vector record, deletes every existing
    /// edge for the source file and inserts the fresh set, upserts
    /// context packs, and finally sets the new checksum.
    fn commit_file(&self, commit: &FileCommit) -> Result<CommitReceipt>;

    /// Update only the last-accessed timestamp (unchanged-complete skip).
    fn touch_file(&self, path: &str) -> Result<()>;

    /// Update an existing edge in place (resolution pass). Never inserts.
    fn update_edge(&self, edge: &GraphEdge) -> Result<()>;

    /// Increment a function's access counter.
    fn record_function_access(&self, function_id: i64) -> Result<()>;

    /// Increment a function's success or failure counter.
    fn record_function_outcome(&self, function_id: i64, success: bool) -> Result<()>;

    /// Persist one task's batched centrality metrics.
    fn store_graph_metrics(&self, metrics: &[FunctionMetrics]) -> Result<()>;

    /// Durably record a task result before it is returned (or before a
    /// fatal cause is re-thrown).
    fn record_task_run(&self, result: &IndexingResult, outcome: &str) -> Result<()>;
}

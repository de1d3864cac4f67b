//! Persisted record types for the knowledge graph
//!
//! All records serialize with serde; row ids are `Option<i64>` and are
//! assigned by storage at commit time. Identity rules:
//! - functions: `(file_path, name)`; re-indexing reuses the stored id so
//!   edges and history survive
//! - modules: `path`
//! - edges: owned by their `source_file` and fully replaced on every
//!   successful re-index of that file

use serde::{Deserialize, Serialize};

use crate::confidence::EdgeSource;

/// A function extracted from a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub id: Option<i64>,
    pub file_path: String,
    pub name: String,
    pub signature: String,
    pub purpose: String,
    pub start_line: u32,
    pub end_line: u32,
    /// Extraction confidence for the function record itself.
    pub confidence: f64,
    pub access_count: i64,
    pub success_count: i64,
    pub failure_count: i64,
}

impl FunctionRecord {
    pub fn new(file_path: &str, name: &str) -> Self {
        Self {
            id: None,
            file_path: file_path.to_string(),
            name: name.to_string(),
            signature: String::new(),
            purpose: String::new(),
            start_line: 0,
            end_line: 0,
            confidence: 0.0,
            access_count: 0,
            success_count: 0,
            failure_count: 0,
        }
    }
}

/// A module (one per source file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub id: Option<i64>,
    /// Normalized file path; doubles as the module-cache key.
    pub path: String,
    pub purpose: String,
    /// Exported names, in source order.
    pub exports: Vec<String>,
    /// Import specifiers, in source order.
    pub dependencies: Vec<String>,
}

/// Relationship kind carried by a graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Calls,
    Imports,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Calls => "calls",
            EdgeType::Imports => "imports",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "calls" => Some(EdgeType::Calls),
            "imports" => Some(EdgeType::Imports),
            _ => None,
        }
    }
}

/// The source side of a persisted edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum EdgeNode {
    Function(i64),
    Module(i64),
}

/// The target side of an edge.
///
/// `External` is a first-class transitional state, not an error: the
/// target function had not been indexed at edge-creation time and is
/// recorded by name until the cross-task resolution pass finds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum EdgeTarget {
    Function(i64),
    Module(i64),
    External(String),
}

impl EdgeTarget {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, EdgeTarget::External(_))
    }
}

/// A persisted call/import relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: Option<i64>,
    pub from: EdgeNode,
    pub to: EdgeTarget,
    pub edge_type: EdgeType,
    /// How the relationship was derived; kept so the resolution pass can
    /// re-score the edge with its original evidence.
    pub source: EdgeSource,
    pub ambiguous: bool,
    pub source_file: String,
    pub source_line: Option<u32>,
    /// Always within [0.15, 0.95].
    pub confidence: f64,
    /// Unix timestamp of the last scoring.
    pub computed_at: i64,
}

/// A per-file summary artifact used by downstream retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPack {
    pub id: Option<i64>,
    pub file_path: String,
    pub kind: String,
    pub content: String,
}

/// One error recorded against a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileError {
    pub path: String,
    pub message: String,
    /// `false` marks systemic causes (budget exhaustion, provider
    /// failure, task-aborting timeout); the task did not continue past
    /// a non-recoverable error.
    pub recoverable: bool,
}

/// An ordered batch of files to index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingTask {
    pub id: String,
    pub task_type: String,
    /// Processed strictly in this order; no reordering, no fan-out.
    pub paths: Vec<String>,
}

impl IndexingTask {
    pub fn new(task_type: &str, paths: Vec<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_type: task_type.to_string(),
            paths,
        }
    }
}

/// Aggregated outcome of one task run.
///
/// Counting rules: `files_processed` counts files whose pipeline ran to a
/// committed index; `files_skipped` counts gate skips and timeout-policy
/// skips; files that failed recoverably appear only in `errors`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingResult {
    pub task_id: String,
    pub task_type: String,
    pub started_at: i64,
    pub completed_at: i64,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub functions_indexed: usize,
    pub modules_indexed: usize,
    pub context_packs_created: usize,
    pub errors: Vec<FileError>,
    pub version: String,
}

impl IndexingResult {
    pub fn duration_secs(&self) -> i64 {
        (self.completed_at - self.started_at).max(0)
    }
}

/// A durably recorded task run, as read back from storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRunRecord {
    pub task_id: String,
    pub task_type: String,
    pub started_at: i64,
    pub finished_at: i64,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub functions_indexed: usize,
    pub modules_indexed: usize,
    pub context_packs_created: usize,
    /// "success", "partial", or "fatal".
    pub outcome: String,
    pub errors: Vec<FileError>,
    pub version: String,
}

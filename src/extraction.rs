//! Consumed extraction and embedding contracts
//!
//! Cartograph never parses source syntax or computes vectors itself;
//! both concerns live behind these traits. Adapters signal fatal
//! conditions (budget exhausted, provider unavailable, provider returned
//! invalid output) with the sentinel codes from [`crate::error`]; any
//! other error is treated as an ordinary, recoverable per-file failure.

use anyhow::Result;

/// One function found in a file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFunction {
    pub name: String,
    pub signature: String,
    pub purpose: String,
    pub start_line: u32,
    pub end_line: u32,
    /// Adapter's confidence in the extraction itself.
    pub confidence: f64,
}

/// Module-level facts for a file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedModule {
    pub purpose: String,
    pub exports: Vec<String>,
    pub dependencies: Vec<String>,
}

/// Target of a raw call edge as reported by the adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCallTarget {
    /// The adapter already resolved the callee to a stored function id.
    Function(i64),
    /// Bare target name; resolved later (or left as a placeholder).
    Name(String),
}

/// A call relationship as reported by the adapter, before scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCallEdge {
    /// Name of the calling function. Must belong to this file's
    /// extracted set or the edge is dropped during edge building.
    pub source_function: String,
    pub target: RawCallTarget,
    pub line: Option<u32>,
    pub ambiguous: bool,
    /// Number of same-name candidates at the call site; > 1 implies
    /// ambiguity.
    pub overload_count: u32,
}

/// Everything an adapter produces for one file.
#[derive(Debug, Clone, Default)]
pub struct FileExtraction {
    pub functions: Vec<ExtractedFunction>,
    pub module: Option<ExtractedModule>,
    pub call_edges: Vec<RawCallEdge>,
    /// The adapter stopped early (for example, hit a size budget) and
    /// the extraction is known to be incomplete. The commit still lands,
    /// but the file row is marked partial so change detection re-indexes
    /// the file on the next pass.
    pub partially_indexed: bool,
    /// Parser identifier; [`crate::confidence::LLM_FALLBACK_PARSER`]
    /// lowers edge confidence.
    pub parser_name: String,
}

/// Per-file extraction contract.
pub trait ExtractionAdapter: Send + Sync {
    /// Extract functions, module facts, and raw call edges from one file.
    ///
    /// # Errors
    /// Fatal errors must carry a sentinel code from [`crate::error`] in
    /// their text and are propagated unmodified, aborting the whole
    /// task. Every other error is converted into a recoverable per-file
    /// error by the orchestrator.
    fn extract(&self, path: &str, content: &str) -> Result<FileExtraction>;
}

/// Embedding-vector contract. Vector computation internals are out of
/// scope; failures are wrapped with file context and recorded as
/// recoverable.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

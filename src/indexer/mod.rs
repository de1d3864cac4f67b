//! Indexing orchestration
//!
//! Per-file state machine, sequential task loop, and the cross-file
//! resolution pass that runs once per task after every file committed.

mod file_index;
mod resolver;
mod task;

pub use file_index::{FileIndexOrchestrator, FileOutcome, FileStats, TaskContext};
pub use resolver::{ExternalEdgeResolver, ResolutionSummary};
pub use task::TaskOrchestrator;

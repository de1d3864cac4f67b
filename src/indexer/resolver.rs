//! Cross-file call resolution
//!
//! Runs once per task, after every file has committed, and turns
//! external call placeholders into resolved function targets where the
//! named function now exists in the graph. Forward references therefore
//! resolve one pass late at the worst: the file that defines the callee
//! commits during the same task, and this pass picks it up.
//!
//! Resolution is name-based and global. A name with exactly one stored
//! candidate resolves cleanly and is re-scored with its original
//! evidence; a name with several candidates resolves to the first in
//! `(file_path, id)` order, is marked ambiguous, and its re-scored
//! confidence is capped. Names with no candidate are left untouched for
//! a later task.

use ahash::AHashMap;
use anyhow::Result;
use std::sync::Arc;

use crate::confidence::{self, EdgeEvidence, AMBIGUOUS_RESOLUTION_CAP};
use crate::events::{EventSink, IndexEvent};
use crate::schema::{EdgeTarget, EdgeType, FunctionRecord, GraphEdge};
use crate::storage::GraphStore;

/// Bound on the functions loaded for the name table.
const RESOLVER_FUNCTION_LIMIT: usize = 100_000;

/// Counters for one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResolutionSummary {
    /// External call placeholders present when the pass started.
    pub total: usize,
    /// Placeholders resolved by this pass.
    pub resolved: usize,
    /// Resolved edges that had several same-name candidates.
    pub ambiguous: usize,
}

impl ResolutionSummary {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.resolved as f64 / self.total as f64 * 100.0
    }
}

/// The per-task resolution pass.
pub struct ExternalEdgeResolver {
    store: Arc<dyn GraphStore>,
    events: Arc<dyn EventSink>,
}

impl ExternalEdgeResolver {
    pub fn new(store: Arc<dyn GraphStore>, events: Arc<dyn EventSink>) -> Self {
        Self { store, events }
    }

    /// Resolve every external call placeholder it can.
    ///
    /// # Behavior
    /// Loads all call edges and builds a name -> candidates table from
    /// stored functions, candidates sorted by `(file_path, id)`. Each
    /// placeholder with at least one candidate is updated in place with
    /// the winning id and a fresh confidence from its stored evidence;
    /// multi-candidate matches are marked ambiguous and capped. Edges
    /// whose name matches nothing are left external. Per-edge update
    /// failures are swallowed so one bad row cannot starve the rest of
    /// the pass. Idempotent: a second pass over the same graph changes
    /// nothing.
    pub fn resolve_all(&self) -> Result<ResolutionSummary> {
        let edges = self.store.list_edges(EdgeType::Calls)?;
        let placeholders: Vec<&GraphEdge> = edges
            .iter()
            .filter(|e| matches!(e.to, EdgeTarget::External(_)))
            .collect();

        let mut summary = ResolutionSummary {
            total: placeholders.len(),
            ..Default::default()
        };
        if placeholders.is_empty() {
            self.emit_summary(&summary);
            return Ok(summary);
        }

        let by_name = build_name_table(self.store.list_functions(RESOLVER_FUNCTION_LIMIT)?);

        for edge in placeholders {
            let name = match &edge.to {
                EdgeTarget::External(name) => name,
                _ => continue,
            };
            let candidates = match by_name.get(name.as_str()) {
                Some(candidates) => candidates,
                None => continue,
            };
            let winner = candidates[0];
            let ambiguous = candidates.len() > 1;

            let mut resolved = edge.clone();
            resolved.to = EdgeTarget::Function(winner);
            resolved.ambiguous = edge.ambiguous || ambiguous;
            resolved.confidence = rescore(edge, resolved.ambiguous, ambiguous);
            resolved.computed_at = chrono::Utc::now().timestamp();

            if self.store.update_edge(&resolved).is_ok() {
                summary.resolved += 1;
                if ambiguous {
                    summary.ambiguous += 1;
                }
            }
        }

        self.emit_summary(&summary);
        Ok(summary)
    }

    fn emit_summary(&self, summary: &ResolutionSummary) {
        self.events.emit(IndexEvent::ExternalEdgesResolved {
            resolved: summary.resolved,
            total: summary.total,
            percent: summary.percent(),
        });
    }
}

/// Name -> candidate function ids, each list sorted by `(file_path, id)`
/// so candidate choice is deterministic across runs.
fn build_name_table(functions: Vec<FunctionRecord>) -> AHashMap<String, Vec<i64>> {
    let mut with_identity: Vec<(String, String, i64)> = functions
        .into_iter()
        .filter_map(|f| f.id.map(|id| (f.name, f.file_path, id)))
        .collect();
    with_identity.sort_by(|a, b| (&a.1, a.2).cmp(&(&b.1, b.2)));

    let mut table: AHashMap<String, Vec<i64>> = AHashMap::new();
    for (name, _, id) in with_identity {
        table.entry(name).or_default().push(id);
    }
    table
}

/// Fresh confidence for a newly resolved edge, from its stored evidence.
fn rescore(edge: &GraphEdge, ambiguous: bool, capped: bool) -> f64 {
    let score = confidence::score(&EdgeEvidence {
        source: edge.source,
        has_line: edge.source_line.is_some(),
        resolved: true,
        ambiguous,
    });
    if capped {
        score.min(AMBIGUOUS_RESOLUTION_CAP)
    } else {
        score
    }
}

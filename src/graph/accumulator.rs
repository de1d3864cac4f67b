//! Task-scoped adjacency accumulator and batched centrality
//!
//! Collects function-level call adjacency while a task's files commit,
//! then computes fan-in/fan-out/degree-centrality once per task. The
//! accumulator is created at task start and discarded at task end; it is
//! never instance-lifetime state.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Batched metrics for one function node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionMetrics {
    pub function_id: i64,
    pub fan_in: i64,
    pub fan_out: i64,
    /// Degree centrality: (fan_in + fan_out) / max degree over the
    /// batch, 0.0 for an empty batch.
    pub centrality: f64,
}

/// Accumulates call adjacency across one task's commits.
#[derive(Debug, Default)]
pub struct GraphAccumulator {
    /// function id -> (fan_in, fan_out)
    degrees: AHashMap<i64, (i64, i64)>,
}

impl GraphAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a committed function so it shows up in the batch even with
    /// zero edges.
    pub fn record_function(&mut self, function_id: i64) {
        self.degrees.entry(function_id).or_insert((0, 0));
    }

    /// Record one resolved call edge between stored functions.
    /// Unresolved placeholders contribute only source fan-out via
    /// [`GraphAccumulator::record_fan_out`].
    pub fn record_call(&mut self, from_function: i64, to_function: i64) {
        self.degrees.entry(from_function).or_insert((0, 0)).1 += 1;
        self.degrees.entry(to_function).or_insert((0, 0)).0 += 1;
    }

    /// Record fan-out for a call whose target is not a stored function.
    pub fn record_fan_out(&mut self, from_function: i64) {
        self.degrees.entry(from_function).or_insert((0, 0)).1 += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.degrees.is_empty()
    }

    /// Compute the batch. Output is sorted by function id so persistence
    /// order is deterministic.
    pub fn compute(&self) -> Vec<FunctionMetrics> {
        let max_degree = self
            .degrees
            .values()
            .map(|(fan_in, fan_out)| fan_in + fan_out)
            .max()
            .unwrap_or(0);

        let mut metrics: Vec<FunctionMetrics> = self
            .degrees
            .iter()
            .map(|(&function_id, &(fan_in, fan_out))| FunctionMetrics {
                function_id,
                fan_in,
                fan_out,
                centrality: if max_degree > 0 {
                    (fan_in + fan_out) as f64 / max_degree as f64
                } else {
                    0.0
                },
            })
            .collect();
        metrics.sort_by_key(|m| m.function_id);
        metrics
    }
}

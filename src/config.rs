//! Indexing configuration
//!
//! Plain serde config struct with defaults. Limits are clamped at use
//! sites rather than at deserialization time so a config loaded from
//! older data never fails outright.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::change::SkipReason;

/// Hard cap on the per-file timeout: one hour.
pub const MAX_FILE_TIMEOUT_MS: u64 = 3_600_000;

/// Hard cap on per-file timeout retries, independent of configuration.
pub const MAX_FILE_RETRIES: u32 = 5;

/// What to do when the final attempt for a file times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutPolicy {
    /// Record the file as skipped and continue with the task.
    #[default]
    Skip,
    /// Retries are already exhausted at this point; behaves as `Fail`.
    Retry,
    /// Propagate the timeout and abort the task.
    Fail,
}

/// Configuration for indexing tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Files larger than this are skipped before extraction.
    pub max_file_size_bytes: u64,
    /// Extensions (without dot) eligible for indexing.
    pub included_extensions: Vec<String>,
    /// Glob patterns for paths that are never indexed.
    pub exclude_patterns: Vec<String>,
    /// Reindex every file regardless of checksum state.
    pub force_reindex: bool,
    /// Per-file timeout in milliseconds. 0 disables the timeout race;
    /// values above [`MAX_FILE_TIMEOUT_MS`] are clamped.
    pub file_timeout_ms: u64,
    /// Extra attempts after a per-file timeout. Clamped to
    /// [`MAX_FILE_RETRIES`]. Only timeouts are retried; ordinary
    /// extraction or persistence failures never are.
    pub file_retries: u32,
    /// Policy for a timeout on the final attempt.
    pub timeout_policy: TimeoutPolicy,
    /// Cap on functions committed per file (after last-wins dedupe).
    pub max_functions_per_file: usize,
    /// Compute and persist batched graph-centrality metrics per task.
    pub compute_graph_metrics: bool,
    /// Artifact completeness requires stored function embeddings.
    pub embeddings_required: bool,
    /// Artifact completeness requires a stored context pack.
    pub context_packs_required: bool,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 1_048_576,
            included_extensions: vec![
                "rs".to_string(),
                "py".to_string(),
                "ts".to_string(),
                "tsx".to_string(),
                "js".to_string(),
                "jsx".to_string(),
            ],
            exclude_patterns: vec![
                "**/node_modules/**".to_string(),
                "**/target/**".to_string(),
                "**/.git/**".to_string(),
            ],
            force_reindex: false,
            file_timeout_ms: 0,
            file_retries: 1,
            timeout_policy: TimeoutPolicy::Skip,
            max_functions_per_file: 50,
            compute_graph_metrics: true,
            embeddings_required: true,
            context_packs_required: true,
        }
    }
}

impl IndexingConfig {
    /// Effective per-file timeout, with the one-hour cap applied.
    /// Returns `None` when the timeout race is disabled.
    pub fn effective_timeout(&self) -> Option<Duration> {
        if self.file_timeout_ms == 0 {
            return None;
        }
        Some(Duration::from_millis(
            self.file_timeout_ms.min(MAX_FILE_TIMEOUT_MS),
        ))
    }

    /// Effective retry count, with the hard cap applied.
    pub fn effective_retries(&self) -> u32 {
        self.file_retries.min(MAX_FILE_RETRIES)
    }
}

/// Progress callback: receives (current, total) as files are attempted.
pub type ProgressFn = dyn Fn(usize, usize) + Send + Sync;

/// Skip callback: receives the path and the reason it was skipped.
pub type SkipFn = dyn Fn(&str, &SkipReason) + Send + Sync;

/// Per-task options that cannot live in the serde config (callbacks).
#[derive(Default, Clone)]
pub struct TaskOptions {
    pub on_progress: Option<Arc<ProgressFn>>,
    pub on_skip: Option<Arc<SkipFn>>,
}

impl std::fmt::Debug for TaskOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskOptions")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_skip", &self.on_skip.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_no_timeout_race() {
        let config = IndexingConfig::default();
        assert_eq!(config.effective_timeout(), None);
    }

    #[test]
    fn test_timeout_is_capped_at_one_hour() {
        let config = IndexingConfig {
            file_timeout_ms: 86_400_000,
            ..Default::default()
        };
        assert_eq!(
            config.effective_timeout(),
            Some(Duration::from_millis(MAX_FILE_TIMEOUT_MS))
        );
    }

    #[test]
    fn test_retries_are_hard_capped() {
        let config = IndexingConfig {
            file_retries: 100,
            ..Default::default()
        };
        assert_eq!(config.effective_retries(), MAX_FILE_RETRIES);
    }

    #[test]
    fn test_timeout_policy_serde_spelling() {
        let json = serde_json::to_string(&TimeoutPolicy::Fail).unwrap();
        assert_eq!(json, "\"fail\"");
        let policy: TimeoutPolicy = serde_json::from_str("\"skip\"").unwrap();
        assert_eq!(policy, TimeoutPolicy::Skip);
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = IndexingConfig {
            file_timeout_ms: 1500,
            timeout_policy: TimeoutPolicy::Retry,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: IndexingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.file_timeout_ms, 1500);
        assert_eq!(back.timeout_policy, TimeoutPolicy::Retry);
    }
}

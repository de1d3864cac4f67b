//! Sequential task orchestration
//!
//! Processes a task's files strictly in order, one at a time. Per-file
//! work can be raced against a timeout on a helper thread; everything
//! else is synchronous. A fatal cause (budget exhausted, provider
//! failure, fail-policy timeout) stops the loop, but the partial result
//! is still finalized, durably recorded, and only then is the cause
//! re-thrown unmodified.

use anyhow::Result;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use crate::change::SkipReason;
use crate::config::{IndexingConfig, TaskOptions, TimeoutPolicy};
use crate::error::IndexError;
use crate::events::{EventSink, IndexEvent};
use crate::extraction::{Embedder, ExtractionAdapter};
use crate::governor::Governor;
use crate::indexer::file_index::{FileIndexOrchestrator, FileOutcome, TaskContext};
use crate::indexer::resolver::ExternalEdgeResolver;
use crate::schema::{FileError, IndexingResult, IndexingTask};
use crate::storage::GraphStore;

/// Runs whole indexing tasks against one store.
pub struct TaskOrchestrator {
    store: Arc<dyn GraphStore>,
    events: Arc<dyn EventSink>,
    governor: Arc<dyn Governor>,
    config: IndexingConfig,
    files: FileIndexOrchestrator,
}

impl TaskOrchestrator {
    pub fn new(
        store: Arc<dyn GraphStore>,
        adapter: Arc<dyn ExtractionAdapter>,
        embedder: Arc<dyn Embedder>,
        events: Arc<dyn EventSink>,
        governor: Arc<dyn Governor>,
        config: IndexingConfig,
    ) -> Result<Self> {
        let files = FileIndexOrchestrator::new(
            Arc::clone(&store),
            adapter,
            embedder,
            Arc::clone(&events),
            config.clone(),
        )?;
        Ok(Self {
            store,
            events,
            governor,
            config,
            files,
        })
    }

    /// Run one task to completion.
    ///
    /// # Behavior
    /// - Files are processed in task order; a file's failure never
    ///   reorders or drops the files after it.
    /// - The governor is checked before each file. Exhaustion records
    ///   the current file as a non-recoverable error and halts the loop;
    ///   files already committed stay committed.
    /// - A timed-out attempt is retried up to the configured count; on
    ///   final-attempt timeout the policy decides between a recorded
    ///   skip and aborting the task.
    /// - Finalization always runs: batched graph metrics, the external
    ///   edge resolution pass, the durable task-run record, and the
    ///   completion event all happen even on the fatal path, after
    ///   which the fatal cause is re-thrown unmodified.
    pub fn run(&self, task: &IndexingTask, options: &TaskOptions) -> Result<IndexingResult> {
        let started_at = chrono::Utc::now().timestamp();
        self.events.emit(IndexEvent::IndexingStarted {
            task_id: task.id.clone(),
            files: task.paths.len(),
        });

        let modules = self.store.list_modules()?;
        let ctx = TaskContext::new(
            crate::edges::ModulePathCache::from_modules(&modules),
            self.config.compute_graph_metrics,
        );

        let mut result = IndexingResult {
            task_id: task.id.clone(),
            task_type: task.task_type.clone(),
            started_at,
            completed_at: started_at,
            files_processed: 0,
            files_skipped: 0,
            functions_indexed: 0,
            modules_indexed: 0,
            context_packs_created: 0,
            errors: Vec::new(),
            version: crate::VERSION.to_string(),
        };
        let mut fatal_cause: Option<anyhow::Error> = None;

        for (position, path) in task.paths.iter().enumerate() {
            if let Some(on_progress) = &options.on_progress {
                on_progress(position + 1, task.paths.len());
            }

            if let Err(e) = self.governor.check_budget() {
                result.errors.push(FileError {
                    path: path.clone(),
                    message: format!("{:#}", e),
                    recoverable: false,
                });
                fatal_cause = Some(e);
                break;
            }

            match self.index_with_retries(path, &ctx) {
                Ok(Some(outcome)) => match outcome {
                    FileOutcome::Skipped(reason) => {
                        result.files_skipped += 1;
                        if let Some(on_skip) = &options.on_skip {
                            on_skip(path, &reason);
                        }
                    }
                    FileOutcome::Indexed(stats) => {
                        result.files_processed += 1;
                        result.functions_indexed += stats.functions_indexed;
                        result.modules_indexed += stats.modules_indexed;
                        result.context_packs_created += stats.context_packs_created;
                        result.errors.extend(stats.errors);
                    }
                    FileOutcome::Failed { message } => {
                        result.errors.push(FileError {
                            path: path.clone(),
                            message,
                            recoverable: true,
                        });
                    }
                },
                Ok(None) => {
                    // Every attempt timed out.
                    let timeout_ms = self.config.file_timeout_ms;
                    match self.config.timeout_policy {
                        TimeoutPolicy::Skip => {
                            result.files_skipped += 1;
                            result.errors.push(FileError {
                                path: path.clone(),
                                message: format!(
                                    "timed out after {} ms on every attempt; skipped",
                                    timeout_ms
                                ),
                                recoverable: true,
                            });
                            if let Some(on_skip) = &options.on_skip {
                                on_skip(path, &SkipReason::TimedOut);
                            }
                        }
                        // Retries are exhausted here, so retry == fail.
                        TimeoutPolicy::Retry | TimeoutPolicy::Fail => {
                            let err: anyhow::Error = IndexError::Timeout {
                                path: path.clone(),
                                timeout_ms,
                            }
                            .into();
                            result.errors.push(FileError {
                                path: path.clone(),
                                message: format!("{:#}", err),
                                recoverable: false,
                            });
                            fatal_cause = Some(err);
                            break;
                        }
                    }
                }
                Err(e) => {
                    result.errors.push(FileError {
                        path: path.clone(),
                        message: format!("{:#}", e),
                        recoverable: false,
                    });
                    fatal_cause = Some(e);
                    break;
                }
            }
        }

        self.finalize(&mut result, &ctx);

        result.completed_at = chrono::Utc::now().timestamp();
        let outcome = match (&fatal_cause, result.errors.is_empty()) {
            (Some(_), _) => "fatal",
            (None, false) => "partial",
            (None, true) => "success",
        };
        if let Err(e) = self.store.record_task_run(&result, outcome) {
            // The run record is durability bookkeeping; losing it never
            // masks a fatal cause.
            if fatal_cause.is_none() {
                fatal_cause = Some(e.context("failed to record task run"));
            }
        }

        self.events.emit(IndexEvent::IndexingComplete {
            task_id: task.id.clone(),
            files_processed: result.files_processed,
            outcome: outcome.to_string(),
        });

        match fatal_cause {
            Some(cause) => Err(cause),
            None => Ok(result),
        }
    }

    /// One file, with the timeout race and retry loop.
    ///
    /// `Ok(None)` means every attempt timed out; fatal errors from an
    /// attempt propagate as `Err`.
    fn index_with_retries(&self, path: &str, ctx: &TaskContext) -> Result<Option<FileOutcome>> {
        let timeout = match self.config.effective_timeout() {
            Some(timeout) => timeout,
            None => return self.files.index_file(path, ctx).map(Some),
        };

        let attempts = 1 + self.config.effective_retries();
        for _ in 0..attempts {
            match self.race_attempt(path, ctx, timeout) {
                Some(outcome) => return outcome.map(Some),
                None => continue,
            }
        }
        Ok(None)
    }

    /// Race one attempt against the timeout on a helper thread.
    ///
    /// A timed-out attempt is abandoned, not killed: dropping the
    /// receiver makes its eventual send fail silently, and because
    /// commits are idempotent a late commit converges with whatever a
    /// retry produced.
    fn race_attempt(
        &self,
        path: &str,
        ctx: &TaskContext,
        timeout: Duration,
    ) -> Option<Result<FileOutcome>> {
        let (tx, rx) = mpsc::channel();
        let files = self.files.clone();
        let ctx = ctx.clone();
        let path = path.to_string();
        std::thread::spawn(move || {
            let _ = tx.send(files.index_file(&path, &ctx));
        });
        match rx.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(_) => None,
        }
    }

    /// Per-task finalization: batched metrics, then the cross-file
    /// resolution pass. Both record recoverable errors rather than
    /// failing the task.
    fn finalize(&self, result: &mut IndexingResult, ctx: &TaskContext) {
        if let Some(accumulator) = &ctx.accumulator {
            let metrics = match accumulator.lock() {
                Ok(accumulator) if !accumulator.is_empty() => Some(accumulator.compute()),
                Ok(_) => None,
                Err(_) => {
                    result.errors.push(FileError {
                        path: String::new(),
                        message: "graph accumulator mutex poisoned; metrics dropped".to_string(),
                        recoverable: true,
                    });
                    None
                }
            };
            if let Some(metrics) = metrics {
                if let Err(e) = self.store.store_graph_metrics(&metrics) {
                    result.errors.push(FileError {
                        path: String::new(),
                        message: format!("failed to store graph metrics: {:#}", e),
                        recoverable: true,
                    });
                }
            }
        }

        let resolver = ExternalEdgeResolver::new(Arc::clone(&self.store), Arc::clone(&self.events));
        if let Err(e) = resolver.resolve_all() {
            result.errors.push(FileError {
                path: String::new(),
                message: format!("external edge resolution failed: {:#}", e),
                recoverable: true,
            });
        }
    }
}

impl std::fmt::Debug for TaskOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskOrchestrator")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Timeout policy interaction is exercised end to end in the
    // integration tests; this covers only the attempt arithmetic.
    #[test]
    fn test_attempt_count_includes_first_try() {
        let config = IndexingConfig {
            file_timeout_ms: 100,
            file_retries: 2,
            ..Default::default()
        };
        assert_eq!(1 + config.effective_retries(), 3);
    }

    fn _assert_send<T: Send>() {}

    #[test]
    fn test_raced_state_is_send() {
        _assert_send::<FileIndexOrchestrator>();
        _assert_send::<TaskContext>();
    }
}

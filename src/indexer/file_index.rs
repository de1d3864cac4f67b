//! Per-file indexing state machine
//!
//! Drives one file through gating checks, extraction, dedupe, embedding,
//! edge building, the atomic commit, and post-commit bookkeeping.
//!
//! # States
//!
//! `Excluded/TooLarge/Binary/ReadError` -> terminal-done;
//! `UnchangedComplete` -> terminal-skip (with access touch);
//! `Extract` -> `{Success, PartialBudget, Fatal, Recoverable}`;
//! `Persist` -> `{Committed, Failed}`; post-commit bookkeeping (events,
//! cache/accumulator updates) runs only after `Committed`.
//!
//! Fatal extraction errors propagate uncaught and abort the whole task;
//! every other failure is converted into a recoverable per-file error.

use anyhow::{anyhow, Result};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::change::{ChangeDecision, ChangeDetector, SkipReason};
use crate::config::IndexingConfig;
use crate::edges::{GraphEdgeBuilder, ModulePathCache};
use crate::error::is_fatal_error;
use crate::events::{EntityKind, EventSink, IndexEvent};
use crate::extraction::{ExtractedFunction, ExtractedModule, ExtractionAdapter, Embedder};
use crate::graph::GraphAccumulator;
use crate::schema::{ContextPack, EdgeTarget, FileError, FunctionRecord, ModuleRecord};
use crate::storage::{
    CommitReceipt, DraftSource, FileCommit, FunctionCommit, GraphStore, ModuleCommit,
};

/// Caches owned by one task invocation and shared with its attempt
/// threads. Created at task start, discarded at task end; never reused
/// across tasks.
#[derive(Clone)]
pub struct TaskContext {
    pub module_cache: Arc<Mutex<ModulePathCache>>,
    pub accumulator: Option<Arc<Mutex<GraphAccumulator>>>,
}

impl TaskContext {
    pub fn new(module_cache: ModulePathCache, with_accumulator: bool) -> Self {
        Self {
            module_cache: Arc::new(Mutex::new(module_cache)),
            accumulator: with_accumulator
                .then(|| Arc::new(Mutex::new(GraphAccumulator::new()))),
        }
    }
}

/// Counters for one indexed file.
#[derive(Debug, Default, Clone)]
pub struct FileStats {
    /// Functions the adapter extracted, before dedupe or caps. Reported
    /// even when zero were indexed.
    pub functions_found: usize,
    pub functions_indexed: usize,
    pub modules_indexed: usize,
    pub context_packs_created: usize,
    pub edges_created: usize,
    /// Per-function/per-embedding failures; all recoverable.
    pub errors: Vec<FileError>,
}

/// Terminal outcome of one file's state machine.
#[derive(Debug)]
pub enum FileOutcome {
    Skipped(SkipReason),
    Indexed(FileStats),
    /// Recoverable whole-file failure (read, ordinary extraction, or
    /// transaction failure). The task continues.
    Failed { message: String },
}

/// Per-file orchestrator. Cheap to clone: collaborators sit behind
/// `Arc` so a clone can be moved onto a raced attempt thread.
#[derive(Clone)]
pub struct FileIndexOrchestrator {
    store: Arc<dyn GraphStore>,
    adapter: Arc<dyn ExtractionAdapter>,
    embedder: Arc<dyn Embedder>,
    events: Arc<dyn EventSink>,
    config: IndexingConfig,
    detector: ChangeDetector,
}

impl FileIndexOrchestrator {
    pub fn new(
        store: Arc<dyn GraphStore>,
        adapter: Arc<dyn ExtractionAdapter>,
        embedder: Arc<dyn Embedder>,
        events: Arc<dyn EventSink>,
        config: IndexingConfig,
    ) -> Result<Self> {
        let detector = ChangeDetector::new(&config)?;
        Ok(Self {
            store,
            adapter,
            embedder,
            events,
            config,
            detector,
        })
    }

    /// Run the full state machine for one file.
    ///
    /// # Errors
    /// Only fatal (sentinel-carrying) errors are returned; they
    /// propagate unmodified so the task orchestrator can abort the run.
    /// Everything else becomes a [`FileOutcome`].
    pub fn index_file(&self, path: &str, ctx: &TaskContext) -> Result<FileOutcome> {
        // Gate: exclusion, size, binary, checksum vs stored artifacts.
        let decision = match self.detector.evaluate(path, self.store.as_ref()) {
            Ok(decision) => decision,
            Err(e) => {
                return Ok(FileOutcome::Failed {
                    message: format!("{:#}", e),
                })
            }
        };

        let (content, checksum) = match decision {
            ChangeDecision::Skip(reason) => {
                if reason == SkipReason::Unchanged {
                    if let Err(e) = self.store.touch_file(path) {
                        return Ok(FileOutcome::Failed {
                            message: format!("failed to touch {}: {:#}", path, e),
                        });
                    }
                }
                self.events.emit(IndexEvent::FileIndexed {
                    path: path.to_string(),
                    functions_indexed: 0,
                    skipped: true,
                });
                return Ok(FileOutcome::Skipped(reason));
            }
            ChangeDecision::Reindex {
                content, checksum, ..
            } => (content, checksum),
        };

        // Extract.
        let extraction = match self.adapter.extract(path, &content) {
            Ok(extraction) => extraction,
            Err(e) if is_fatal_error(&e) => return Err(e),
            Err(e) => {
                return Ok(FileOutcome::Failed {
                    message: format!("extraction failed for {}: {:#}", path, e),
                })
            }
        };

        let mut stats = FileStats {
            functions_found: extraction.functions.len(),
            ..Default::default()
        };

        // Duplicate/overlapping definitions: last declaration wins.
        let mut functions = dedupe_last_wins(extraction.functions.clone());
        functions.truncate(self.config.max_functions_per_file);

        // Prepare function commits; per-function failures are recorded
        // and the function is withheld from the commit, but it still
        // counts as found.
        let mut function_commits: Vec<FunctionCommit> = Vec::new();
        for function in &functions {
            match self.prepare_function(path, function) {
                Ok(commit) => function_commits.push(commit),
                Err(e) if is_fatal_error(&e) => return Err(e),
                Err(e) => stats.errors.push(FileError {
                    path: path.to_string(),
                    message: format!("{:#}", e),
                    recoverable: true,
                }),
            }
        }

        let module_commit = match &extraction.module {
            Some(module) => match self.prepare_module(path, module, &mut stats.errors) {
                Ok(commit) => Some(commit),
                Err(e) => return Err(e), // only fatal escapes prepare_module
            },
            None => None,
        };

        let context_pack = build_context_pack(path, extraction.module.as_ref(), &function_commits);

        // Edges: dangling sources dropped, unresolved targets become
        // placeholders, imports resolved against the task cache.
        let committed_names: BTreeSet<String> = function_commits
            .iter()
            .map(|c| c.record.name.clone())
            .collect();
        let builder = GraphEdgeBuilder::new(&self.config.included_extensions);
        let mut edges = builder.build_call_edges(
            &extraction.call_edges,
            &committed_names,
            &extraction.parser_name,
        );
        if let Some(module) = &extraction.module {
            let cache = lock(&ctx.module_cache)?;
            edges.extend(builder.build_import_edges(
                module,
                path,
                &cache,
                &extraction.parser_name,
            ));
        }

        // Persist: one all-or-nothing transaction.
        let commit = FileCommit {
            path: path.to_string(),
            checksum,
            partial: extraction.partially_indexed,
            functions: function_commits,
            module: module_commit,
            edges,
            context_packs: vec![context_pack],
        };
        let receipt = match self.store.commit_file(&commit) {
            Ok(receipt) => receipt,
            Err(e) => {
                return Ok(FileOutcome::Failed {
                    message: format!("commit failed for {}: {:#}", path, e),
                })
            }
        };

        stats.functions_indexed = receipt.function_ids.len();
        stats.modules_indexed = usize::from(receipt.module_id.is_some());
        stats.context_packs_created = receipt.context_packs;
        stats.edges_created = receipt.edges_inserted;

        // Post-commit bookkeeping; failures here do not undo the commit.
        if let Err(e) = self.post_commit(path, &commit, &receipt, ctx) {
            stats.errors.push(FileError {
                path: path.to_string(),
                message: format!("post-commit bookkeeping failed: {:#}", e),
                recoverable: true,
            });
        }

        Ok(FileOutcome::Indexed(stats))
    }

    /// Reuse stored identity and attach an embedding.
    fn prepare_function(&self, path: &str, function: &ExtractedFunction) -> Result<FunctionCommit> {
        let existing = self.store.get_function(path, &function.name)?;
        let record = FunctionRecord {
            id: existing.and_then(|f| f.id),
            file_path: path.to_string(),
            name: function.name.clone(),
            signature: function.signature.clone(),
            purpose: function.purpose.clone(),
            start_line: function.start_line,
            end_line: function.end_line,
            confidence: function.confidence,
            access_count: 0,
            success_count: 0,
            failure_count: 0,
        };

        let text = format!("{}\n{}", function.signature, function.purpose);
        let embedding = match self.embedder.embed(&text) {
            Ok(vector) => Some(vector),
            Err(e) if is_fatal_error(&e) => return Err(e),
            Err(e) => {
                return Err(anyhow!(
                    "embedding failed for {} in {}: {:#}",
                    function.name,
                    path,
                    e
                ))
            }
        };

        Ok(FunctionCommit { record, embedding })
    }

    /// Module embedding failures are recorded but the module record is
    /// still committed (its vectors can be repaired on a later pass).
    fn prepare_module(
        &self,
        path: &str,
        module: &ExtractedModule,
        errors: &mut Vec<FileError>,
    ) -> Result<ModuleCommit> {
        let record = ModuleRecord {
            id: None,
            path: path.to_string(),
            purpose: module.purpose.clone(),
            exports: module.exports.clone(),
            dependencies: module.dependencies.clone(),
        };

        let embedding = match self.embedder.embed(&module.purpose) {
            Ok(vector) => Some(vector),
            Err(e) if is_fatal_error(&e) => return Err(e),
            Err(e) => {
                errors.push(FileError {
                    path: path.to_string(),
                    message: format!("module embedding failed for {}: {:#}", path, e),
                    recoverable: true,
                });
                None
            }
        };

        // Multi-vector record: one vector per summarized export.
        let mut vectors = Vec::new();
        for export in module.exports.iter().take(8) {
            match self.embedder.embed(export) {
                Ok(vector) => vectors.push(vector),
                Err(e) if is_fatal_error(&e) => return Err(e),
                Err(e) => {
                    errors.push(FileError {
                        path: path.to_string(),
                        message: format!(
                            "export embedding failed for {} in {}: {:#}",
                            export, path, e
                        ),
                        recoverable: true,
                    });
                    break;
                }
            }
        }

        Ok(ModuleCommit {
            record,
            embedding,
            vectors,
        })
    }

    /// Events, cache updates, and accumulator recording. Runs only for
    /// committed files.
    fn post_commit(
        &self,
        path: &str,
        commit: &FileCommit,
        receipt: &CommitReceipt,
        ctx: &TaskContext,
    ) -> Result<()> {
        if let Some(module_id) = receipt.module_id {
            lock(&ctx.module_cache)?.insert(path, module_id);
        }

        if let Some(accumulator) = &ctx.accumulator {
            let mut accumulator = lock(accumulator)?;
            for id in receipt.function_ids.values() {
                accumulator.record_function(*id);
            }
            for draft in &commit.edges {
                let from_id = match &draft.from {
                    DraftSource::Function(name) => match receipt.function_ids.get(name) {
                        Some(id) => *id,
                        None => continue,
                    },
                    DraftSource::Module => continue,
                };
                match &draft.to {
                    EdgeTarget::Function(to_id) => accumulator.record_call(from_id, *to_id),
                    EdgeTarget::External(_) => accumulator.record_fan_out(from_id),
                    EdgeTarget::Module(_) => {}
                }
            }
        }

        if receipt.edges_deleted > 0 {
            self.events.emit(IndexEvent::EntityDeleted {
                kind: EntityKind::Edge,
                count: receipt.edges_deleted,
            });
        }
        for (name, id) in &receipt.function_ids {
            if receipt.created_functions.contains(id) {
                self.events.emit(IndexEvent::EntityCreated {
                    kind: EntityKind::Function,
                    id: *id,
                });
            } else {
                self.events.emit(IndexEvent::EntityUpdated {
                    kind: EntityKind::Function,
                    id: *id,
                });
            }
            self.events.emit(IndexEvent::FunctionIndexed {
                file_path: path.to_string(),
                name: name.clone(),
            });
        }
        if let Some(module_id) = receipt.module_id {
            if receipt.module_created {
                self.events.emit(IndexEvent::EntityCreated {
                    kind: EntityKind::Module,
                    id: module_id,
                });
            } else {
                self.events.emit(IndexEvent::EntityUpdated {
                    kind: EntityKind::Module,
                    id: module_id,
                });
            }
        }
        self.events.emit(IndexEvent::FileIndexed {
            path: path.to_string(),
            functions_indexed: receipt.function_ids.len(),
            skipped: false,
        });

        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| anyhow!("task cache mutex poisoned"))
}

/// Keep the last entry in source order for each duplicated name:
/// iterate from the end, first seen from the end wins, then restore
/// source order.
fn dedupe_last_wins(functions: Vec<ExtractedFunction>) -> Vec<ExtractedFunction> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut kept: Vec<ExtractedFunction> = Vec::with_capacity(functions.len());
    for function in functions.into_iter().rev() {
        if seen.insert(function.name.clone()) {
            kept.push(function);
        }
    }
    kept.reverse();
    kept
}

/// Deterministic per-file summary artifact.
fn build_context_pack(
    path: &str,
    module: Option<&ExtractedModule>,
    functions: &[FunctionCommit],
) -> ContextPack {
    let mut content = format!("file: {}\n", path);
    if let Some(module) = module {
        if !module.purpose.is_empty() {
            content.push_str(&format!("purpose: {}\n", module.purpose));
        }
        if !module.exports.is_empty() {
            content.push_str(&format!("exports: {}\n", module.exports.join(", ")));
        }
    }
    if !functions.is_empty() {
        content.push_str("functions:\n");
        for function in functions {
            content.push_str(&format!(
                "  {} {}\n",
                function.record.name, function.record.signature
            ));
        }
    }
    ContextPack {
        id: None,
        file_path: path.to_string(),
        kind: "file_summary".to_string(),
        content,
    }
}

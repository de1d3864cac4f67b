//! Shared test doubles: a scriptable extraction adapter, stub embedders,
//! and a tempdir-backed harness that wires a full task orchestrator.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use tempfile::TempDir;

use cartograph::events::EventSink;
use cartograph::extraction::{
    Embedder, ExtractedFunction, ExtractedModule, ExtractionAdapter, FileExtraction, RawCallEdge,
    RawCallTarget,
};
use cartograph::governor::Governor;
use cartograph::{
    IndexingConfig, IndexingTask, NullEventSink, SqliteStore, TaskOrchestrator, UnlimitedGovernor,
};

pub fn function(name: &str, start_line: u32) -> ExtractedFunction {
    ExtractedFunction {
        name: name.to_string(),
        signature: format!("fn {}()", name),
        purpose: format!("does {}", name),
        start_line,
        end_line: start_line + 2,
        confidence: 0.9,
    }
}

pub fn call(source: &str, target: &str, line: Option<u32>) -> RawCallEdge {
    RawCallEdge {
        source_function: source.to_string(),
        target: RawCallTarget::Name(target.to_string()),
        line,
        ambiguous: false,
        overload_count: 1,
    }
}

pub fn extraction(
    functions: Vec<ExtractedFunction>,
    call_edges: Vec<RawCallEdge>,
) -> FileExtraction {
    let exports = functions.iter().map(|f| f.name.clone()).collect();
    FileExtraction {
        functions,
        module: Some(ExtractedModule {
            purpose: "test module".to_string(),
            exports,
            dependencies: vec![],
        }),
        call_edges,
        partially_indexed: false,
        parser_name: "tree_sitter".to_string(),
    }
}

/// What the stub adapter does for one file name.
#[derive(Clone)]
pub enum StubBehavior {
    Produce(FileExtraction),
    Fail(String),
    Sleep(Duration, FileExtraction),
}

/// Scriptable adapter keyed by file name (temp paths vary per run).
pub struct StubAdapter {
    by_name: Mutex<HashMap<String, StubBehavior>>,
    pub extract_calls: AtomicUsize,
}

impl StubAdapter {
    pub fn new() -> Self {
        Self {
            by_name: Mutex::new(HashMap::new()),
            extract_calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, file_name: &str, behavior: StubBehavior) {
        self.by_name
            .lock()
            .unwrap()
            .insert(file_name.to_string(), behavior);
    }

    pub fn calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }
}

fn file_name(path: &str) -> String {
    std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl ExtractionAdapter for StubAdapter {
    fn extract(&self, path: &str, _content: &str) -> Result<FileExtraction> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .by_name
            .lock()
            .unwrap()
            .get(&file_name(path))
            .cloned();
        match behavior {
            Some(StubBehavior::Produce(extraction)) => Ok(extraction),
            Some(StubBehavior::Fail(message)) => Err(anyhow!("{}", message)),
            Some(StubBehavior::Sleep(delay, extraction)) => {
                std::thread::sleep(delay);
                Ok(extraction)
            }
            None => Ok(FileExtraction {
                parser_name: "tree_sitter".to_string(),
                ..Default::default()
            }),
        }
    }
}

/// Embedder that returns a fixed small vector.
pub struct ConstEmbedder;

impl Embedder for ConstEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.1, 0.2, 0.3])
    }
}

/// Embedder that always fails with an ordinary (recoverable) error.
pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(anyhow!("embedding backend offline"))
    }
}

/// Governor that allows a fixed number of budget checks, then reports
/// exhaustion.
pub struct AllowN {
    remaining: AtomicUsize,
}

impl AllowN {
    pub fn new(allowed: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(allowed),
        }
    }
}

impl Governor for AllowN {
    fn check_budget(&self) -> Result<()> {
        loop {
            let remaining = self.remaining.load(Ordering::SeqCst);
            if remaining == 0 {
                return Err(anyhow!(
                    "{}: token budget exhausted",
                    cartograph::error::CG_GOV_001_BUDGET_EXHAUSTED
                ));
            }
            if self
                .remaining
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Ok(());
            }
        }
    }

    fn record_usage(&self, _tokens: u64) {}
}

/// Tempdir-backed fixture wiring a real store to the stub adapter.
pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<SqliteStore>,
    pub adapter: Arc<StubAdapter>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            store: Arc::new(SqliteStore::in_memory().unwrap()),
            adapter: Arc::new(StubAdapter::new()),
        }
    }

    /// Write a source file into the tempdir, returning its path string.
    pub fn write(&self, name: &str, content: &[u8]) -> String {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    pub fn path(&self, name: &str) -> String {
        self.dir.path().join(name).to_string_lossy().into_owned()
    }

    pub fn task(&self, names: &[&str]) -> IndexingTask {
        IndexingTask::new("test", names.iter().map(|n| self.path(n)).collect())
    }

    pub fn orchestrator(&self, config: IndexingConfig) -> TaskOrchestrator {
        self.orchestrator_with(config, Arc::new(NullEventSink), Arc::new(UnlimitedGovernor))
    }

    pub fn orchestrator_with(
        &self,
        config: IndexingConfig,
        events: Arc<dyn EventSink>,
        governor: Arc<dyn Governor>,
    ) -> TaskOrchestrator {
        TaskOrchestrator::new(
            Arc::clone(&self.store) as Arc<dyn cartograph::GraphStore>,
            Arc::clone(&self.adapter) as Arc<dyn ExtractionAdapter>,
            Arc::new(ConstEmbedder),
            events,
            governor,
            config,
        )
        .unwrap()
    }
}

//! Per-file pipeline behavior through the public surface: edge
//! replacement, identity reuse, dedupe and caps, gate skips, import
//! resolution, self-repair, and batched graph metrics.

mod common;

use std::sync::{Arc, Mutex};

use common::{call, extraction, function, Harness, StubBehavior};

use cartograph::change::compute_checksum;
use cartograph::extraction::{ExtractedModule, FileExtraction};
use cartograph::schema::{EdgeTarget, EdgeType, FunctionRecord};
use cartograph::storage::{FileCommit, FunctionCommit};
use cartograph::{GraphStore, IndexingConfig, SkipReason, TaskOptions};

#[test]
fn test_reindex_replaces_edges_instead_of_merging() {
    let h = Harness::new();
    h.write("a.ts", b"export function alpha() { old(); }");
    h.adapter.set(
        "a.ts",
        StubBehavior::Produce(extraction(
            vec![function("alpha", 1)],
            vec![call("alpha", "old_target", Some(2))],
        )),
    );
    let orchestrator = h.orchestrator(IndexingConfig::default());
    orchestrator
        .run(&h.task(&["a.ts"]), &TaskOptions::default())
        .unwrap();

    // The file changes: the old call disappears, a new one appears
    h.write("a.ts", b"export function alpha() { fresh(); }");
    h.adapter.set(
        "a.ts",
        StubBehavior::Produce(extraction(
            vec![function("alpha", 1)],
            vec![call("alpha", "new_target", Some(2))],
        )),
    );
    orchestrator
        .run(&h.task(&["a.ts"]), &TaskOptions::default())
        .unwrap();

    let calls: Vec<_> = h
        .store
        .edges_for_file(&h.path("a.ts"))
        .unwrap()
        .into_iter()
        .filter(|e| e.edge_type == EdgeType::Calls)
        .collect();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].to, EdgeTarget::External("new_target".to_string()));
}

#[test]
fn test_function_identity_survives_reindex() {
    let h = Harness::new();
    h.write("a.ts", b"export function alpha() {}");
    h.adapter.set(
        "a.ts",
        StubBehavior::Produce(extraction(vec![function("alpha", 1)], vec![])),
    );
    let orchestrator = h.orchestrator(IndexingConfig::default());
    orchestrator
        .run(&h.task(&["a.ts"]), &TaskOptions::default())
        .unwrap();

    let before = h
        .store
        .get_function(&h.path("a.ts"), "alpha")
        .unwrap()
        .unwrap();
    h.store.record_function_access(before.id.unwrap()).unwrap();
    h.store
        .record_function_outcome(before.id.unwrap(), false)
        .unwrap();

    // Same function, new body
    h.write("a.ts", b"export function alpha() { return 1; }");
    h.adapter.set(
        "a.ts",
        StubBehavior::Produce(extraction(vec![function("alpha", 5)], vec![])),
    );
    orchestrator
        .run(&h.task(&["a.ts"]), &TaskOptions::default())
        .unwrap();

    let after = h
        .store
        .get_function(&h.path("a.ts"), "alpha")
        .unwrap()
        .unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.start_line, 5);
    assert_eq!(after.access_count, 1);
    assert_eq!(after.failure_count, 1);
}

#[test]
fn test_duplicate_names_keep_last_declaration() {
    let h = Harness::new();
    h.write("a.ts", b"function alpha() {}\nfunction alpha() {}");
    h.adapter.set(
        "a.ts",
        StubBehavior::Produce(extraction(
            vec![function("alpha", 1), function("alpha", 20)],
            vec![],
        )),
    );

    let orchestrator = h.orchestrator(IndexingConfig::default());
    let result = orchestrator
        .run(&h.task(&["a.ts"]), &TaskOptions::default())
        .unwrap();

    assert_eq!(result.functions_indexed, 1);
    let alpha = h
        .store
        .get_function(&h.path("a.ts"), "alpha")
        .unwrap()
        .unwrap();
    assert_eq!(alpha.start_line, 20);
}

#[test]
fn test_function_count_is_capped_per_file() {
    let h = Harness::new();
    h.write("big.ts", b"// many functions");
    let functions = (0..10u32).map(|i| function(&format!("f{}", i), i + 1)).collect();
    h.adapter
        .set("big.ts", StubBehavior::Produce(extraction(functions, vec![])));

    let orchestrator = h.orchestrator(IndexingConfig {
        max_functions_per_file: 3,
        ..Default::default()
    });
    let result = orchestrator
        .run(&h.task(&["big.ts"]), &TaskOptions::default())
        .unwrap();

    assert_eq!(result.functions_indexed, 3);
    assert_eq!(h.store.list_functions(100).unwrap().len(), 3);
}

#[test]
fn test_gate_skips_for_size_extension_and_binary() {
    let h = Harness::new();
    h.write("huge.ts", &vec![b'x'; 2048]);
    h.write("notes.txt", b"not a source file");
    let mut binary = vec![0u8; 500];
    binary.extend_from_slice(&[b'a'; 500]);
    h.write("blob.ts", &binary);

    let skipped: Arc<Mutex<Vec<SkipReason>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&skipped);
    let options = TaskOptions {
        on_skip: Some(Arc::new(move |_path: &str, reason: &SkipReason| {
            sink.lock().unwrap().push(reason.clone());
        })),
        ..Default::default()
    };

    let orchestrator = h.orchestrator(IndexingConfig {
        max_file_size_bytes: 1024,
        ..Default::default()
    });
    let result = orchestrator
        .run(&h.task(&["huge.ts", "notes.txt", "blob.ts"]), &options)
        .unwrap();

    assert_eq!(result.files_processed, 0);
    assert_eq!(result.files_skipped, 3);
    assert_eq!(h.adapter.calls(), 0);

    let skipped = skipped.lock().unwrap();
    assert!(matches!(skipped[0], SkipReason::TooLarge { size: 2048, limit: 1024 }));
    assert_eq!(skipped[1], SkipReason::Excluded);
    assert_eq!(skipped[2], SkipReason::Binary);
}

#[test]
fn test_relative_imports_resolve_against_committed_modules() {
    let h = Harness::new();
    h.write("util.ts", b"export function helper() {}");
    h.write("a.ts", b"import { helper } from './util';");
    h.adapter.set(
        "util.ts",
        StubBehavior::Produce(extraction(vec![function("helper", 1)], vec![])),
    );
    h.adapter.set(
        "a.ts",
        StubBehavior::Produce(FileExtraction {
            functions: vec![],
            module: Some(ExtractedModule {
                purpose: "entry".to_string(),
                exports: vec![],
                dependencies: vec!["./util".to_string(), "react".to_string()],
            }),
            call_edges: vec![],
            partially_indexed: false,
            parser_name: "tree_sitter".to_string(),
        }),
    );

    // util.ts commits first, so its module is in the task cache
    let orchestrator = h.orchestrator(IndexingConfig::default());
    orchestrator
        .run(&h.task(&["util.ts", "a.ts"]), &TaskOptions::default())
        .unwrap();

    let util_module = h
        .store
        .list_modules()
        .unwrap()
        .into_iter()
        .find(|m| m.path.ends_with("util.ts"))
        .unwrap();
    let imports: Vec<_> = h
        .store
        .edges_for_file(&h.path("a.ts"))
        .unwrap()
        .into_iter()
        .filter(|e| e.edge_type == EdgeType::Imports)
        .collect();
    assert_eq!(imports.len(), 2);
    assert_eq!(imports[0].to, EdgeTarget::Module(util_module.id.unwrap()));
    assert!((imports[0].confidence - 0.90).abs() < 1e-9);
    assert_eq!(imports[1].to, EdgeTarget::External("react".to_string()));
}

#[test]
fn test_incomplete_artifacts_trigger_reindex_despite_checksum_match() {
    let h = Harness::new();
    let content = b"export function alpha() {}".to_vec();
    h.write("a.ts", &content);
    h.adapter.set(
        "a.ts",
        StubBehavior::Produce(extraction(vec![function("alpha", 1)], vec![])),
    );

    // Seed the store with a matching checksum but no embedding for
    // the committed function (a partially landed older run).
    let mut record = FunctionRecord::new(&h.path("a.ts"), "alpha");
    record.signature = "fn alpha()".to_string();
    h.store
        .commit_file(&FileCommit {
            path: h.path("a.ts"),
            checksum: compute_checksum(&content),
            partial: false,
            functions: vec![FunctionCommit {
                record,
                embedding: None,
            }],
            module: None,
            edges: vec![],
            context_packs: vec![],
        })
        .unwrap();

    let orchestrator = h.orchestrator(IndexingConfig::default());
    let result = orchestrator
        .run(&h.task(&["a.ts"]), &TaskOptions::default())
        .unwrap();

    // Checksum matched, but missing artifacts force the re-index
    assert_eq!(result.files_processed, 1);
    assert_eq!(h.adapter.calls(), 1);
    let alpha = h
        .store
        .get_function(&h.path("a.ts"), "alpha")
        .unwrap()
        .unwrap();
    assert!(h
        .store
        .function_embedding(alpha.id.unwrap())
        .unwrap()
        .is_some());

    // Now complete: the next run skips
    let result = orchestrator
        .run(&h.task(&["a.ts"]), &TaskOptions::default())
        .unwrap();
    assert_eq!(result.files_skipped, 1);
    assert_eq!(h.adapter.calls(), 1);
}

#[test]
fn test_partial_extraction_is_reindexed_despite_unchanged_checksum() {
    let h = Harness::new();
    h.write("a.ts", b"export function alpha() {}\nexport function beta() {}");
    // The adapter stops early: only one of two functions, flagged partial
    let mut truncated = extraction(vec![function("alpha", 1)], vec![]);
    truncated.partially_indexed = true;
    h.adapter.set("a.ts", StubBehavior::Produce(truncated));

    let orchestrator = h.orchestrator(IndexingConfig::default());
    let result = orchestrator
        .run(&h.task(&["a.ts"]), &TaskOptions::default())
        .unwrap();
    assert_eq!(result.files_processed, 1);
    assert_eq!(h.adapter.calls(), 1);

    // Same content, but the truncated artifact set must be repaired
    h.adapter.set(
        "a.ts",
        StubBehavior::Produce(extraction(
            vec![function("alpha", 1), function("beta", 2)],
            vec![],
        )),
    );
    let result = orchestrator
        .run(&h.task(&["a.ts"]), &TaskOptions::default())
        .unwrap();
    assert_eq!(result.files_processed, 1);
    assert_eq!(result.functions_indexed, 2);
    assert_eq!(h.adapter.calls(), 2);
    assert!(h
        .store
        .get_function(&h.path("a.ts"), "beta")
        .unwrap()
        .is_some());

    // Now fully indexed: the next pass skips without extraction
    let result = orchestrator
        .run(&h.task(&["a.ts"]), &TaskOptions::default())
        .unwrap();
    assert_eq!(result.files_skipped, 1);
    assert_eq!(h.adapter.calls(), 2);
}

#[test]
fn test_graph_metrics_are_batched_per_task() {
    let h = Harness::new();
    h.write("a.ts", b"export function alpha() { beta(); gamma(); }");
    h.adapter.set(
        "a.ts",
        StubBehavior::Produce(extraction(
            vec![function("alpha", 1)],
            vec![
                call("alpha", "beta", Some(2)),
                call("alpha", "gamma", Some(3)),
            ],
        )),
    );

    let orchestrator = h.orchestrator(IndexingConfig::default());
    orchestrator
        .run(&h.task(&["a.ts"]), &TaskOptions::default())
        .unwrap();

    let alpha = h
        .store
        .get_function(&h.path("a.ts"), "alpha")
        .unwrap()
        .unwrap();
    let metrics = h
        .store
        .get_graph_metrics(alpha.id.unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(metrics.fan_out, 2);
    assert_eq!(metrics.fan_in, 0);
    assert_eq!(metrics.centrality, 1.0);
}

#[test]
fn test_embedding_failure_withholds_function_but_continues() {
    let h = Harness::new();
    h.write("a.ts", b"export function alpha() {}");
    h.adapter.set(
        "a.ts",
        StubBehavior::Produce(extraction(vec![function("alpha", 1)], vec![])),
    );

    let orchestrator = cartograph::TaskOrchestrator::new(
        Arc::clone(&h.store) as Arc<dyn GraphStore>,
        Arc::clone(&h.adapter) as Arc<dyn cartograph::ExtractionAdapter>,
        Arc::new(common::FailingEmbedder),
        Arc::new(cartograph::NullEventSink),
        Arc::new(cartograph::UnlimitedGovernor),
        IndexingConfig::default(),
    )
    .unwrap();

    let result = orchestrator
        .run(&h.task(&["a.ts"]), &TaskOptions::default())
        .unwrap();

    // The file still commits (module, context pack) but the function
    // is withheld and the failure recorded
    assert_eq!(result.files_processed, 1);
    assert_eq!(result.functions_indexed, 0);
    assert!(!result.errors.is_empty());
    assert!(result.errors.iter().all(|e| e.recoverable));
    assert!(h
        .store
        .get_function(&h.path("a.ts"), "alpha")
        .unwrap()
        .is_none());
}

//! Graph edge building
//!
//! Turns raw extracted relationships into scored, persistable edge
//! drafts. Call edges whose source function was not committed this pass
//! are dropped (no dangling-source edges); call targets that cannot be
//! resolved yet become explicit external placeholders keyed by name.
//! Import edges resolve only relative/path-like specifiers against the
//! task-scoped module-path cache; bare package names are always external.

use ahash::AHashMap;
use std::collections::BTreeSet;

use crate::confidence::{self, EdgeEvidence};
use crate::extraction::{ExtractedModule, RawCallEdge, RawCallTarget};
use crate::schema::{EdgeTarget, EdgeType};
use crate::storage::{DraftSource, EdgeDraft};

/// Task-scoped module path -> module id cache.
///
/// Created at task start from the stored module set, extended as the
/// task's own files commit, and discarded at task end. Keys are
/// normalized relative paths with forward slashes.
#[derive(Debug, Default)]
pub struct ModulePathCache {
    map: AHashMap<String, i64>,
}

impl ModulePathCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the cache from stored modules.
    pub fn from_modules(modules: &[crate::schema::ModuleRecord]) -> Self {
        let mut cache = Self::new();
        for module in modules {
            if let Some(id) = module.id {
                cache.insert(&module.path, id);
            }
        }
        cache
    }

    pub fn insert(&mut self, path: &str, id: i64) {
        self.map.insert(normalize_path(path), id);
    }

    pub fn get(&self, path: &str) -> Option<i64> {
        self.map.get(&normalize_path(path)).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Resolve an import specifier from `source_file`.
    ///
    /// Only relative/path-like specifiers (`./`, `../`, `/`) are
    /// resolved; anything else is an external package import. Attempts,
    /// in order, first match wins:
    /// 1. the normalized path as-is
    /// 2. the path with each configured extension appended
    /// 3. the path with an implicit `index.<ext>` suffix
    pub fn resolve_import(
        &self,
        source_file: &str,
        specifier: &str,
        extensions: &[String],
    ) -> Option<i64> {
        if !is_path_like(specifier) {
            return None;
        }

        let base = if specifier.starts_with('/') {
            normalize_path(specifier)
        } else {
            let dir = parent_dir(source_file);
            normalize_path(&format!("{}/{}", dir, specifier))
        };

        if let Some(id) = self.get(&base) {
            return Some(id);
        }
        for ext in extensions {
            if let Some(id) = self.get(&format!("{}.{}", base, ext)) {
                return Some(id);
            }
        }
        for ext in extensions {
            if let Some(id) = self.get(&format!("{}/index.{}", base, ext)) {
                return Some(id);
            }
        }
        None
    }
}

fn is_path_like(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
}

fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Collapse `.` and `..` segments and strip any leading slash, purely as
/// string manipulation (cache keys are storage paths, not filesystem
/// paths).
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Builds scored edge drafts for one file's commit.
pub struct GraphEdgeBuilder {
    extensions: Vec<String>,
}

impl GraphEdgeBuilder {
    pub fn new(extensions: &[String]) -> Self {
        Self {
            extensions: extensions.to_vec(),
        }
    }

    /// Build call edge drafts from raw adapter edges.
    ///
    /// `committed` is the set of function names actually headed for this
    /// commit; edges from any other source are dropped.
    pub fn build_call_edges(
        &self,
        raw_edges: &[RawCallEdge],
        committed: &BTreeSet<String>,
        parser_name: &str,
    ) -> Vec<EdgeDraft> {
        let mut drafts = Vec::new();
        for raw in raw_edges {
            if !committed.contains(&raw.source_function) {
                continue;
            }

            let (source, ambiguous) =
                confidence::classify_call_source(parser_name, raw.overload_count, raw.ambiguous);
            let (to, resolved) = match &raw.target {
                RawCallTarget::Function(id) => (EdgeTarget::Function(*id), true),
                RawCallTarget::Name(name) => (EdgeTarget::External(name.clone()), false),
            };
            let score = confidence::score(&EdgeEvidence {
                source,
                has_line: raw.line.is_some(),
                resolved,
                ambiguous,
            });

            drafts.push(EdgeDraft {
                from: DraftSource::Function(raw.source_function.clone()),
                to,
                edge_type: EdgeType::Calls,
                source,
                ambiguous,
                source_line: raw.line,
                confidence: score,
            });
        }
        drafts
    }

    /// Build import edge drafts from the module's dependency list.
    ///
    /// Import edges are never ambiguous and never carry a source line;
    /// unresolvable specifiers stay external by name.
    pub fn build_import_edges(
        &self,
        module: &ExtractedModule,
        source_file: &str,
        cache: &ModulePathCache,
        parser_name: &str,
    ) -> Vec<EdgeDraft> {
        let source = confidence::classify_import_source(parser_name);
        let mut drafts = Vec::new();
        for specifier in &module.dependencies {
            let (to, resolved) =
                match cache.resolve_import(source_file, specifier, &self.extensions) {
                    Some(id) => (EdgeTarget::Module(id), true),
                    None => (EdgeTarget::External(specifier.clone()), false),
                };
            let score = confidence::score(&EdgeEvidence {
                source,
                has_line: false,
                resolved,
                ambiguous: false,
            });

            drafts.push(EdgeDraft {
                from: DraftSource::Module,
                to,
                edge_type: EdgeType::Imports,
                source,
                ambiguous: false,
                source_line: None,
                confidence: score,
            });
        }
        drafts
    }
}

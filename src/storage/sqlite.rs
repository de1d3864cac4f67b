//! SQLite-backed reference store
//!
//! Single rusqlite connection behind a mutex; one transaction per file
//! commit. Deletions inside a commit run before inserts so no edge from
//! file-version N survives alongside version N+1's edges.

use anyhow::{anyhow, bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::confidence::EdgeSource;
use crate::graph::FunctionMetrics;
use crate::schema::{
    EdgeNode, EdgeTarget, EdgeType, FileError, FunctionRecord, GraphEdge, IndexingResult,
    ModuleRecord, TaskRunRecord,
};
use crate::storage::{
    ArtifactCounts, CommitReceipt, DraftSource, FileCommit, GraphStore,
};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS files (
    path TEXT PRIMARY KEY,
    checksum TEXT NOT NULL,
    partial INTEGER NOT NULL DEFAULT 0,
    function_count INTEGER NOT NULL DEFAULT 0,
    module_count INTEGER NOT NULL DEFAULT 0,
    pack_count INTEGER NOT NULL DEFAULT 0,
    last_indexed_at INTEGER NOT NULL,
    last_accessed_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS functions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL,
    name TEXT NOT NULL,
    signature TEXT NOT NULL DEFAULT '',
    purpose TEXT NOT NULL DEFAULT '',
    start_line INTEGER NOT NULL DEFAULT 0,
    end_line INTEGER NOT NULL DEFAULT 0,
    confidence REAL NOT NULL DEFAULT 0,
    access_count INTEGER NOT NULL DEFAULT 0,
    success_count INTEGER NOT NULL DEFAULT 0,
    failure_count INTEGER NOT NULL DEFAULT 0,
    UNIQUE(file_path, name)
);
CREATE INDEX IF NOT EXISTS idx_functions_name ON functions(name);
CREATE TABLE IF NOT EXISTS function_embeddings (
    function_id INTEGER PRIMARY KEY,
    vector BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS modules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    purpose TEXT NOT NULL DEFAULT '',
    exports TEXT NOT NULL DEFAULT '[]',
    dependencies TEXT NOT NULL DEFAULT '[]'
);
CREATE TABLE IF NOT EXISTS module_embeddings (
    module_id INTEGER PRIMARY KEY,
    vector BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS module_vectors (
    module_id INTEGER NOT NULL,
    slot INTEGER NOT NULL,
    vector BLOB NOT NULL,
    PRIMARY KEY (module_id, slot)
);
CREATE TABLE IF NOT EXISTS edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_kind TEXT NOT NULL,
    from_id INTEGER NOT NULL,
    to_kind TEXT NOT NULL,
    to_id INTEGER,
    to_name TEXT,
    edge_type TEXT NOT NULL,
    source TEXT NOT NULL,
    ambiguous INTEGER NOT NULL DEFAULT 0,
    source_file TEXT NOT NULL,
    source_line INTEGER,
    confidence REAL NOT NULL,
    computed_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_edges_source_file ON edges(source_file);
CREATE INDEX IF NOT EXISTS idx_edges_type ON edges(edge_type);
CREATE TABLE IF NOT EXISTS context_packs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL,
    kind TEXT NOT NULL,
    content TEXT NOT NULL,
    UNIQUE(file_path, kind)
);
CREATE TABLE IF NOT EXISTS graph_metrics (
    function_id INTEGER PRIMARY KEY,
    fan_in INTEGER NOT NULL,
    fan_out INTEGER NOT NULL,
    centrality REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS task_runs (
    task_id TEXT PRIMARY KEY,
    task_type TEXT NOT NULL,
    started_at INTEGER NOT NULL,
    finished_at INTEGER NOT NULL,
    files_processed INTEGER NOT NULL,
    files_skipped INTEGER NOT NULL,
    functions_indexed INTEGER NOT NULL,
    modules_indexed INTEGER NOT NULL,
    context_packs INTEGER NOT NULL,
    outcome TEXT NOT NULL,
    errors TEXT NOT NULL DEFAULT '[]',
    version TEXT NOT NULL
);
";

/// SQLite implementation of [`GraphStore`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("failed to open {}", db_path.as_ref().display()))?;
        Self::from_connection(conn)
    }

    /// In-memory store, for tests and ephemeral runs.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL)
            .context("failed to initialize store schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("store connection mutex poisoned"))
    }
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

fn vec_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn function_from_row(row: &Row<'_>) -> rusqlite::Result<FunctionRecord> {
    Ok(FunctionRecord {
        id: Some(row.get(0)?),
        file_path: row.get(1)?,
        name: row.get(2)?,
        signature: row.get(3)?,
        purpose: row.get(4)?,
        start_line: row.get::<_, i64>(5)? as u32,
        end_line: row.get::<_, i64>(6)? as u32,
        confidence: row.get(7)?,
        access_count: row.get(8)?,
        success_count: row.get(9)?,
        failure_count: row.get(10)?,
    })
}

const FUNCTION_COLUMNS: &str = "id, file_path, name, signature, purpose, start_line, end_line, \
                                confidence, access_count, success_count, failure_count";

fn edge_from_row(row: &Row<'_>) -> Result<GraphEdge> {
    let from_kind: String = row.get(1)?;
    let from_id: i64 = row.get(2)?;
    let from = match from_kind.as_str() {
        "function" => EdgeNode::Function(from_id),
        "module" => EdgeNode::Module(from_id),
        other => bail!("unknown edge source kind: {}", other),
    };

    let to_kind: String = row.get(3)?;
    let to = match to_kind.as_str() {
        "function" => EdgeTarget::Function(
            row.get::<_, Option<i64>>(4)?
                .ok_or_else(|| anyhow!("function edge target missing id"))?,
        ),
        "module" => EdgeTarget::Module(
            row.get::<_, Option<i64>>(4)?
                .ok_or_else(|| anyhow!("module edge target missing id"))?,
        ),
        "external" => EdgeTarget::External(
            row.get::<_, Option<String>>(5)?
                .ok_or_else(|| anyhow!("external edge target missing name"))?,
        ),
        other => bail!("unknown edge target kind: {}", other),
    };

    let edge_type: String = row.get(6)?;
    let source: String = row.get(7)?;

    Ok(GraphEdge {
        id: Some(row.get(0)?),
        from,
        to,
        edge_type: EdgeType::parse(&edge_type)
            .ok_or_else(|| anyhow!("unknown edge type: {}", edge_type))?,
        source: EdgeSource::parse(&source)
            .ok_or_else(|| anyhow!("unknown edge source: {}", source))?,
        ambiguous: row.get::<_, i64>(8)? != 0,
        source_file: row.get(9)?,
        source_line: row.get::<_, Option<i64>>(10)?.map(|l| l as u32),
        confidence: row.get(11)?,
        computed_at: row.get(12)?,
    })
}

const EDGE_COLUMNS: &str = "id, from_kind, from_id, to_kind, to_id, to_name, edge_type, source, \
                            ambiguous, source_file, source_line, confidence, computed_at";

fn edge_target_columns(to: &EdgeTarget) -> (&'static str, Option<i64>, Option<&str>) {
    match to {
        EdgeTarget::Function(id) => ("function", Some(*id), None),
        EdgeTarget::Module(id) => ("module", Some(*id), None),
        EdgeTarget::External(name) => ("external", None, Some(name.as_str())),
    }
}

impl GraphStore for SqliteStore {
    fn get_checksum(&self, path: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let checksum = conn
            .query_row(
                "SELECT checksum FROM files WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()?;
        Ok(checksum)
    }

    fn artifact_counts(&self, path: &str) -> Result<Option<ArtifactCounts>> {
        let conn = self.conn()?;
        let recorded = conn
            .query_row(
                "SELECT function_count, module_count, pack_count, partial
                 FROM files WHERE path = ?1",
                params![path],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;
        let (recorded_functions, recorded_modules, recorded_packs, partial) = match recorded {
            Some(counts) => counts,
            None => return Ok(None),
        };

        let functions: i64 = conn.query_row(
            "SELECT COUNT(*) FROM functions WHERE file_path = ?1",
            params![path],
            |row| row.get(0),
        )?;
        let modules: i64 = conn.query_row(
            "SELECT COUNT(*) FROM modules WHERE path = ?1",
            params![path],
            |row| row.get(0),
        )?;
        let embeddings: i64 = conn.query_row(
            "SELECT COUNT(*) FROM function_embeddings e
             JOIN functions f ON f.id = e.function_id
             WHERE f.file_path = ?1",
            params![path],
            |row| row.get(0),
        )?;
        let context_packs: i64 = conn.query_row(
            "SELECT COUNT(*) FROM context_packs WHERE file_path = ?1",
            params![path],
            |row| row.get(0),
        )?;

        Ok(Some(ArtifactCounts {
            recorded_functions,
            recorded_modules,
            recorded_packs,
            partial: partial != 0,
            functions,
            modules,
            embeddings,
            context_packs,
        }))
    }

    fn get_function(&self, path: &str, name: &str) -> Result<Option<FunctionRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM functions WHERE file_path = ?1 AND name = ?2",
            FUNCTION_COLUMNS
        );
        let record = conn
            .query_row(&sql, params![path, name], function_from_row)
            .optional()?;
        Ok(record)
    }

    fn list_modules(&self) -> Result<Vec<ModuleRecord>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, path, purpose, exports, dependencies FROM modules ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut modules = Vec::new();
        for row in rows {
            let (id, path, purpose, exports, dependencies) = row?;
            modules.push(ModuleRecord {
                id: Some(id),
                path,
                purpose,
                exports: serde_json::from_str(&exports)
                    .context("corrupt exports column in modules table")?,
                dependencies: serde_json::from_str(&dependencies)
                    .context("corrupt dependencies column in modules table")?,
            });
        }
        Ok(modules)
    }

    fn list_functions(&self, limit: usize) -> Result<Vec<FunctionRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM functions ORDER BY id LIMIT ?1",
            FUNCTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], function_from_row)?;
        let mut functions = Vec::new();
        for row in rows {
            functions.push(row?);
        }
        Ok(functions)
    }

    fn list_edges(&self, edge_type: EdgeType) -> Result<Vec<GraphEdge>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM edges WHERE edge_type = ?1 ORDER BY id",
            EDGE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![edge_type.as_str()])?;
        let mut edges = Vec::new();
        while let Some(row) = rows.next()? {
            edges.push(edge_from_row(row)?);
        }
        Ok(edges)
    }

    fn edges_for_file(&self, path: &str) -> Result<Vec<GraphEdge>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM edges WHERE source_file = ?1 ORDER BY id",
            EDGE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![path])?;
        let mut edges = Vec::new();
        while let Some(row) = rows.next()? {
            edges.push(edge_from_row(row)?);
        }
        Ok(edges)
    }

    fn function_embedding(&self, function_id: i64) -> Result<Option<Vec<f32>>> {
        let conn = self.conn()?;
        let blob: Option<Vec<u8>> = conn
            .query_row(
                "SELECT vector FROM function_embeddings WHERE function_id = ?1",
                params![function_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(blob.map(|b| blob_to_vec(&b)))
    }

    fn get_graph_metrics(&self, function_id: i64) -> Result<Option<FunctionMetrics>> {
        let conn = self.conn()?;
        let metrics = conn
            .query_row(
                "SELECT function_id, fan_in, fan_out, centrality
                 FROM graph_metrics WHERE function_id = ?1",
                params![function_id],
                |row| {
                    Ok(FunctionMetrics {
                        function_id: row.get(0)?,
                        fan_in: row.get(1)?,
                        fan_out: row.get(2)?,
                        centrality: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(metrics)
    }

    fn get_task_run(&self, task_id: &str) -> Result<Option<TaskRunRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                "SELECT task_id, task_type, started_at, finished_at, files_processed,
                        files_skipped, functions_indexed, modules_indexed, context_packs,
                        outcome, errors, version
                 FROM task_runs WHERE task_id = ?1",
                params![task_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, i64>(7)?,
                        row.get::<_, i64>(8)?,
                        row.get::<_, String>(9)?,
                        row.get::<_, String>(10)?,
                        row.get::<_, String>(11)?,
                    ))
                },
            )
            .optional()?;

        let row = match record {
            Some(row) => row,
            None => return Ok(None),
        };
        let errors: Vec<FileError> =
            serde_json::from_str(&row.10).context("corrupt errors column in task_runs table")?;
        Ok(Some(TaskRunRecord {
            task_id: row.0,
            task_type: row.1,
            started_at: row.2,
            finished_at: row.3,
            files_processed: row.4 as usize,
            files_skipped: row.5 as usize,
            functions_indexed: row.6 as usize,
            modules_indexed: row.7 as usize,
            context_packs_created: row.8 as usize,
            outcome: row.9,
            errors,
            version: row.11,
        }))
    }

    fn commit_file(&self, commit: &FileCommit) -> Result<CommitReceipt> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = now_secs();
        let mut receipt = CommitReceipt::default();

        // Upsert functions, preserving access/outcome counters on update.
        for function in &commit.functions {
            let record = &function.record;
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM functions WHERE file_path = ?1 AND name = ?2",
                    params![record.file_path, record.name],
                    |row| row.get(0),
                )
                .optional()?;

            let function_id = match existing {
                Some(id) => {
                    tx.execute(
                        "UPDATE functions
                         SET signature = ?1, purpose = ?2, start_line = ?3, end_line = ?4,
                             confidence = ?5
                         WHERE id = ?6",
                        params![
                            record.signature,
                            record.purpose,
                            record.start_line as i64,
                            record.end_line as i64,
                            record.confidence,
                            id
                        ],
                    )?;
                    id
                }
                None => {
                    tx.execute(
                        "INSERT INTO functions
                           (file_path, name, signature, purpose, start_line, end_line, confidence)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            record.file_path,
                            record.name,
                            record.signature,
                            record.purpose,
                            record.start_line as i64,
                            record.end_line as i64,
                            record.confidence
                        ],
                    )?;
                    let id = tx.last_insert_rowid();
                    receipt.created_functions.push(id);
                    id
                }
            };

            if let Some(embedding) = &function.embedding {
                tx.execute(
                    "INSERT OR REPLACE INTO function_embeddings (function_id, vector)
                     VALUES (?1, ?2)",
                    params![function_id, vec_to_blob(embedding)],
                )?;
            }
            receipt.function_ids.insert(record.name.clone(), function_id);
        }

        // Upsert the module and its vector artifacts.
        if let Some(module) = &commit.module {
            let record = &module.record;
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM modules WHERE path = ?1",
                    params![record.path],
                    |row| row.get(0),
                )
                .optional()?;
            let exports = serde_json::to_string(&record.exports)?;
            let dependencies = serde_json::to_string(&record.dependencies)?;

            let module_id = match existing {
                Some(id) => {
                    tx.execute(
                        "UPDATE modules SET purpose = ?1, exports = ?2, dependencies = ?3
                         WHERE id = ?4",
                        params![record.purpose, exports, dependencies, id],
                    )?;
                    id
                }
                None => {
                    tx.execute(
                        "INSERT INTO modules (path, purpose, exports, dependencies)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![record.path, record.purpose, exports, dependencies],
                    )?;
                    receipt.module_created = true;
                    tx.last_insert_rowid()
                }
            };

            if let Some(embedding) = &module.embedding {
                tx.execute(
                    "INSERT OR REPLACE INTO module_embeddings (module_id, vector)
                     VALUES (?1, ?2)",
                    params![module_id, vec_to_blob(embedding)],
                )?;
            }
            tx.execute(
                "DELETE FROM module_vectors WHERE module_id = ?1",
                params![module_id],
            )?;
            for (slot, vector) in module.vectors.iter().enumerate() {
                tx.execute(
                    "INSERT INTO module_vectors (module_id, slot, vector) VALUES (?1, ?2, ?3)",
                    params![module_id, slot as i64, vec_to_blob(vector)],
                )?;
            }
            receipt.module_id = Some(module_id);
        }

        // Replace, never merge: every existing edge for this source file
        // goes before the fresh set is inserted.
        receipt.edges_deleted = tx.execute(
            "DELETE FROM edges WHERE source_file = ?1",
            params![commit.path],
        )?;
        for draft in &commit.edges {
            let (from_kind, from_id) = match &draft.from {
                DraftSource::Function(name) => {
                    let id = receipt.function_ids.get(name).ok_or_else(|| {
                        anyhow!("edge references uncommitted function: {}", name)
                    })?;
                    ("function", *id)
                }
                DraftSource::Module => {
                    let id = receipt
                        .module_id
                        .ok_or_else(|| anyhow!("import edge without a committed module"))?;
                    ("module", id)
                }
            };
            let (to_kind, to_id, to_name) = edge_target_columns(&draft.to);
            tx.execute(
                "INSERT INTO edges
                   (from_kind, from_id, to_kind, to_id, to_name, edge_type, source,
                    ambiguous, source_file, source_line, confidence, computed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    from_kind,
                    from_id,
                    to_kind,
                    to_id,
                    to_name,
                    draft.edge_type.as_str(),
                    draft.source.as_str(),
                    draft.ambiguous as i64,
                    commit.path,
                    draft.source_line.map(|l| l as i64),
                    draft.confidence,
                    now
                ],
            )?;
            receipt.edges_inserted += 1;
        }

        for pack in &commit.context_packs {
            tx.execute(
                "INSERT INTO context_packs (file_path, kind, content) VALUES (?1, ?2, ?3)
                 ON CONFLICT(file_path, kind) DO UPDATE SET content = excluded.content",
                params![pack.file_path, pack.kind, pack.content],
            )?;
            receipt.context_packs += 1;
        }

        // Checksum advances last; a stored match always implies the
        // artifacts above landed.
        tx.execute(
            "INSERT INTO files
               (path, checksum, partial, function_count, module_count, pack_count,
                last_indexed_at, last_accessed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(path) DO UPDATE SET
               checksum = excluded.checksum,
               partial = excluded.partial,
               function_count = excluded.function_count,
               module_count = excluded.module_count,
               pack_count = excluded.pack_count,
               last_indexed_at = excluded.last_indexed_at,
               last_accessed_at = excluded.last_accessed_at",
            params![
                commit.path,
                commit.checksum,
                commit.partial as i64,
                commit.functions.len() as i64,
                commit.module.is_some() as i64,
                commit.context_packs.len() as i64,
                now
            ],
        )?;

        tx.commit()?;
        Ok(receipt)
    }

    fn touch_file(&self, path: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE files SET last_accessed_at = ?1 WHERE path = ?2",
            params![now_secs(), path],
        )?;
        Ok(())
    }

    fn update_edge(&self, edge: &GraphEdge) -> Result<()> {
        let id = edge.id.ok_or_else(|| anyhow!("cannot update edge without id"))?;
        let (to_kind, to_id, to_name) = edge_target_columns(&edge.to);
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE edges
             SET to_kind = ?1, to_id = ?2, to_name = ?3, ambiguous = ?4,
                 confidence = ?5, computed_at = ?6
             WHERE id = ?7",
            params![
                to_kind,
                to_id,
                to_name,
                edge.ambiguous as i64,
                edge.confidence,
                edge.computed_at,
                id
            ],
        )?;
        if updated == 0 {
            bail!("edge {} does not exist", id);
        }
        Ok(())
    }

    fn record_function_access(&self, function_id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE functions SET access_count = access_count + 1 WHERE id = ?1",
            params![function_id],
        )?;
        Ok(())
    }

    fn record_function_outcome(&self, function_id: i64, success: bool) -> Result<()> {
        let conn = self.conn()?;
        let column = if success {
            "success_count"
        } else {
            "failure_count"
        };
        conn.execute(
            &format!(
                "UPDATE functions SET {column} = {column} + 1 WHERE id = ?1",
                column = column
            ),
            params![function_id],
        )?;
        Ok(())
    }

    fn store_graph_metrics(&self, metrics: &[FunctionMetrics]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for m in metrics {
            tx.execute(
                "INSERT OR REPLACE INTO graph_metrics (function_id, fan_in, fan_out, centrality)
                 VALUES (?1, ?2, ?3, ?4)",
                params![m.function_id, m.fan_in, m.fan_out, m.centrality],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn record_task_run(&self, result: &IndexingResult, outcome: &str) -> Result<()> {
        let errors = serde_json::to_string(&result.errors)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO task_runs
               (task_id, task_type, started_at, finished_at, files_processed, files_skipped,
                functions_indexed, modules_indexed, context_packs, outcome, errors, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                result.task_id,
                result.task_type,
                result.started_at,
                result.completed_at,
                result.files_processed as i64,
                result.files_skipped as i64,
                result.functions_indexed as i64,
                result.modules_indexed as i64,
                result.context_packs_created as i64,
                outcome,
                errors,
                result.version
            ],
        )?;
        Ok(())
    }
}

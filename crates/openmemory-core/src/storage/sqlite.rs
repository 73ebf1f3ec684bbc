//! SQLite store implementation
//!
//! Separate reader/writer connections behind mutexes give interior
//! mutability; every method takes `&self`, so the HTTP layer can share an
//! `Arc<MemoryStore>` without an outer lock.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};

use crate::embed::{vector_from_bytes, vector_to_bytes};
use crate::error::{CoreError, Result};
use crate::memory::{now_ms, Memory, MemoryPatch, Sector, Waypoint};

// ============================================================================
// REPORT ROWS
// ============================================================================

/// One analyzer run, as persisted in that analyzer's report table
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub project_name: String,
    pub user_id: String,
    pub timestamp: i64,
    pub headline_count: i64,
    pub report: serde_json::Value,
}

// ============================================================================
// STORE
// ============================================================================

/// The sole shared mutable resource of the engine
pub struct MemoryStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    /// Report tables known to exist; checked before every report append
    report_tables: Mutex<HashSet<String>>,
}

impl MemoryStore {
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Open (or create) the store
    pub fn open(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => {
                let proj_dirs = ProjectDirs::from("io", "openmemory", "engine").ok_or_else(|| {
                    CoreError::Init("could not determine project directories".to_string())
                })?;
                let data_dir = proj_dirs.data_dir();
                std::fs::create_dir_all(data_dir)?;
                data_dir.join("openmemory.db")
            }
        };

        let writer_conn = Connection::open(&path)?;
        Self::configure_connection(&writer_conn)?;
        super::schema::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            report_tables: Mutex::new(HashSet::new()),
        })
    }

    /// In-memory store for tests; reader and writer share one connection
    /// path via a named shared-cache database
    pub fn open_in_memory() -> Result<Self> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let uri = format!("file:openmemory_{id}?mode=memory&cache=shared");
        let writer_conn = Connection::open(&uri)?;
        super::schema::apply_migrations(&writer_conn)?;
        let reader_conn = Connection::open(&uri)?;
        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            report_tables: Mutex::new(HashSet::new()),
        })
    }

    fn writer(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| CoreError::Init("writer lock poisoned".to_string()))
    }

    fn reader(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| CoreError::Init("reader lock poisoned".to_string()))
    }

    // ========================================================================
    // MEMORIES
    // ========================================================================

    /// Insert a fully-formed memory row
    pub fn insert_memory(&self, memory: &Memory) -> Result<()> {
        let tags_json =
            serde_json::to_string(&memory.tags).unwrap_or_else(|_| "[]".to_string());
        let meta_json =
            serde_json::to_string(&memory.meta).unwrap_or_else(|_| "{}".to_string());

        let writer = self.writer()?;
        writer
            .execute(
                "INSERT INTO memories (
                    id, content, embedding, tags, meta, user_id, primary_sector,
                    salience, coactivations, created_at, updated_at, last_seen_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    memory.id,
                    memory.content,
                    vector_to_bytes(&memory.embedding),
                    tags_json,
                    meta_json,
                    memory.user_id,
                    memory.primary_sector.as_str(),
                    memory.salience,
                    memory.coactivations,
                    memory.created_at,
                    memory.updated_at,
                    memory.last_seen_at,
                ],
            )
            .map_err(|e| CoreError::StoreWriteFailed(e.to_string()))?;
        Ok(())
    }

    /// Fetch one memory by id
    pub fn get_memory(&self, id: &str) -> Result<Option<Memory>> {
        let reader = self.reader()?;
        let row = reader
            .query_row(
                &format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?1"),
                params![id],
                row_to_memory,
            )
            .optional()?;
        Ok(row)
    }

    /// All memories for a user, newest first
    pub fn memories_for_user(&self, user_id: &str) -> Result<Vec<Memory>> {
        self.select_memories(
            &format!(
                "SELECT {MEMORY_COLUMNS} FROM memories
                 WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC"
            ),
            params![user_id],
        )
    }

    /// Memories for a user filtered to a sector set, newest first
    pub fn memories_by_sectors(&self, user_id: &str, sectors: &[Sector]) -> Result<Vec<Memory>> {
        if sectors.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: Vec<String> =
            (0..sectors.len()).map(|i| format!("?{}", i + 2)).collect();
        let sql = format!(
            "SELECT {MEMORY_COLUMNS} FROM memories
             WHERE user_id = ?1 AND primary_sector IN ({})
             ORDER BY created_at DESC, rowid DESC",
            placeholders.join(", ")
        );

        let reader = self.reader()?;
        let mut stmt = reader.prepare(&sql)?;
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id.to_string())];
        for sector in sectors {
            values.push(Box::new(sector.as_str().to_string()));
        }
        let refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let rows = stmt
            .query_map(refs.as_slice(), row_to_memory)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Memories carrying a tag, newest first; optionally sector-restricted
    ///
    /// Tags are stored as a JSON array, so the match is on the quoted label.
    pub fn memories_with_tag(
        &self,
        user_id: &str,
        tag: &str,
        sector: Option<Sector>,
    ) -> Result<Vec<Memory>> {
        let pattern = format!("%\"{}\"%", tag.replace('"', ""));
        match sector {
            Some(s) => self.select_memories(
                &format!(
                    "SELECT {MEMORY_COLUMNS} FROM memories
                     WHERE user_id = ?1 AND tags LIKE ?2 AND primary_sector = ?3
                     ORDER BY created_at DESC, rowid DESC"
                ),
                params![user_id, pattern, s.as_str()],
            ),
            None => self.select_memories(
                &format!(
                    "SELECT {MEMORY_COLUMNS} FROM memories
                     WHERE user_id = ?1 AND tags LIKE ?2
                     ORDER BY created_at DESC, rowid DESC"
                ),
                params![user_id, pattern],
            ),
        }
    }

    /// Memories created within `[since_ms, until_ms)` carrying a tag
    pub fn memories_with_tag_since(
        &self,
        user_id: &str,
        tag: &str,
        since_ms: i64,
    ) -> Result<Vec<Memory>> {
        let pattern = format!("%\"{}\"%", tag.replace('"', ""));
        self.select_memories(
            &format!(
                "SELECT {MEMORY_COLUMNS} FROM memories
                 WHERE user_id = ?1 AND tags LIKE ?2 AND created_at >= ?3
                 ORDER BY created_at DESC, rowid DESC"
            ),
            params![user_id, pattern, since_ms],
        )
    }

    fn select_memories<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Memory>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(sql)?;
        let rows = stmt
            .query_map(params, row_to_memory)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Apply a partial update; `updated_at` moves on any change
    ///
    /// Salience is clamped to `[0.01, 1.0]`: below-floor values are legal
    /// here (archive tier 0.05, merge sink 0.01) but nothing goes lower.
    pub fn update_memory_fields(&self, id: &str, patch: MemoryPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let mut sets: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        let mut idx = 1;

        if let Some(salience) = patch.salience {
            sets.push(format!("salience = ?{idx}"));
            values.push(Box::new(salience.clamp(0.01, 1.0)));
            idx += 1;
        }
        if let Some(coactivations) = patch.coactivations {
            sets.push(format!("coactivations = ?{idx}"));
            values.push(Box::new(coactivations.max(0)));
            idx += 1;
        }
        if let Some(last_seen) = patch.last_seen_at {
            sets.push(format!("last_seen_at = ?{idx}"));
            values.push(Box::new(last_seen));
            idx += 1;
        }
        sets.push(format!("updated_at = ?{idx}"));
        values.push(Box::new(now_ms()));
        idx += 1;

        let sql = format!("UPDATE memories SET {} WHERE id = ?{idx}", sets.join(", "));
        values.push(Box::new(id.to_string()));
        let refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();

        let writer = self.writer()?;
        let changed = writer
            .execute(&sql, refs.as_slice())
            .map_err(|e| CoreError::StoreWriteFailed(e.to_string()))?;
        if changed == 0 {
            return Err(CoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Merge keys into a memory's meta bag, overwriting on collision
    ///
    /// Meta is otherwise write-once; this is how semantic roles land on
    /// endpoints after linking and how enforcement marks completions.
    pub fn merge_meta(&self, id: &str, patch: &serde_json::Value) -> Result<()> {
        let Some(obj) = patch.as_object() else {
            return Err(CoreError::BadRequest("meta patch must be an object".to_string()));
        };
        let memory = self
            .get_memory(id)?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
        let mut meta = if memory.meta.is_object() {
            memory.meta
        } else {
            serde_json::json!({})
        };
        for (key, value) in obj {
            meta[key] = value.clone();
        }
        let json = serde_json::to_string(&meta).unwrap_or_else(|_| "{}".to_string());

        let writer = self.writer()?;
        writer
            .execute(
                "UPDATE memories SET meta = ?1, updated_at = ?2 WHERE id = ?3",
                params![json, now_ms(), id],
            )
            .map_err(|e| CoreError::StoreWriteFailed(e.to_string()))?;
        Ok(())
    }

    /// Retrieval touch: bump coactivations and refresh `last_seen_at`
    pub fn touch_memory(&self, id: &str) -> Result<()> {
        let writer = self.writer()?;
        writer
            .execute(
                "UPDATE memories
                 SET coactivations = coactivations + 1, last_seen_at = ?1
                 WHERE id = ?2",
                params![now_ms(), id],
            )
            .map_err(|e| CoreError::StoreWriteFailed(e.to_string()))?;
        Ok(())
    }

    /// Decay one sector by `lambda * dt_days`, clamped at the active floor
    ///
    /// Archived rows (already below the floor) are left alone, which keeps
    /// the sweep idempotent for them too.
    pub fn apply_decay(&self, sector: Sector, lambda: f64, dt_days: f64) -> Result<usize> {
        let decrement = lambda * dt_days;
        if decrement <= 0.0 {
            return Ok(0);
        }
        let writer = self.writer()?;
        let changed = writer
            .execute(
                "UPDATE memories
                 SET salience = MAX(0.1, salience - ?1), updated_at = ?2
                 WHERE primary_sector = ?3 AND salience > 0.1",
                params![decrement, now_ms(), sector.as_str()],
            )
            .map_err(|e| CoreError::StoreWriteFailed(e.to_string()))?;
        Ok(changed)
    }

    /// Rewrite a row's clock fields; only tests may shift history
    #[cfg(test)]
    pub(crate) fn set_timestamps(&self, id: &str, created_at: i64, last_seen_at: i64) -> Result<()> {
        let writer = self.writer()?;
        writer.execute(
            "UPDATE memories SET created_at = ?1, updated_at = ?1, last_seen_at = ?2 WHERE id = ?3",
            params![created_at, last_seen_at, id],
        )?;
        Ok(())
    }

    /// Total number of memory rows
    pub fn count_memories(&self) -> Result<i64> {
        let reader = self.reader()?;
        let count = reader.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
        Ok(count)
    }

    // ========================================================================
    // WAYPOINTS
    // ========================================================================

    /// Upsert an edge on the ordered pair; the second write wins on weight
    pub fn upsert_waypoint(&self, src_id: &str, dst_id: &str, weight: f64) -> Result<()> {
        let now = now_ms();
        let writer = self.writer()?;
        writer
            .execute(
                "INSERT INTO waypoints (src_id, dst_id, weight, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT (src_id, dst_id)
                 DO UPDATE SET weight = excluded.weight, updated_at = excluded.updated_at",
                params![src_id, dst_id, weight.clamp(0.0, 1.0), now],
            )
            .map_err(|e| CoreError::StoreWriteFailed(e.to_string()))?;
        Ok(())
    }

    /// Outgoing edges of a memory
    pub fn waypoints_from(&self, src_id: &str) -> Result<Vec<Waypoint>> {
        self.select_waypoints(
            "SELECT src_id, dst_id, weight, created_at, updated_at
             FROM waypoints WHERE src_id = ?1",
            params![src_id],
        )
    }

    /// Incoming edges of a memory
    pub fn waypoints_to(&self, dst_id: &str) -> Result<Vec<Waypoint>> {
        self.select_waypoints(
            "SELECT src_id, dst_id, weight, created_at, updated_at
             FROM waypoints WHERE dst_id = ?1",
            params![dst_id],
        )
    }

    /// Every edge in the store
    pub fn all_waypoints(&self) -> Result<Vec<Waypoint>> {
        self.select_waypoints(
            "SELECT src_id, dst_id, weight, created_at, updated_at FROM waypoints",
            [],
        )
    }

    fn select_waypoints<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Waypoint>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(sql)?;
        let rows = stmt
            .query_map(params, |row| {
                Ok(Waypoint {
                    src_id: row.get(0)?,
                    dst_id: row.get(1)?,
                    weight: row.get(2)?,
                    created_at: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Delete one edge
    pub fn delete_waypoint(&self, src_id: &str, dst_id: &str) -> Result<bool> {
        let writer = self.writer()?;
        let changed = writer
            .execute(
                "DELETE FROM waypoints WHERE src_id = ?1 AND dst_id = ?2",
                params![src_id, dst_id],
            )
            .map_err(|e| CoreError::StoreWriteFailed(e.to_string()))?;
        Ok(changed > 0)
    }

    /// Delete edges where either endpoint no longer resolves
    pub fn delete_orphan_waypoints(&self) -> Result<usize> {
        let writer = self.writer()?;
        let changed = writer
            .execute(
                "DELETE FROM waypoints
                 WHERE src_id NOT IN (SELECT id FROM memories)
                    OR dst_id NOT IN (SELECT id FROM memories)",
                [],
            )
            .map_err(|e| CoreError::StoreWriteFailed(e.to_string()))?;
        Ok(changed)
    }

    /// Delete edges whose weight has decayed below the threshold
    pub fn delete_weak_waypoints(&self, threshold: f64) -> Result<usize> {
        let writer = self.writer()?;
        let changed = writer
            .execute("DELETE FROM waypoints WHERE weight < ?1", params![threshold])
            .map_err(|e| CoreError::StoreWriteFailed(e.to_string()))?;
        Ok(changed)
    }

    /// Move every edge of `from` onto `to`, skipping moves that would
    /// duplicate an existing edge or create a self-loop
    pub fn move_waypoints(&self, from: &str, to: &str) -> Result<usize> {
        let mut moved = 0;
        for wp in self.waypoints_from(from)? {
            if wp.dst_id != to {
                self.upsert_waypoint(to, &wp.dst_id, wp.weight)?;
                moved += 1;
            }
            self.delete_waypoint(&wp.src_id, &wp.dst_id)?;
        }
        for wp in self.waypoints_to(from)? {
            if wp.src_id != to {
                self.upsert_waypoint(&wp.src_id, to, wp.weight)?;
                moved += 1;
            }
            self.delete_waypoint(&wp.src_id, &wp.dst_id)?;
        }
        Ok(moved)
    }

    // ========================================================================
    // MAINTENANCE BOOKKEEPING
    // ========================================================================

    /// Record a completed sweep
    pub fn record_maintenance_run(&self, kind: &str, rows_touched: usize) -> Result<()> {
        let writer = self.writer()?;
        writer
            .execute(
                "INSERT INTO maintenance_runs (kind, ran_at, rows_touched) VALUES (?1, ?2, ?3)",
                params![kind, now_ms(), rows_touched as i64],
            )
            .map_err(|e| CoreError::StoreWriteFailed(e.to_string()))?;
        Ok(())
    }

    /// Most recent run timestamp for a sweep kind
    pub fn last_maintenance_run(&self, kind: &str) -> Result<Option<i64>> {
        let reader = self.reader()?;
        let ts = reader
            .query_row(
                "SELECT MAX(ran_at) FROM maintenance_runs WHERE kind = ?1",
                params![kind],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?
            .flatten();
        Ok(ts)
    }

    // ========================================================================
    // ANALYZER REPORTS
    // ========================================================================

    fn report_table_name(analyzer: &str) -> String {
        let safe: String = analyzer
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("report_{safe}")
    }

    fn ensure_report_table(&self, table: &str) -> Result<()> {
        {
            let known = self
                .report_tables
                .lock()
                .map_err(|_| CoreError::Init("report table cache poisoned".to_string()))?;
            if known.contains(table) {
                return Ok(());
            }
        }
        let writer = self.writer()?;
        writer.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_name TEXT NOT NULL,
                user_id TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                headline_count INTEGER NOT NULL DEFAULT 0,
                report TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_project
                ON {table}(project_name, timestamp);"
        ))?;
        drop(writer);
        self.report_tables
            .lock()
            .map_err(|_| CoreError::Init("report table cache poisoned".to_string()))?
            .insert(table.to_string());
        Ok(())
    }

    /// Append one analyzer report row; tables are created on first write
    ///
    /// On a write failure the missing table is (re)created and the insert is
    /// retried once. A second failure propagates; the analyzer still returns
    /// its computed report and flags the persistence gap.
    pub fn append_report(
        &self,
        analyzer: &str,
        project_name: &str,
        user_id: &str,
        headline_count: i64,
        report: &serde_json::Value,
    ) -> Result<()> {
        let table = Self::report_table_name(analyzer);
        self.ensure_report_table(&table)?;

        let json = serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string());
        let sql = format!(
            "INSERT INTO {table} (project_name, user_id, timestamp, headline_count, report)
             VALUES (?1, ?2, ?3, ?4, ?5)"
        );

        let insert = |conn: &Connection| {
            conn.execute(
                &sql,
                params![project_name, user_id, now_ms(), headline_count, json],
            )
        };

        let first = { insert(&*self.writer()?) };
        if first.is_ok() {
            return Ok(());
        }

        // Table may have been dropped out from under the existence cache
        self.report_tables
            .lock()
            .map_err(|_| CoreError::Init("report table cache poisoned".to_string()))?
            .remove(&table);
        self.ensure_report_table(&table)?;
        insert(&*self.writer()?).map_err(|e| CoreError::StoreWriteFailed(e.to_string()))?;
        Ok(())
    }

    /// Latest report rows for an analyzer and project, newest first
    pub fn latest_reports(
        &self,
        analyzer: &str,
        project_name: &str,
        limit: usize,
    ) -> Result<Vec<ReportRow>> {
        let table = Self::report_table_name(analyzer);
        {
            let known = self
                .report_tables
                .lock()
                .map_err(|_| CoreError::Init("report table cache poisoned".to_string()))?;
            if !known.contains(&table) {
                // Never written this process; probe the schema instead
                drop(known);
                let reader = self.reader()?;
                let exists: bool = reader
                    .query_row(
                        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                        params![table],
                        |row| row.get::<_, i64>(0).map(|n| n > 0),
                    )
                    .unwrap_or(false);
                if !exists {
                    return Ok(Vec::new());
                }
            }
        }

        let reader = self.reader()?;
        let mut stmt = reader.prepare(&format!(
            "SELECT project_name, user_id, timestamp, headline_count, report
             FROM {table} WHERE project_name = ?1
             ORDER BY timestamp DESC LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![project_name, limit as i64], |row| {
                let raw: String = row.get(4)?;
                Ok(ReportRow {
                    project_name: row.get(0)?,
                    user_id: row.get(1)?,
                    timestamp: row.get(2)?,
                    headline_count: row.get(3)?,
                    report: serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

const MEMORY_COLUMNS: &str = "id, content, embedding, tags, meta, user_id, primary_sector, \
     salience, coactivations, created_at, updated_at, last_seen_at";

fn row_to_memory(row: &rusqlite::Row<'_>) -> rusqlite::Result<Memory> {
    let embedding_bytes: Vec<u8> = row.get(2)?;
    let tags_json: String = row.get(3)?;
    let meta_json: String = row.get(4)?;
    let sector_name: String = row.get(6)?;

    Ok(Memory {
        id: row.get(0)?,
        content: row.get(1)?,
        embedding: vector_from_bytes(&embedding_bytes).unwrap_or_default(),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        meta: serde_json::from_str(&meta_json).unwrap_or(serde_json::Value::Null),
        user_id: row.get(5)?,
        primary_sector: Sector::parse_name(&sector_name).unwrap_or_default(),
        salience: row.get(7)?,
        coactivations: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        last_seen_at: row.get(11)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

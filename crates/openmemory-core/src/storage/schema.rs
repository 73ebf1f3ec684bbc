//! Database schema
//!
//! Migration definitions for the fixed tables. Analyzer report tables are
//! not migrated here; they are created lazily on first write and their
//! shapes are append-only by contract.

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Initial schema: memories, waypoints, maintenance runs",
    up: MIGRATION_V1_UP,
}];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: memories, waypoints, maintenance bookkeeping
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    meta TEXT NOT NULL DEFAULT '{}',
    user_id TEXT NOT NULL,
    primary_sector TEXT NOT NULL,

    -- Decay / reinforcement algebra
    salience REAL NOT NULL DEFAULT 0.5,
    coactivations INTEGER NOT NULL DEFAULT 0,

    -- Millisecond timestamps
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    last_seen_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_memories_user ON memories(user_id);
CREATE INDEX IF NOT EXISTS idx_memories_sector ON memories(user_id, primary_sector);
CREATE INDEX IF NOT EXISTS idx_memories_created ON memories(created_at);
CREATE INDEX IF NOT EXISTS idx_memories_salience ON memories(salience);

-- Directed weighted edges; one row per ordered pair
CREATE TABLE IF NOT EXISTS waypoints (
    src_id TEXT NOT NULL,
    dst_id TEXT NOT NULL,
    weight REAL NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (src_id, dst_id)
);

CREATE INDEX IF NOT EXISTS idx_waypoints_dst ON waypoints(dst_id);

-- One row per background sweep, read on boot to honour the interval
CREATE TABLE IF NOT EXISTS maintenance_runs (
    kind TEXT NOT NULL,
    ran_at INTEGER NOT NULL,
    rows_touched INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_maintenance_kind ON maintenance_runs(kind, ran_at);

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Apply any unapplied migrations to a connection
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current {
            tracing::info!(
                version = migration.version,
                description = migration.description,
                "Applying migration"
            );
            conn.execute_batch(migration.up)?;
            conn.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![migration.version, chrono::Utc::now().to_rfc3339()],
            )?;
        }
    }

    Ok(())
}

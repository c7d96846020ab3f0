//! Schema migration framework.
//!
//! Numbered SQL migrations are embedded at compile time via `include_str!`.
//! Each migration runs exactly once, tracked by the `schema_version` table.
//!
//! Databases written before the framework existed already carry a
//! `performance` table, possibly without the columns added over time. The
//! bootstrap step patches those columns in and marks the baseline applied so
//! its SQL never runs against populated data.

use std::path::PathBuf;

use rusqlite::backup::Backup;
use rusqlite::Connection;

struct Migration {
    version: i32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("migrations/001_baseline.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("migrations/002_period_index.sql"),
    },
];

/// Columns added to `performance` after the first release, with their DDL.
const LEGACY_COLUMNS: &[(&str, &str)] = &[
    ("left_growth_pct", "REAL DEFAULT 0"),
    ("right_growth_pct", "REAL DEFAULT 0"),
    ("total_growth_pct", "REAL DEFAULT 0"),
    ("position", "TEXT DEFAULT ''"),
    ("sort_order", "INTEGER DEFAULT 0"),
];

/// Highest applied version, creating the tracking table on first use.
fn applied_version(conn: &Connection) -> Result<i32, String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("Failed to create schema_version: {e}"))?;
    conn.query_row("SELECT IFNULL(MAX(version), 0) FROM schema_version", [], |row| {
        row.get(0)
    })
    .map_err(|e| format!("Failed to read schema version: {e}"))
}

fn table_exists(conn: &Connection, table: &str) -> bool {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        [table],
        |row| row.get(0),
    )
    .unwrap_or(false)
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, String> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .map_err(|e| format!("Failed to inspect {table}: {e}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|e| format!("Failed to inspect {table}: {e}"))?;
    let mut columns = Vec::new();
    for row in rows {
        columns.push(row.map_err(|e| format!("Failed to inspect {table}: {e}"))?);
    }
    Ok(columns)
}

/// Detect a pre-framework database and mark the baseline as applied.
///
/// Missing legacy columns are added first so every later query can rely on
/// the baseline shape.
fn bootstrap_existing_db(conn: &Connection) -> Result<bool, String> {
    if applied_version(conn)? > 0 || !table_exists(conn, "performance") {
        return Ok(false);
    }

    let columns = table_columns(conn, "performance")?;
    for (column, ddl) in LEGACY_COLUMNS {
        if !columns.iter().any(|c| c == column) {
            conn.execute_batch(&format!(
                "ALTER TABLE performance ADD COLUMN {} {};",
                column, ddl
            ))
            .map_err(|e| format!("Failed to add legacy column {column}: {e}"))?;
            log::info!("Migration bootstrap: added missing column performance.{}", column);
        }
    }

    // Tables that older builds created lazily; all statements are IF NOT EXISTS.
    conn.execute_batch(MIGRATIONS[0].sql)
        .map_err(|e| format!("Failed to complete legacy schema: {e}"))?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )
    .map_err(|e| format!("Failed to bootstrap schema version: {e}"))?;
    log::info!("Migration bootstrap: marked v1 (baseline) as applied for existing database");
    Ok(true)
}

/// Copy the main database to `<db>.pre-migration.bak` with SQLite's online
/// backup API. In-memory databases have no file and are skipped.
fn pre_migration_backup(conn: &Connection) -> Result<Option<PathBuf>, String> {
    let file: String = conn
        .query_row(
            "SELECT file FROM pragma_database_list WHERE name = 'main'",
            [],
            |row| row.get(0),
        )
        .map_err(|e| format!("Failed to locate database file: {e}"))?;
    if file.is_empty() {
        return Ok(None);
    }

    let target = PathBuf::from(format!("{file}.pre-migration.bak"));
    let mut dest = Connection::open(&target)
        .map_err(|e| format!("Failed to open {}: {e}", target.display()))?;
    Backup::new(conn, &mut dest)
        .and_then(|backup| backup.step(-1))
        .map_err(|e| format!("Pre-migration backup failed: {e}"))?;

    log::info!("Pre-migration backup written to {}", target.display());
    Ok(Some(target))
}

/// Bring the schema up to date. Returns how many migrations ran.
///
/// A database stamped with a version newer than this build is refused. Each
/// migration commits together with its `schema_version` row.
pub fn run_migrations(conn: &Connection) -> Result<usize, String> {
    bootstrap_existing_db(conn)?;

    let current = applied_version(conn)?;
    let latest = MIGRATIONS.last().map_or(0, |m| m.version);
    if current > latest {
        return Err(format!(
            "Database schema version {current} is newer than this version of perftrack supports ({latest}). \
             Please upgrade perftrack."
        ));
    }

    let pending = MIGRATIONS.iter().filter(|m| m.version > current).count();
    if pending == 0 {
        return Ok(0);
    }
    pre_migration_backup(conn)?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| format!("Failed to start migration v{}: {e}", migration.version))?;
        tx.execute_batch(migration.sql)
            .map_err(|e| format!("Migration v{} failed: {e}", migration.version))?;
        tx.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [migration.version],
        )
        .map_err(|e| format!("Failed to record migration v{}: {e}", migration.version))?;
        tx.commit()
            .map_err(|e| format!("Failed to commit migration v{}: {e}", migration.version))?;
        log::info!("Applied migration v{}", migration.version);
    }

    Ok(pending)
}

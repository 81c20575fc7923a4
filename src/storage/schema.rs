//! Database schema and migrations.
//!
//! Versioned migrations tracked through a `schema_migrations` table. Each
//! migration runs inside a transaction and is recorded with its version, so
//! re-running is a no-op.

use rusqlite::Connection;

use crate::error::Result;

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: "\
        CREATE TABLE IF NOT EXISTS providers (\
            id INTEGER PRIMARY KEY AUTOINCREMENT,\
            name TEXT NOT NULL UNIQUE,\
            base_url TEXT NOT NULL,\
            ratio REAL NOT NULL DEFAULT 1.0,\
            schema TEXT NOT NULL,\
            created_at TEXT NOT NULL\
        );\
        CREATE TABLE IF NOT EXISTS price_groups (\
            id INTEGER PRIMARY KEY AUTOINCREMENT,\
            provider_id INTEGER NOT NULL REFERENCES providers(id) ON DELETE CASCADE,\
            name TEXT NOT NULL,\
            ratio REAL NOT NULL DEFAULT 1.0,\
            access_key TEXT NOT NULL,\
            created_at TEXT NOT NULL,\
            UNIQUE(provider_id, name)\
        );\
        CREATE TABLE IF NOT EXISTS model_offers (\
            id INTEGER PRIMARY KEY AUTOINCREMENT,\
            name TEXT NOT NULL UNIQUE,\
            ratio REAL NOT NULL DEFAULT 0,\
            price TEXT NOT NULL DEFAULT '0',\
            completion_ratio REAL NOT NULL DEFAULT 0,\
            quota_kind INTEGER NOT NULL DEFAULT 0,\
            provider_id INTEGER NOT NULL,\
            group_id INTEGER NOT NULL,\
            created_at TEXT NOT NULL\
        );\
        CREATE TABLE IF NOT EXISTS test_results (\
            id INTEGER PRIMARY KEY AUTOINCREMENT,\
            offer_id INTEGER NOT NULL REFERENCES model_offers(id) ON DELETE CASCADE,\
            tested_at TEXT NOT NULL,\
            status INTEGER NOT NULL DEFAULT 0,\
            error TEXT,\
            probe_kind TEXT NOT NULL DEFAULT ''\
        );\
        CREATE INDEX IF NOT EXISTS idx_test_results_offer_time \
            ON test_results(offer_id, tested_at);\
        CREATE INDEX IF NOT EXISTS idx_price_groups_provider \
            ON price_groups(provider_id);",
}];

/// Run schema migrations.
///
/// Returns the latest schema version applied.
///
/// # Errors
/// Returns an error if creating the migrations table, reading the schema
/// version, or applying any migration fails.
pub fn run_migrations(conn: &mut Connection) -> Result<i32> {
    ensure_schema_migrations_table(conn)?;

    let mut current_version = get_schema_version(conn)?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            apply_migration(conn, migration)?;
            current_version = migration.version;
        }
    }

    Ok(current_version)
}

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: i32,
    sql: &'static str,
}

fn ensure_schema_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (\
            version INTEGER PRIMARY KEY,\
            applied_at TEXT DEFAULT (datetime('now'))\
        );",
    )?;
    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32> {
    let version: Option<i32> =
        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })?;
    Ok(version.unwrap_or(0))
}

fn apply_migration(conn: &mut Connection, migration: &Migration) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(migration.sql)?;
    tx.execute(
        "INSERT INTO schema_migrations (version) VALUES (?1)",
        [migration.version],
    )?;
    tx.commit()?;
    Ok(())
}

//! Database schema migrations.
//!
//! A `_migrations` table records which numbered batches have been applied.
//! Each pending batch runs in its own transaction together with its
//! bookkeeping row, so a failed migration leaves no partial schema behind.

use super::Error;
use tokio_rusqlite::{Connection, params, rusqlite::TransactionBehavior};

/// A numbered schema change.
struct Migration {
    version: i64,
    description: &'static str,
    sql: &'static str,
}

/// Migrations in application order. All SQL uses CREATE IF NOT EXISTS.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "cache namespaces and entries",
        sql: include_str!("../../migrations/001_cache_entries.sql"),
    },
    Migration {
        version: 2,
        description: "worker state",
        sql: include_str!("../../migrations/002_worker_state.sql"),
    },
];

/// Run any pending migrations.
///
/// # Errors
///
/// Returns `Error::MigrationFailed` naming the migration whose SQL failed.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current: i64 =
            conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute_batch(migration.sql).map_err(|e| {
                Error::MigrationFailed(format!("{} ({}): {e}", migration.version, migration.description))
            })?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![migration.version, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;

            tracing::debug!(version = migration.version, description = migration.description, "applied migration");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

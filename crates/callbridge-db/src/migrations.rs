//! Schema migrations for the call database, embedded at compile time.

use rusqlite::Connection;
use std::collections::HashSet;
use thiserror::Error;

/// A single embedded migration.
struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. New migrations are appended here.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_init",
        sql: include_str!("migrations/000_init.sql"),
    },
    Migration {
        name: "001_scenarios",
        sql: include_str!("migrations/001_scenarios.sql"),
    },
    Migration {
        name: "002_calls",
        sql: include_str!("migrations/002_calls.sql"),
    },
];

/// Errors that can occur during migration execution.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A SQL statement within a migration failed.
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        /// The name of the migration that failed.
        name: String,
        /// The underlying SQLite error.
        source: rusqlite::Error,
    },

    /// Failed to query migration state.
    #[error("failed to check migration state: {0}")]
    StateQuery(rusqlite::Error),
}

/// Applies every migration not yet recorded in `_callbridge_migrations`.
///
/// Each migration runs in its own transaction together with its bookkeeping
/// row, so a failure leaves the schema at the last good migration. Returns
/// how many migrations were applied.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    run_migrations_from_list(conn, MIGRATIONS)
}

fn failed(name: &str) -> impl FnOnce(rusqlite::Error) -> MigrationError + '_ {
    move |source| MigrationError::ExecutionFailed {
        name: name.to_string(),
        source,
    }
}

fn applied_names(conn: &Connection) -> Result<HashSet<String>, MigrationError> {
    let mut stmt = conn
        .prepare("SELECT name FROM _callbridge_migrations")
        .map_err(MigrationError::StateQuery)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .and_then(|rows| rows.collect::<Result<HashSet<_>, _>>())
        .map_err(MigrationError::StateQuery)?;
    Ok(names)
}

fn run_migrations_from_list(
    conn: &Connection,
    migrations: &[Migration],
) -> Result<usize, MigrationError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _callbridge_migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(failed("_callbridge_migrations_bootstrap"))?;

    let done = applied_names(conn)?;
    let pending: Vec<&Migration> = migrations
        .iter()
        .filter(|m| !done.contains(m.name))
        .collect();
    if pending.is_empty() {
        tracing::debug!(known = done.len(), "schema is up to date");
        return Ok(0);
    }

    for migration in &pending {
        tracing::info!(migration = migration.name, "applying migration");
        let tx = conn.unchecked_transaction().map_err(failed(migration.name))?;
        tx.execute_batch(migration.sql)
            .map_err(failed(migration.name))?;
        tx.execute(
            "INSERT INTO _callbridge_migrations (name) VALUES (?1)",
            [migration.name],
        )
        .map_err(failed(migration.name))?;
        tx.commit().map_err(failed(migration.name))?;
    }

    Ok(pending.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [name],
            |row| row.get(0),
        )
        .expect("should query sqlite_master")
    }

    #[test]
    fn run_migrations_on_fresh_db() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, MIGRATIONS.len());

        for table in ["scenarios", "questions", "ending_guidances", "calls"] {
            assert!(table_exists(&conn, table), "{table} table should exist");
        }
    }

    #[test]
    fn run_migrations_idempotent() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        run_migrations(&conn).expect("first run should succeed");
        let second = run_migrations(&conn).expect("second run should succeed");
        assert_eq!(second, 0, "no new migrations to apply");
    }

    #[test]
    fn failed_migration_rolls_back_its_schema_changes() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        let migrations = [Migration {
            name: "900_broken",
            sql: "
                CREATE TABLE half_applied (id INTEGER PRIMARY KEY);
                INSERT INTO no_such_table (id) VALUES (1);
            ",
        }];

        let err = run_migrations_from_list(&conn, &migrations)
            .expect_err("broken migration should fail");
        match err {
            MigrationError::ExecutionFailed { name, .. } => assert_eq!(name, "900_broken"),
            other => panic!("unexpected error type: {other:?}"),
        }
        assert!(!table_exists(&conn, "half_applied"));
    }
}

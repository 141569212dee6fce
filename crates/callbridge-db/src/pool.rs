//! Connection pool for the call database.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use std::path::Path;
use thiserror::Error;

/// Runtime tunables for SQLite connection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// Busy timeout for SQLite connections, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

/// Pooled SQLite connections shared by the HTTP handlers and bridge adapters.
pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to create database connection pool: {0}")]
    PoolInit(#[from] r2d2::Error),
}

/// Opens a pool over the database file at `db_path`, creating it if needed.
///
/// Every connection runs in WAL mode with foreign keys on, so the bridge's
/// one-shot flag updates never block the TwiML and stream handlers' reads.
/// The database is always file-backed: pooled `:memory:` connections would
/// each see a private database.
pub fn create_pool(
    db_path: impl AsRef<Path>,
    settings: DbRuntimeSettings,
) -> Result<DbPool, PoolError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

    let manager = SqliteConnectionManager::file(db_path.as_ref())
        .with_flags(flags)
        .with_init(move |conn| {
            conn.busy_timeout(std::time::Duration::from_millis(settings.busy_timeout_ms))?;
            let journal_mode: String =
                conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
            if !journal_mode.eq_ignore_ascii_case("wal") {
                return Err(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                    Some(format!("database refused WAL journal mode, got: {journal_mode}")),
                ));
            }
            conn.pragma_update(None, "foreign_keys", true)
        });

    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .build(manager)?;

    Ok(pool)
}

//! Database layer for the callbridge platform.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! embedded SQL migrations, and the query helpers the realtime bridge needs:
//! loading a call record, loading a scenario script, and the two one-shot
//! transitions on a call record (hand-off executed, SMS sent).
//!
//! Scenario administration lives elsewhere. The insert helpers here exist so
//! that callers and tests can seed rows without hand-written SQL.

mod calls;
mod migrations;
mod pool;
mod scenarios;

pub use calls::{create_call, get_call, mark_bridge_executed, mark_sms_sent, NewCall};
pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
pub use scenarios::{
    add_closing, add_question, create_scenario, load_scenario_script, set_scenario_active,
    NewScenario,
};

use thiserror::Error;

/// Errors returned by the query helpers.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("call not found: {0}")]
    CallNotFound(String),
    #[error("scenario not found: {0}")]
    ScenarioNotFound(i64),
}

//! SQLite-backed call repository for the bridge.

use async_trait::async_trait;
use callbridge_db::{get_call, load_scenario_script, mark_bridge_executed, mark_sms_sent, DbError, DbPool};
use callbridge_types::{CallRecord, ScenarioScript};
use callbridge_voice::{BridgeError, CallRepository};
use rusqlite::Connection;

/// Runs each query on the blocking pool so the audio loops never wait on SQLite.
#[derive(Clone)]
pub struct SqliteCallRepository {
    pool: DbPool,
}

impl SqliteCallRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn with_conn<T, F>(&self, op: &'static str, f: F) -> Result<T, BridgeError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool
                .get()
                .map_err(|e| BridgeError::Collaborator(format!("{op}: no database connection: {e}")))?;
            f(&conn).map_err(|e| BridgeError::Collaborator(format!("{op}: {e}")))
        })
        .await
        .map_err(|e| BridgeError::Collaborator(format!("{op}: database task failed: {e}")))?
    }
}

#[async_trait]
impl CallRepository for SqliteCallRepository {
    async fn load_call(&self, call_sid: &str) -> Result<Option<CallRecord>, BridgeError> {
        let call_sid = call_sid.to_string();
        self.with_conn("load_call", move |conn| get_call(conn, &call_sid))
            .await
    }

    async fn load_script(&self, scenario_id: i64) -> Result<Option<ScenarioScript>, BridgeError> {
        self.with_conn("load_script", move |conn| {
            load_scenario_script(conn, scenario_id)
        })
        .await
    }

    async fn mark_bridge_executed(&self, call_sid: &str) -> Result<bool, BridgeError> {
        let call_sid = call_sid.to_string();
        self.with_conn("mark_bridge_executed", move |conn| {
            mark_bridge_executed(conn, &call_sid)
        })
        .await
    }

    async fn mark_sms_sent(&self, call_sid: &str) -> Result<bool, BridgeError> {
        let call_sid = call_sid.to_string();
        self.with_conn("mark_sms_sent", move |conn| mark_sms_sent(conn, &call_sid))
            .await
    }
}

//! Callbridge server library logic.

pub mod api_stream;
pub mod api_twiml;
pub mod config;
pub mod store;

use axum::{extract::DefaultBodyLimit, routing::get, Extension, Json, Router};
use callbridge_db::DbPool;
use callbridge_voice::{
    BridgeDeps, BridgeError, OpenAiRealtimeConnector, TwilioClient, BRIDGE_TWIML_PATH,
};
use config::Config;
use serde_json::{json, Value};
use std::sync::Arc;
use store::SqliteCallRepository;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Collaborators and tuning handed to every bridge.
    pub bridge: BridgeDeps,
}

impl AppState {
    /// Wires the production collaborators: SQLite, Twilio REST and the
    /// OpenAI realtime endpoint.
    pub fn from_config(pool: DbPool, config: &Config) -> Result<Self, BridgeError> {
        let twilio = Arc::new(TwilioClient::new(config.twilio.clone())?);
        let bridge = BridgeDeps {
            repository: Arc::new(SqliteCallRepository::new(pool.clone())),
            call_control: twilio.clone(),
            messaging: twilio,
            connector: Arc::new(OpenAiRealtimeConnector::new(config.realtime.clone())),
            realtime: config.realtime.clone(),
            tuning: Arc::new(config.bridge.clone()),
        };
        Ok(Self { pool, bridge })
    }
}

/// Maximum request body size (64 KiB). Twilio webhooks are small forms.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/realtime/stream/{call_sid}",
            get(api_stream::stream_handler),
        )
        .route(
            BRIDGE_TWIML_PATH,
            get(api_twiml::bridge_twiml_handler).post(api_twiml::bridge_twiml_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}

//! Interfaces to the systems the bridge drives but does not own.

use crate::error::BridgeError;
use async_trait::async_trait;
use callbridge_types::{CallRecord, ScenarioScript};
use std::sync::Arc;

/// Call and scenario persistence.
#[async_trait]
pub trait CallRepository: Send + Sync {
    async fn load_call(&self, call_sid: &str) -> Result<Option<CallRecord>, BridgeError>;

    async fn load_script(&self, scenario_id: i64) -> Result<Option<ScenarioScript>, BridgeError>;

    /// Records the hand-off. Returns `false` if it was already recorded.
    async fn mark_bridge_executed(&self, call_sid: &str) -> Result<bool, BridgeError>;

    /// Records the SMS. Returns `false` if it was already recorded.
    async fn mark_sms_sent(&self, call_sid: &str) -> Result<bool, BridgeError>;
}

/// Live-call control on the telephony provider.
#[async_trait]
pub trait CallControl: Send + Sync {
    /// Moves the live call out of the media stream and dials `destination`.
    async fn redirect(&self, call_sid: &str, destination: &str) -> Result<(), BridgeError>;
}

/// Outbound text messaging.
#[async_trait]
pub trait Messaging: Send + Sync {
    /// Sends `body` to `to` from the configured sender number.
    async fn send_message(&self, to: &str, body: &str) -> Result<(), BridgeError>;
}

/// The collaborators a tool call may touch.
#[derive(Clone)]
pub struct Collaborators {
    pub repository: Arc<dyn CallRepository>,
    pub call_control: Arc<dyn CallControl>,
    pub messaging: Arc<dyn Messaging>,
}

//! Realtime voice bridge for the callbridge platform.
//!
//! Relays live audio between a telephony media-stream socket and a
//! speech-AI realtime session. Per call, three loops share one
//! [`context::SessionContext`]:
//!
//! - the ingress gate ([`ingress`]) filters caller audio for echo and
//!   barge-in before forwarding it,
//! - the turn-state controller ([`turn`]) relays AI audio back and tracks
//!   who is speaking,
//! - the silence watchdog ([`watchdog`]) nudges or hangs up on quiet callers.
//!
//! Tool calls from the AI ([`tools`]) run on their own tasks against the
//! [`collaborators`] traits; [`twilio`] implements the telephony and
//! messaging ones. [`bridge::run_bridge`] ties it together.

pub mod bridge;
pub mod codec;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod dates;
pub mod error;
pub mod ingress;
pub mod prompt;
pub mod protocol;
pub mod realtime;
pub mod session;
pub mod telephony;
pub mod tools;
pub mod turn;
pub mod twilio;
pub mod watchdog;

pub use bridge::{run_bridge, BridgeDeps, BridgeOutcome, Rejection};
pub use collaborators::{CallControl, CallRepository, Messaging};
pub use config::{BridgeTuning, RealtimeConfig, TwilioConfig, VadConfig};
pub use error::BridgeError;
pub use realtime::{OpenAiRealtimeConnector, RealtimeCommand, RealtimeConnector, RealtimeSession};
pub use telephony::{TelephonyChannel, TelephonyCommand, TelephonyFrame};
pub use twilio::{handoff_url, TwilioClient, BRIDGE_TWIML_PATH};

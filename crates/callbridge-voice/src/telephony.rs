//! Telephony media-stream wire protocol (Twilio Media Streams).

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// An inbound event on the media-stream socket.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyEvent {
    Start { start: StreamStart },
    Media { media: InboundMedia },
    Stop,
    Dtmf { dtmf: DtmfDigit },
    /// `connected`, `mark` and anything newer.
    #[serde(other)]
    Other,
}

impl TelephonyEvent {
    /// Decodes one text frame from the provider.
    pub fn parse(text: &str) -> Result<Self, BridgeError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStart {
    pub stream_sid: String,
    #[serde(default)]
    pub call_sid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundMedia {
    pub payload: String,
    #[serde(default)]
    pub track: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DtmfDigit {
    pub digit: String,
}

/// A chunk of encoded caller audio awaiting the ingress decision.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Base64-encoded μ-law audio.
    pub payload: String,
    /// `inbound` or `outbound` when the provider labels the track.
    pub track: Option<String>,
    pub received_at: Instant,
}

impl AudioFrame {
    pub fn from_media(media: InboundMedia, received_at: Instant) -> Self {
        Self {
            payload: media.payload,
            track: media.track,
            received_at,
        }
    }

    /// True when the frame carries no track label or is labelled `inbound`.
    pub fn is_inbound(&self) -> bool {
        matches!(self.track.as_deref(), None | Some("inbound"))
    }
}

/// An outbound frame written to the media-stream socket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyFrame {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },
    /// Discards audio the provider has buffered but not yet played.
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMedia {
    pub payload: String,
}

impl TelephonyFrame {
    pub fn media(stream_sid: &str, payload: impl Into<String>) -> Self {
        Self::Media {
            stream_sid: stream_sid.to_string(),
            media: OutboundMedia {
                payload: payload.into(),
            },
        }
    }

    pub fn clear(stream_sid: &str) -> Self {
        Self::Clear {
            stream_sid: stream_sid.to_string(),
        }
    }
}

/// Instructions from the bridge to whatever owns the telephony socket.
#[derive(Debug, Clone, PartialEq)]
pub enum TelephonyCommand {
    Send(TelephonyFrame),
    /// Close the socket. Sent at most once per call.
    Close,
}

/// The bridge's view of one media-stream socket.
///
/// `inbound` yields raw text frames and ends when the socket disconnects.
pub struct TelephonyChannel {
    pub inbound: mpsc::Receiver<String>,
    pub outbound: mpsc::Sender<TelephonyCommand>,
}

//! Shared domain types for the callbridge platform.
//!
//! This crate provides the foundational types used across all callbridge
//! crates: the per-call scenario script, the call record as seen by the
//! bridge, and the small closed vocabularies (conversation mode, call
//! direction, classification) that both the persistence layer and the
//! realtime bridge agree on.
//!
//! No I/O lives here. Keeping these definitions dependency-free prevents
//! cycles between `callbridge-db` and `callbridge-voice`.

use serde::{Deserialize, Serialize};

mod script;
pub use script::ScenarioScript;

/// How strictly the AI follows the scripted question list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConversationMode {
    /// Ask the scripted questions strictly in order.
    #[default]
    Strict,
    /// Free dialogue guided by the script.
    Free,
    /// Follow the script but adapt to the caller's answers.
    Hybrid,
}

impl ConversationMode {
    /// Returns the single-letter tag stored in the scenario table.
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Strict => "A",
            Self::Free => "B",
            Self::Hybrid => "C",
        }
    }

    /// Parses a stored tag. Unknown tags fall back to [`ConversationMode::Strict`].
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "B" | "b" => Self::Free,
            "C" | "c" => Self::Hybrid,
            _ => Self::Strict,
        }
    }

    /// Returns a short natural-language description for the AI instructions.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Strict => "strict: ask every question in the listed order",
            Self::Free => "free: hold a natural conversation that covers the questions",
            Self::Hybrid => {
                "hybrid: follow the listed order but adapt flexibly to the caller's answers"
            }
        }
    }
}

/// Which side placed the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    /// The caller dialled one of our numbers.
    #[default]
    Inbound,
    /// We dialled the caller.
    Outbound,
}

impl CallDirection {
    /// Returns the string stored in the `calls.direction` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }

    /// Parses a stored direction. Anything but `outbound` is inbound.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("outbound") {
            Self::Outbound
        } else {
            Self::Inbound
        }
    }
}

/// Outcome classifications the bridge writes onto a call record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallClassification {
    /// The caller was handed off to a human.
    Bridged,
}

impl CallClassification {
    /// Returns the label stored in the `calls.classification` column.
    pub fn label(self) -> &'static str {
        match self {
            Self::Bridged => "bridged",
        }
    }
}

/// The subset of a call record the bridge reads at stream accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Telephony call identifier.
    pub call_sid: String,
    /// Number the call came from.
    pub from_number: String,
    /// Number the call went to.
    pub to_number: String,
    /// Direction of the call.
    pub direction: CallDirection,
    /// Scenario attached to the call, if any.
    pub scenario_id: Option<i64>,
    /// Whether a hand-off has already been executed.
    pub bridge_executed: bool,
    /// Whether the SMS has already been sent.
    pub sms_sent: bool,
}

impl CallRecord {
    /// Returns the phone number of the person on the other end of the line.
    pub fn caller_number(&self) -> &str {
        match self.direction {
            CallDirection::Inbound => &self.from_number,
            CallDirection::Outbound => &self.to_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_mode_tags_round_trip() {
        for mode in [
            ConversationMode::Strict,
            ConversationMode::Free,
            ConversationMode::Hybrid,
        ] {
            assert_eq!(ConversationMode::from_tag(mode.as_tag()), mode);
        }
    }

    #[test]
    fn unknown_mode_tag_is_strict() {
        assert_eq!(ConversationMode::from_tag(""), ConversationMode::Strict);
        assert_eq!(ConversationMode::from_tag("Z"), ConversationMode::Strict);
    }

    #[test]
    fn caller_number_follows_direction() {
        let mut record = CallRecord {
            call_sid: "CA1".to_string(),
            from_number: "+8150000001".to_string(),
            to_number: "+8150000002".to_string(),
            direction: CallDirection::Inbound,
            scenario_id: Some(1),
            bridge_executed: false,
            sms_sent: false,
        };
        assert_eq!(record.caller_number(), "+8150000001");

        record.direction = CallDirection::Outbound;
        assert_eq!(record.caller_number(), "+8150000002");
    }

    #[test]
    fn direction_parse_defaults_to_inbound() {
        assert_eq!(CallDirection::parse("OUTBOUND"), CallDirection::Outbound);
        assert_eq!(CallDirection::parse("outbound-api"), CallDirection::Inbound);
        assert_eq!(CallDirection::parse(""), CallDirection::Inbound);
    }
}

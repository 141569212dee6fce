//! Realtime speech-AI backend events.

use crate::config::RealtimeConfig;
use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// An event sent to the realtime backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },
    #[serde(rename = "response.create")]
    ResponseCreate {
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<ResponseOptions>,
    },
    #[serde(rename = "response.cancel")]
    ResponseCancel,
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },
}

impl ClientEvent {
    /// A bare `response.create` that lets the model continue on its own.
    pub fn continue_response() -> Self {
        Self::ResponseCreate { response: None }
    }

    /// A `response.create` carrying per-response instructions.
    pub fn respond_with(instructions: impl Into<String>) -> Self {
        Self::ResponseCreate {
            response: Some(ResponseOptions {
                instructions: instructions.into(),
            }),
        }
    }

    /// The result of a tool call, addressed by the backend's call id.
    pub fn function_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::ConversationItemCreate {
            item: ConversationItem::FunctionCallOutput {
                call_id: call_id.into(),
                output: output.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseOptions {
    pub instructions: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ConversationItem {
    #[serde(rename = "function_call_output")]
    FunctionCallOutput { call_id: String, output: String },
}

/// The `session` object of `session.update`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    pub modalities: Vec<String>,
    pub instructions: String,
    pub voice: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub turn_detection: TurnDetection,
    pub tools: Vec<Value>,
    pub tool_choice: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: f64,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

impl SessionConfig {
    pub fn new(instructions: String, config: &RealtimeConfig) -> Self {
        Self {
            modalities: vec!["audio".to_string(), "text".to_string()],
            instructions,
            voice: config.voice.clone(),
            input_audio_format: config.input_audio_format.clone(),
            output_audio_format: config.output_audio_format.clone(),
            turn_detection: TurnDetection {
                kind: "server_vad".to_string(),
                threshold: config.vad.threshold,
                prefix_padding_ms: config.vad.prefix_padding_ms,
                silence_duration_ms: config.vad.silence_duration_ms,
            },
            tools: tool_schemas(),
            tool_choice: "auto".to_string(),
        }
    }
}

/// The fixed function schemas exposed to the backend.
pub fn tool_schemas() -> Vec<Value> {
    vec![
        json!({
            "type": "function",
            "name": "calculate_date",
            "description": "Resolve a relative date expression such as 'tomorrow' or '来週' to an absolute calendar date.",
            "parameters": {
                "type": "object",
                "properties": {
                    "relative_expression": {
                        "type": "string",
                        "description": "The relative date expression the caller used."
                    }
                },
                "required": ["relative_expression"]
            }
        }),
        json!({
            "type": "function",
            "name": "trigger_bridge",
            "description": "Transfer the call to a human operator when the caller asks for one.",
            "parameters": {
                "type": "object",
                "properties": {
                    "user_name": { "type": "string", "description": "The caller's name, if known." }
                }
            }
        }),
        json!({
            "type": "function",
            "name": "trigger_sms",
            "description": "Send the caller a text message with follow-up materials.",
            "parameters": {
                "type": "object",
                "properties": {
                    "reason": { "type": "string", "description": "What the caller asked to receive." }
                }
            }
        }),
        json!({
            "type": "function",
            "name": "end_call",
            "description": "Hang up. Call immediately after reading the final closing statement.",
            "parameters": { "type": "object", "properties": {} }
        }),
    ]
}

/// An event received from the realtime backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "response.audio.delta", alias = "response.output_audio.delta")]
    AudioDelta { delta: String },
    #[serde(rename = "response.audio.done", alias = "response.output_audio.done")]
    AudioDone,
    #[serde(rename = "response.done")]
    ResponseDone,
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        name: String,
        call_id: String,
        #[serde(default)]
        arguments: String,
    },
    #[serde(rename = "error")]
    Error { error: ErrorDetail },
    #[serde(other)]
    Other,
}

impl ServerEvent {
    /// Decodes one text frame from the backend.
    pub fn parse(text: &str) -> Result<Self, BridgeError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_update_carries_codec_vad_and_tools() {
        let event = ClientEvent::SessionUpdate {
            session: SessionConfig::new("be brief".to_string(), &RealtimeConfig::default()),
        };
        let value = serde_json::to_value(&event).expect("serialize");

        assert_eq!(value["type"], "session.update");
        assert_eq!(value["session"]["input_audio_format"], "g711_ulaw");
        assert_eq!(value["session"]["turn_detection"]["type"], "server_vad");
        assert_eq!(value["session"]["turn_detection"]["silence_duration_ms"], 500);

        let names: Vec<&str> = value["session"]["tools"]
            .as_array()
            .expect("tools array")
            .iter()
            .filter_map(|t| t["name"].as_str())
            .collect();
        assert_eq!(
            names,
            ["calculate_date", "trigger_bridge", "trigger_sms", "end_call"]
        );
    }

    #[test]
    fn function_output_is_a_conversation_item() {
        let value = serde_json::to_value(ClientEvent::function_output("call_1", "ok"))
            .expect("serialize");
        assert_eq!(
            value,
            json!({
                "type": "conversation.item.create",
                "item": { "type": "function_call_output", "call_id": "call_1", "output": "ok" }
            })
        );
    }

    #[test]
    fn bare_response_create_has_no_response_field() {
        let value = serde_json::to_value(ClientEvent::continue_response()).expect("serialize");
        assert_eq!(value, json!({ "type": "response.create" }));
        let value = serde_json::to_value(ClientEvent::ResponseCancel).expect("serialize");
        assert_eq!(value, json!({ "type": "response.cancel" }));
    }

    #[test]
    fn audio_delta_accepts_both_event_names() {
        for name in ["response.audio.delta", "response.output_audio.delta"] {
            let event: ServerEvent = serde_json::from_value(json!({
                "type": name,
                "response_id": "resp_1",
                "item_id": "item_1",
                "delta": "AAAA"
            }))
            .expect("delta should parse");
            assert_eq!(
                event,
                ServerEvent::AudioDelta {
                    delta: "AAAA".to_string()
                }
            );
        }
    }

    #[test]
    fn function_call_and_error_events_parse() {
        let event: ServerEvent = serde_json::from_value(json!({
            "type": "response.function_call_arguments.done",
            "name": "trigger_sms",
            "call_id": "call_9",
            "arguments": "{\"reason\":\"brochure\"}"
        }))
        .expect("function call should parse");
        assert!(matches!(
            event,
            ServerEvent::FunctionCallArgumentsDone { ref name, .. } if name == "trigger_sms"
        ));

        let event: ServerEvent = serde_json::from_value(json!({
            "type": "error",
            "error": { "type": "invalid_request_error", "message": "bad" }
        }))
        .expect("error should parse");
        match event {
            ServerEvent::Error { error } => assert_eq!(error.message.as_deref(), Some("bad")),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_types_fall_through() {
        let event: ServerEvent =
            serde_json::from_value(json!({ "type": "session.created", "session": {} }))
                .expect("should parse");
        assert_eq!(event, ServerEvent::Other);
    }

    #[test]
    fn undecodable_backend_frames_are_protocol_errors() {
        for text in ["{{", r#"{"type":"response.audio.delta"}"#, r#"{"type":"error"}"#] {
            assert!(
                matches!(ServerEvent::parse(text), Err(BridgeError::Protocol(_))),
                "{text}"
            );
        }
        assert_eq!(
            ServerEvent::parse(r#"{"type":"response.done","response":{}}"#).expect("valid"),
            ServerEvent::ResponseDone
        );
    }
}

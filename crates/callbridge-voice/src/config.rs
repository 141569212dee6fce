use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

fn default_realtime_url() -> String {
    "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview".to_string()
}

fn default_voice() -> String {
    "shimmer".to_string()
}

fn default_audio_format() -> String {
    "g711_ulaw".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Server-side voice activity detection tuning sent in `session.update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    pub threshold: f64,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
        }
    }
}

/// Connection and session settings for the speech-AI realtime backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_realtime_url")]
    pub url: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_audio_format")]
    pub input_audio_format: String,
    #[serde(default = "default_audio_format")]
    pub output_audio_format: String,
    #[serde(default)]
    pub vad: VadConfig,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: default_realtime_url(),
            api_key: String::new(),
            voice: default_voice(),
            input_audio_format: default_audio_format(),
            output_audio_format: default_audio_format(),
            vad: VadConfig::default(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl fmt::Debug for RealtimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeConfig")
            .field("url", &self.url)
            .field("api_key", &"[REDACTED]")
            .field("voice", &self.voice)
            .field("input_audio_format", &self.input_audio_format)
            .field("output_audio_format", &self.output_audio_format)
            .field("vad", &self.vad)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

fn default_twilio_api_base() -> String {
    "https://api.twilio.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// Credentials and endpoints for the Twilio REST API.
#[derive(Clone, Serialize, Deserialize)]
pub struct TwilioConfig {
    #[serde(default = "default_twilio_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub account_sid: String,
    #[serde(default, skip_serializing)]
    pub auth_token: String,
    /// Sender number for outgoing SMS.
    #[serde(default)]
    pub sms_from: String,
    /// Externally reachable base URL of this server. Only scheme, host and
    /// port are used when building the hand-off TwiML URL.
    #[serde(default)]
    pub public_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            api_base: default_twilio_api_base(),
            account_sid: String::new(),
            auth_token: String::new(),
            sms_from: String::new(),
            public_base_url: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("api_base", &self.api_base)
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("sms_from", &self.sms_from)
            .field("public_base_url", &self.public_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Every timing and threshold constant the bridge uses.
///
/// The echo and barge-in thresholds depend on line noise and the echo
/// profile of the carrier, so each one is tunable on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeTuning {
    /// Inbound audio is dropped for this long after the AI finishes speaking.
    pub post_speech_suppression_ms: u64,
    /// While the AI speaks, inbound audio is dropped for this long after the
    /// most recent AI audio chunk.
    pub speaking_guard_ms: u64,
    /// RMS loudness (16-bit linear scale) an inbound frame needs to interrupt
    /// the AI.
    pub barge_in_threshold: f64,
    /// Forwarded frames quieter than this do not count as caller activity
    /// for the silence watchdog. Zero counts every forwarded frame.
    pub silence_activity_threshold: f64,
    pub watchdog_tick_ms: u64,
    pub nudge_cooldown_secs: u64,
    pub max_nudges: u32,
    /// Delay between the final `response.done` and hanging up after `end_call`.
    pub end_call_grace_ms: u64,
    /// Delay between the watchdog's farewell and hanging up.
    pub farewell_grace_ms: u64,
    /// Upper bound on waiting for in-flight tool calls during teardown.
    pub tool_drain_timeout_ms: u64,
    pub nudge_instructions: String,
    pub farewell_instructions: String,
    pub banned_fillers: Vec<String>,
    /// Language the AI speaks in.
    pub language: String,
}

impl Default for BridgeTuning {
    fn default() -> Self {
        Self {
            post_speech_suppression_ms: 300,
            speaking_guard_ms: 500,
            barge_in_threshold: 1500.0,
            silence_activity_threshold: 250.0,
            watchdog_tick_ms: 1000,
            nudge_cooldown_secs: 15,
            max_nudges: 2,
            end_call_grace_ms: 1500,
            farewell_grace_ms: 10_000,
            tool_drain_timeout_ms: 5000,
            nudge_instructions: "The caller has been silent for a while. Gently ask, in one short \
                                 sentence, whether they are still there and repeat the last question."
                .to_string(),
            farewell_instructions: "The caller has not responded. Say a brief, polite goodbye in one \
                                    sentence and do not ask anything further."
                .to_string(),
            banned_fillers: vec![
                "えーと".to_string(),
                "あのー".to_string(),
                "なるほど".to_string(),
                "承知しました".to_string(),
            ],
            language: "Japanese".to_string(),
        }
    }
}

impl BridgeTuning {
    pub fn post_speech_suppression(&self) -> Duration {
        Duration::from_millis(self.post_speech_suppression_ms)
    }

    pub fn speaking_guard(&self) -> Duration {
        Duration::from_millis(self.speaking_guard_ms)
    }

    /// Clamped to 1ms..=1min.
    pub fn watchdog_tick(&self) -> Duration {
        Duration::from_millis(self.watchdog_tick_ms.clamp(1, MAX_WATCHDOG_TICK_MS))
    }

    pub fn nudge_cooldown(&self) -> Duration {
        Duration::from_secs(self.nudge_cooldown_secs)
    }

    pub fn end_call_grace(&self) -> Duration {
        Duration::from_millis(self.end_call_grace_ms)
    }

    pub fn farewell_grace(&self) -> Duration {
        Duration::from_millis(self.farewell_grace_ms)
    }

    pub fn tool_drain_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_drain_timeout_ms)
    }
}

const MAX_WATCHDOG_TICK_MS: u64 = 60_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_bridge_section_keeps_other_defaults() {
        let tuning: BridgeTuning = toml::from_str(
            r#"
            barge_in_threshold = 2200.0
            max_nudges = 1
            "#,
        )
        .expect("should parse");
        assert_eq!(tuning.barge_in_threshold, 2200.0);
        assert_eq!(tuning.max_nudges, 1);
        assert_eq!(tuning.speaking_guard_ms, 500);
        assert_eq!(tuning.language, "Japanese");
    }

    #[test]
    fn watchdog_tick_is_clamped() {
        let zero = BridgeTuning {
            watchdog_tick_ms: 0,
            ..BridgeTuning::default()
        };
        assert_eq!(zero.watchdog_tick(), Duration::from_millis(1));

        let huge = BridgeTuning {
            watchdog_tick_ms: u64::MAX,
            ..BridgeTuning::default()
        };
        assert_eq!(huge.watchdog_tick(), Duration::from_secs(60));
        assert!(tokio::time::Instant::now()
            .checked_add(huge.watchdog_tick())
            .is_some());
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let realtime = RealtimeConfig {
            api_key: "sk-live-secret".to_string(),
            ..RealtimeConfig::default()
        };
        let twilio = TwilioConfig {
            auth_token: "tw-secret".to_string(),
            ..TwilioConfig::default()
        };

        let dbg = format!("{realtime:?} {twilio:?}");
        assert!(!dbg.contains("sk-live-secret"));
        assert!(!dbg.contains("tw-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn realtime_defaults_match_telephony_codec() {
        let cfg: RealtimeConfig = toml::from_str("").expect("empty table should parse");
        assert_eq!(cfg.input_audio_format, "g711_ulaw");
        assert_eq!(cfg.output_audio_format, "g711_ulaw");
        assert_eq!(cfg.voice, "shimmer");
        assert_eq!(cfg.vad, VadConfig::default());
    }
}

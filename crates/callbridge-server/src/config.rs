//! Server configuration loading from file and environment variables.

use callbridge_voice::{BridgeTuning, RealtimeConfig, TwilioConfig};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Speech-AI realtime backend.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Twilio REST credentials and the public URL Twilio calls back on.
    #[serde(default)]
    pub twilio: TwilioConfig,

    /// Bridge timing and threshold tuning.
    #[serde(default)]
    pub bridge: BridgeTuning,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "callbridge_voice=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    5050
}

fn default_db_path() -> String {
    "callbridge.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `CALLBRIDGE_HOST` overrides `server.host`
/// - `CALLBRIDGE_PORT` overrides `server.port`
/// - `CALLBRIDGE_DB_PATH` overrides `database.path`
/// - `CALLBRIDGE_LOG_LEVEL` overrides `logging.level`
/// - `CALLBRIDGE_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `OPENAI_API_KEY` overrides `realtime.api_key`
/// - `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`, `TWILIO_SMS_FROM` override
///   the matching `twilio` fields
/// - `PUBLIC_BASE_URL` overrides `twilio.public_base_url`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, env: impl Fn(&str) -> Option<String>) {
    if let Some(host) = env("CALLBRIDGE_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = env("CALLBRIDGE_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(db_path) = env("CALLBRIDGE_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = env("CALLBRIDGE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = env("CALLBRIDGE_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(key) = env("OPENAI_API_KEY") {
        config.realtime.api_key = key;
    }
    if let Some(sid) = env("TWILIO_ACCOUNT_SID") {
        config.twilio.account_sid = sid;
    }
    if let Some(token) = env("TWILIO_AUTH_TOKEN") {
        config.twilio.auth_token = token;
    }
    if let Some(from) = env("TWILIO_SMS_FROM") {
        config.twilio.sms_from = from;
    }
    if let Some(base) = env("PUBLIC_BASE_URL") {
        config.twilio.public_base_url = base;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config(Some("/nonexistent/callbridge.toml")).expect("defaults");
        assert_eq!(config.server.port, 5050);
        assert_eq!(config.database.path, "callbridge.db");
        assert_eq!(config.bridge.max_nudges, 2);
        assert_eq!(config.realtime.output_audio_format, "g711_ulaw");
    }

    #[test]
    fn file_sections_are_parsed() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"
            [server]
            host = "0.0.0.0"
            port = 8080

            [database]
            path = "/var/lib/callbridge/calls.db"

            [realtime]
            voice = "alloy"

            [realtime.vad]
            threshold = 0.7

            [twilio]
            public_base_url = "https://calls.example.test"

            [bridge]
            barge_in_threshold = 1800.0
            language = "English"
            "#
        )
        .expect("write");

        let config = load_config(file.path().to_str()).expect("should parse");
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path, "/var/lib/callbridge/calls.db");
        assert_eq!(config.database.pool_max_size, 8);
        assert_eq!(config.realtime.voice, "alloy");
        assert_eq!(config.realtime.vad.threshold, 0.7);
        assert_eq!(config.realtime.vad.silence_duration_ms, 500);
        assert_eq!(config.twilio.public_base_url, "https://calls.example.test");
        assert_eq!(config.twilio.api_base, "https://api.twilio.com");
        assert_eq!(config.bridge.barge_in_threshold, 1800.0);
        assert_eq!(config.bridge.language, "English");
        assert_eq!(config.bridge.speaking_guard_ms, 500);
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "[server\nport = ").expect("write");
        let err = load_config(file.path().to_str()).expect_err("must fail");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CALLBRIDGE_PORT", "9000"),
            ("CALLBRIDGE_HOST", "not-an-ip"),
            ("CALLBRIDGE_LOG_JSON", "1"),
            ("OPENAI_API_KEY", "sk-env"),
            ("TWILIO_ACCOUNT_SID", "AC1"),
            ("TWILIO_AUTH_TOKEN", "tok"),
            ("TWILIO_SMS_FROM", "+15550001"),
            ("PUBLIC_BASE_URL", "https://env.example.test"),
        ]);
        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, default_host(), "unparseable host is ignored");
        assert!(config.logging.json);
        assert_eq!(config.realtime.api_key, "sk-env");
        assert_eq!(config.twilio.account_sid, "AC1");
        assert_eq!(config.twilio.auth_token, "tok");
        assert_eq!(config.twilio.sms_from, "+15550001");
        assert_eq!(config.twilio.public_base_url, "https://env.example.test");
    }
}

//! TOML configuration with environment-variable overrides. `ADMIN_USERNAME`,
//! `ADMIN_PASSWORD` and `GOOGLE_MAPS_API_KEY` are intentionally absent from
//! [`Config`]: they belong to the admin UI's auth and the reverse-geocoding
//! service, external collaborators this crate never talks to.

use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_KAFKA_BROKER: &str = "localhost:9092";
const DEFAULT_PUBLISH_CHANNEL_CAPACITY: usize = 1024;

/// Per-protocol enable flag and listen port, after defaults have been
/// filled in. A TOML table for a protocol may set either field, neither,
/// or both; whatever is missing falls back to that protocol's documented
/// default independently (see [`RawProtocolSettings`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolSettings {
    pub enabled: bool,
    pub port: u16,
}

impl ProtocolSettings {
    fn from_raw(raw: Option<RawProtocolSettings>, default_port: u16) -> Self {
        let raw = raw.unwrap_or_default();
        Self { enabled: raw.enabled.unwrap_or(true), port: raw.port.unwrap_or(default_port) }
    }
}

/// The as-written TOML shape: every field optional, so a `[gt06]` table
/// that sets only `enabled` doesn't fail to parse just because it left
/// `port` out.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct RawProtocolSettings {
    enabled: Option<bool>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    et300: Option<RawProtocolSettings>,
    tk103: Option<RawProtocolSettings>,
    mt05: Option<RawProtocolSettings>,
    gt02: Option<RawProtocolSettings>,
    wetrack: Option<RawProtocolSettings>,
    gt06: Option<RawProtocolSettings>,
    kafka_broker: Option<String>,
    publish_channel_capacity: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub et300: ProtocolSettings,
    pub tk103: ProtocolSettings,
    pub mt05: ProtocolSettings,
    pub gt02: ProtocolSettings,
    pub gt06: ProtocolSettings,
    pub wetrack: ProtocolSettings,

    /// Kafka bootstrap broker, overridden by the `KAFKA_BROKER`
    /// environment variable at startup even when present in the file
    /// (see [`apply_env_overrides`]).
    pub kafka_broker: String,

    /// Bound capacity of the per-worker bus-writer channel.
    pub publish_channel_capacity: usize,
}

impl From<RawConfig> for Config {
    fn from(raw: RawConfig) -> Self {
        Self {
            et300: ProtocolSettings::from_raw(raw.et300, 5000),
            tk103: ProtocolSettings::from_raw(raw.tk103, 5001),
            mt05: ProtocolSettings::from_raw(raw.mt05, 5002),
            gt02: ProtocolSettings::from_raw(raw.gt02, 5003),
            wetrack: ProtocolSettings::from_raw(raw.wetrack, 5004),
            gt06: ProtocolSettings::from_raw(raw.gt06, 5005),
            kafka_broker: raw.kafka_broker.unwrap_or_else(|| DEFAULT_KAFKA_BROKER.to_string()),
            publish_channel_capacity: raw.publish_channel_capacity.unwrap_or(DEFAULT_PUBLISH_CHANNEL_CAPACITY),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

fn from_toml_str(text: &str) -> Result<Config, ConfigError> {
    let raw: RawConfig = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
    Ok(raw.into())
}

/// Load from `path`, falling back to [`Config::default`] (all six
/// protocols on their fixed ports) when the file does not exist — a
/// missing config file is not an error, it just means "use the documented
/// defaults".
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(text) => from_toml_str(&text),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Config::default()),
        Err(e) => Err(ConfigError::Read(e.to_string())),
    }
}

/// `KAFKA_BROKER` always wins over the file.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(broker) = std::env::var("KAFKA_BROKER") {
        cfg.kafka_broker = broker;
    }
}

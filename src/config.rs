//! Runtime configuration: presence timings, heartbeat cadence, and the card
//! scale, loaded from a JSON file with built-in defaults.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::model::VoteValue;
use crate::presence::PresenceConfig;

/// Default location on disk where the client looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "POINTDECK_CONFIG_PATH";

/// Immutable runtime configuration shared by every session a client opens.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// How often a connected client refreshes its own heartbeat.
    pub heartbeat_interval_ms: u64,
    /// Liveness classification knobs.
    pub presence: PresenceConfig,
    /// Card values a vote may carry, besides the two sentinel tokens.
    pub card_scale: Vec<String>,
}

impl SessionConfig {
    /// Load the configuration from disk, falling back to built-in defaults on
    /// a missing or malformed file.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded session config");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Whether a vote is acceptable: a sentinel token or a card on the scale.
    pub fn is_valid_vote(&self, vote: &VoteValue) -> bool {
        match vote {
            VoteValue::Card(card) => self.card_scale.iter().any(|entry| entry == card),
            _ => true,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 60_000,
            presence: PresenceConfig::default(),
            card_scale: default_card_scale(),
        }
    }
}

/// JSON representation of the configuration file.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawConfig {
    heartbeat_interval_ms: u64,
    presence: PresenceConfig,
    card_scale: Vec<String>,
}

impl Default for RawConfig {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            heartbeat_interval_ms: defaults.heartbeat_interval_ms,
            presence: defaults.presence,
            card_scale: defaults.card_scale,
        }
    }
}

impl From<RawConfig> for SessionConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            heartbeat_interval_ms: value.heartbeat_interval_ms,
            presence: value.presence,
            card_scale: value.card_scale,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Fibonacci-style scale shipped with the client.
fn default_card_scale() -> Vec<String> {
    ["0", "1", "2", "3", "5", "8", "13", "21", "34", "55", "89"]
        .into_iter()
        .map(String::from)
        .collect()
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level `carafe.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CarafeConfig {
    #[serde(default)]
    pub brew: BrewConfig,
    pub log_level: Option<String>,
}

/// The `[brew]` table.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BrewConfig {
    /// Explicit path to the `brew` binary; detected when absent.
    pub path: Option<String>,
    /// Prefix for streamed output lines.
    pub prefix: Option<String>,
    /// `KEY=VALUE` entries passed to brew, replacing the defaults.
    pub env: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
}

impl BrewConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// A problem found by [`CarafeConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigMessage {
    Warning(String),
    Error(String),
}

pub const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

impl CarafeConfig {
    pub fn validate(&self) -> Vec<ConfigMessage> {
        let mut messages = Vec::new();

        if let Some(level) = &self.log_level {
            if !LOG_LEVELS.contains(&level.as_str()) {
                messages.push(ConfigMessage::Warning(format!(
                    "unknown log_level '{}', expected one of: {}",
                    level,
                    LOG_LEVELS.join(", ")
                )));
            }
        }

        if let Some(path) = &self.brew.path {
            if path.trim().is_empty() {
                messages.push(ConfigMessage::Error("brew.path must not be empty".into()));
            }
        }

        if let Some(env) = &self.brew.env {
            for entry in env {
                match entry.split_once('=') {
                    Some((key, _)) if !key.is_empty() => {}
                    _ => messages.push(ConfigMessage::Error(format!(
                        "brew.env entry '{}' is not of the form KEY=VALUE",
                        entry
                    ))),
                }
            }
        }

        match self.brew.timeout_secs {
            Some(0) => messages.push(ConfigMessage::Error(
                "brew.timeout_secs must be greater than zero".into(),
            )),
            Some(secs) if secs > 3600 => messages.push(ConfigMessage::Warning(format!(
                "brew.timeout_secs is {}s; brew calls may hang for over an hour",
                secs
            ))),
            _ => {}
        }

        if let Some(prefix) = &self.brew.prefix {
            if prefix.contains('\n') || prefix.contains('\r') {
                messages.push(ConfigMessage::Error(
                    "brew.prefix must not contain line breaks".into(),
                ));
            }
        }

        messages
    }
}

//! Effective source configuration and fragment merging.
//!
//! The host hands over zero or more partial fragments. They are applied in
//! order on top of the defaults; a later fragment replaces a field only when
//! it carries a non-empty string for it (last non-empty value wins).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ConfigError, json_kind};

/// Default Keptn API endpoint.
pub const DEFAULT_URL: &str = "http://localhost:8080/api";

const KNOWN_KEYS: [&str; 4] = ["url", "token", "project", "service"];

/// Merged configuration for one stream session.
///
/// Empty strings mean "unset".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Keptn API endpoint.
    pub url: String,
    /// API token sent as bearer credential when non-empty.
    pub token: String,
    /// Project whose events are polled.
    pub project: String,
    /// Optional service filter.
    pub service: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            token: String::new(),
            project: String::new(),
            service: String::new(),
        }
    }
}

impl Config {
    /// Merges fragments over the defaults.
    pub fn merge(fragments: &[ConfigFragment]) -> Result<Self, ConfigError> {
        let mut out = Self::default();
        for (index, fragment) in fragments.iter().enumerate() {
            fragment.apply_to(index, &mut out)?;
        }
        Ok(out)
    }

    fn field_mut(&mut self, key: &str) -> Option<&mut String> {
        match key {
            "url" => Some(&mut self.url),
            "token" => Some(&mut self.token),
            "project" => Some(&mut self.project),
            "service" => Some(&mut self.service),
            _ => None,
        }
    }
}

/// One partial settings object supplied by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigFragment(pub serde_json::Value);

impl ConfigFragment {
    /// Wraps a raw JSON value.
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Parses a fragment from JSON text.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw).map(Self)
    }

    fn apply_to(&self, index: usize, config: &mut Config) -> Result<(), ConfigError> {
        let map = match &self.0 {
            serde_json::Value::Null => return Ok(()),
            serde_json::Value::Object(map) => map,
            other => {
                return Err(ConfigError::NotAnObject {
                    index,
                    found: json_kind(other),
                });
            }
        };

        for (key, value) in map {
            let Some(field) = KNOWN_KEYS.iter().copied().find(|k| *k == key.as_str()) else {
                debug!(
                    event = "config.unknown_key",
                    index,
                    key = %key,
                    "ignoring unknown config key"
                );
                continue;
            };
            let value = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::String(s) => s,
                other => {
                    return Err(ConfigError::InvalidField {
                        index,
                        field,
                        found: json_kind(other),
                    });
                }
            };
            if value.is_empty() {
                continue;
            }
            if let Some(slot) = config.field_mut(field) {
                *slot = value.clone();
            }
        }
        Ok(())
    }
}

impl From<serde_json::Value> for ConfigFragment {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

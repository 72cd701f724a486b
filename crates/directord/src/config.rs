//! Keyed configuration store.
//!
//! Values merge from three layers, weakest first: built-in defaults, a
//! YAML file, and environment variables carrying the `IPVS_` prefix
//! (`server/graceful-shutdown` ↔ `IPVS_SERVER_GRACEFUL_SHUTDOWN`).
//! Nested YAML maps flatten into `a/b` keys.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

/// Log verbosity.
pub const LOGGER_LEVEL: &str = "logger/level";
/// Whether to mount the Prometheus registry.
pub const METRICS_ENABLE: &str = "metrics/enable";
/// Whether to record span lifecycle events.
pub const TRACE_ENABLE: &str = "trace/enable";
/// Listen address, `tcp://host:port`.
pub const SERVER_ENDPOINT: &str = "server/endpoint";
/// Shutdown grace window.
pub const SERVER_GRACEFUL_SHUTDOWN: &str = "server/graceful-shutdown";

const KNOWN_KEYS: [&str; 5] = [
    LOGGER_LEVEL,
    METRICS_ENABLE,
    TRACE_ENABLE,
    SERVER_ENDPOINT,
    SERVER_GRACEFUL_SHUTDOWN,
];

const ENV_PREFIX: &str = "IPVS_";

/// Errors from loading or reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid YAML.
    #[error("parse config file: {0}")]
    Yaml(String),

    /// A requested key has no value in any layer.
    #[error("config key '{0}' is not set")]
    Missing(String),

    /// A value does not parse as the requested type.
    #[error("config key '{key}': '{value}' is not a valid {expected}")]
    Parse {
        /// The key looked up.
        key: String,
        /// The raw value found.
        value: String,
        /// What the getter expected.
        expected: &'static str,
    },
}

/// The merged configuration.
#[derive(Debug, Clone)]
pub struct Config {
    values: HashMap<String, String>,
}

impl Config {
    /// Load configuration: defaults, then `file` (if given), then the
    /// process environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let file_values = match file {
            Some(path) => parse_yaml(&std::fs::read_to_string(path)?)?,
            None => HashMap::new(),
        };
        Ok(Self::assemble(file_values, std::env::vars()))
    }

    fn assemble(
        file_values: HashMap<String, String>,
        env: impl Iterator<Item = (String, String)>,
    ) -> Self {
        let mut values = defaults();
        values.extend(file_values);
        for (name, value) in env {
            if let Some(key) = key_for_env(&name) {
                values.insert(key, value);
            }
        }
        Self { values }
    }

    /// String getter.
    pub fn string(&self, key: &str) -> Result<String, ConfigError> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    /// Boolean getter.
    pub fn bool(&self, key: &str) -> Result<bool, ConfigError> {
        let value = self.string(key)?;
        value.parse().map_err(|_| ConfigError::Parse {
            key: key.to_string(),
            value,
            expected: "boolean",
        })
    }

    /// Duration getter, humantime format (`10s`, `1m30s`).
    pub fn duration(&self, key: &str) -> Result<Duration, ConfigError> {
        let value = self.string(key)?;
        humantime::parse_duration(&value).map_err(|_| ConfigError::Parse {
            key: key.to_string(),
            value,
            expected: "duration",
        })
    }

    /// The `server/endpoint` value as a socket address.
    pub fn endpoint(&self) -> Result<SocketAddr, ConfigError> {
        let value = self.string(SERVER_ENDPOINT)?;
        let rest = value
            .strip_prefix("tcp://")
            .ok_or_else(|| ConfigError::Parse {
                key: SERVER_ENDPOINT.to_string(),
                value: value.clone(),
                expected: "tcp:// endpoint",
            })?;
        rest.parse().map_err(|_| ConfigError::Parse {
            key: SERVER_ENDPOINT.to_string(),
            value: value.clone(),
            expected: "tcp:// endpoint",
        })
    }
}

fn defaults() -> HashMap<String, String> {
    [
        (LOGGER_LEVEL, "INFO"),
        (METRICS_ENABLE, "false"),
        (TRACE_ENABLE, "false"),
        (SERVER_ENDPOINT, "tcp://127.0.0.1:9006"),
        (SERVER_GRACEFUL_SHUTDOWN, "10s"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn env_name(key: &str) -> String {
    format!("{ENV_PREFIX}{}", key.to_uppercase().replace(['/', '-'], "_"))
}

fn key_for_env(name: &str) -> Option<String> {
    KNOWN_KEYS
        .iter()
        .find(|key| env_name(key) == name)
        .map(|key| (*key).to_string())
}

fn parse_yaml(text: &str) -> Result<HashMap<String, String>, ConfigError> {
    let root: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| ConfigError::Yaml(e.to_string()))?;
    let mut values = HashMap::new();
    flatten("", &root, &mut values);
    Ok(values)
}

fn flatten(prefix: &str, value: &serde_yaml::Value, out: &mut HashMap<String, String>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, nested) in map {
                let Some(key) = key.as_str() else { continue };
                let path = if prefix.is_empty() {
                    key.to_string()
                } else {
                    format!("{prefix}/{key}")
                };
                flatten(&path, nested, out);
            }
        }
        serde_yaml::Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        serde_yaml::Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        serde_yaml::Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        _ => {}
    }
}

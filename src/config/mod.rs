use dashmap::DashMap;
use semver::Version;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration value: {key}")]
    Missing { key: String },

    #[error("Invalid configuration value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("Logging initialization failed: {0}")]
    Logging(String),
}

/// Configuration service
///
/// Thread-safe key/value store, cheap to clone.
#[derive(Clone, Debug, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the process environment.
    pub fn from_env() -> Self {
        Self::from_pairs(env::vars())
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let service = Self::default();
        for (key, value) in pairs {
            service.config.insert(key.into(), value.into());
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                    key: key.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    /// Accepts `1/0`, `true/false`, `yes/no`, `on/off`.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" | "" => Ok(Some(false)),
            other => Err(ConfigError::Invalid {
                key: key.to_string(),
                message: format!("expected a boolean, got '{other}'"),
            }),
        }
    }
}

/// Log output settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Common service options
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Service name, required
    pub name: String,
    /// Human-friendly title, defaults to the name
    pub title: String,
    /// Semantic version, `0.0.0` when unset
    pub version: Version,
    pub is_debug: bool,
    pub port: u16,
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_VERSION: &'static str = "0.0.0";

    /// Reads `<PREFIX>_NAME`, `_TITLE`, `_VERSION`, `_DEBUG`, `_PORT`,
    /// `_LOG_LEVEL` and `_LOG_JSON`.
    pub fn load(source: &ConfigService, prefix: &str) -> Result<Self, ConfigError> {
        let key = |suffix: &str| format!("{prefix}_{suffix}");

        let name_key = key("NAME");
        let name = source
            .get(&name_key)
            .filter(|name| !name.trim().is_empty())
            .ok_or(ConfigError::Missing { key: name_key })?;

        let version_key = key("VERSION");
        let raw_version = source.get_or(&version_key, Self::DEFAULT_VERSION);
        let version = Version::parse(raw_version.trim()).map_err(|e| ConfigError::Invalid {
            key: version_key,
            message: format!("'{raw_version}' is not a semantic version: {e}"),
        })?;

        let is_debug = source.get_bool(&key("DEBUG"))?.unwrap_or(false);
        let default_level = if is_debug { "debug" } else { "info" };

        Ok(Self {
            title: source.get(&key("TITLE")).unwrap_or_else(|| name.clone()),
            name,
            version,
            is_debug,
            port: source.get_parsed(&key("PORT"))?.unwrap_or(Self::DEFAULT_PORT),
            logging: LoggingConfig {
                level: source.get_or(&key("LOG_LEVEL"), default_level),
                json: source.get_bool(&key("LOG_JSON"))?.unwrap_or(false),
            },
        })
    }
}

//! Service settings, layered defaults < `pizzabot.toml` < `PIZZABOT_*` env < explicit overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

const CONFIG_CANDIDATES: [&str; 2] = ["pizzabot.toml", "config/pizzabot.toml"];
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub slack: SlackConfig,
    pub server: ServerConfig,
    pub intake: IntakeConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "sqlite://pizzabot.db?mode=rwc".to_string(), max_connections: 5, timeout_secs: 10 }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlackConfig {
    #[serde(deserialize_with = "secret_string")]
    pub signing_secret: SecretString,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self { signing_secret: SecretString::from(String::new()) }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "127.0.0.1".to_string(), port: 8443, graceful_shutdown_secs: 15 }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntakeConfig {
    pub freshness_window_secs: u64,
    pub store_timeout_secs: u64,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self { freshness_window_secs: 300, store_timeout_secs: 5 }
    }
}

impl IntakeConfig {
    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unsupported log format `{other}` (expected compact|pretty|json)")),
        }
    }
}

/// Values set programmatically, applied after every other layer.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub signing_secret: Option<String>,
    pub port: Option<u16>,
    pub freshness_window_secs: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("config file references unset environment variable `{0}`")]
    UnsetEnvReference(String),
    #[error("config file has an unterminated `${{...}}` reference")]
    UnterminatedEnvReference,
    #[error("invalid value for `{key}`: `{value}`")]
    InvalidEnvValue { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// One setting: its dotted TOML path, the env variables that can set it
/// (first set wins), and how to parse and display it.
pub struct ConfigField {
    pub path: &'static str,
    pub env_keys: &'static [&'static str],
    set: fn(&mut AppConfig, &str, &str) -> Result<(), ConfigError>,
    show: fn(&AppConfig) -> String,
}

impl ConfigField {
    /// The env variable currently providing this field, if any.
    pub fn env_source(&self) -> Option<&'static str> {
        self.env_keys.iter().copied().find(|key| read_env(key).is_some())
    }

    /// Display value; the signing secret renders as its length only.
    pub fn render(&self, config: &AppConfig) -> String {
        (self.show)(config)
    }

    fn apply_env(&self, config: &mut AppConfig) -> Result<(), ConfigError> {
        match self.env_keys.iter().find_map(|key| read_env(key).map(|value| (*key, value))) {
            Some((key, value)) => (self.set)(config, key, &value),
            None => Ok(()),
        }
    }
}

pub const FIELDS: &[ConfigField] = &[
    ConfigField {
        path: "database.url",
        env_keys: &["PIZZABOT_DATABASE_URL"],
        set: |config: &mut AppConfig, _key: &str, value: &str| -> Result<(), ConfigError> {
            config.database.url = value.to_string();
            Ok(())
        },
        show: |config: &AppConfig| config.database.url.clone(),
    },
    ConfigField {
        path: "database.max_connections",
        env_keys: &["PIZZABOT_DATABASE_MAX_CONNECTIONS"],
        set: |config: &mut AppConfig, key: &str, value: &str| -> Result<(), ConfigError> {
            config.database.max_connections = parse_env(key, value)?;
            Ok(())
        },
        show: |config: &AppConfig| config.database.max_connections.to_string(),
    },
    ConfigField {
        path: "database.timeout_secs",
        env_keys: &["PIZZABOT_DATABASE_TIMEOUT_SECS"],
        set: |config: &mut AppConfig, key: &str, value: &str| -> Result<(), ConfigError> {
            config.database.timeout_secs = parse_env(key, value)?;
            Ok(())
        },
        show: |config: &AppConfig| config.database.timeout_secs.to_string(),
    },
    ConfigField {
        path: "slack.signing_secret",
        env_keys: &["PIZZABOT_SLACK_SIGNING_SECRET"],
        set: |config: &mut AppConfig, _key: &str, value: &str| -> Result<(), ConfigError> {
            config.slack.signing_secret = SecretString::from(value.to_string());
            Ok(())
        },
        show: |config: &AppConfig| redact(&config.slack.signing_secret),
    },
    ConfigField {
        path: "server.bind_address",
        env_keys: &["PIZZABOT_SERVER_BIND_ADDRESS"],
        set: |config: &mut AppConfig, _key: &str, value: &str| -> Result<(), ConfigError> {
            config.server.bind_address = value.to_string();
            Ok(())
        },
        show: |config: &AppConfig| config.server.bind_address.clone(),
    },
    ConfigField {
        path: "server.port",
        env_keys: &["PIZZABOT_SERVER_PORT"],
        set: |config: &mut AppConfig, key: &str, value: &str| -> Result<(), ConfigError> {
            config.server.port = parse_env(key, value)?;
            Ok(())
        },
        show: |config: &AppConfig| config.server.port.to_string(),
    },
    ConfigField {
        path: "server.graceful_shutdown_secs",
        env_keys: &["PIZZABOT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        set: |config: &mut AppConfig, key: &str, value: &str| -> Result<(), ConfigError> {
            config.server.graceful_shutdown_secs = parse_env(key, value)?;
            Ok(())
        },
        show: |config: &AppConfig| config.server.graceful_shutdown_secs.to_string(),
    },
    ConfigField {
        path: "intake.freshness_window_secs",
        env_keys: &["PIZZABOT_INTAKE_FRESHNESS_WINDOW_SECS"],
        set: |config: &mut AppConfig, key: &str, value: &str| -> Result<(), ConfigError> {
            config.intake.freshness_window_secs = parse_env(key, value)?;
            Ok(())
        },
        show: |config: &AppConfig| config.intake.freshness_window_secs.to_string(),
    },
    ConfigField {
        path: "intake.store_timeout_secs",
        env_keys: &["PIZZABOT_INTAKE_STORE_TIMEOUT_SECS"],
        set: |config: &mut AppConfig, key: &str, value: &str| -> Result<(), ConfigError> {
            config.intake.store_timeout_secs = parse_env(key, value)?;
            Ok(())
        },
        show: |config: &AppConfig| config.intake.store_timeout_secs.to_string(),
    },
    ConfigField {
        path: "logging.level",
        env_keys: &["PIZZABOT_LOGGING_LEVEL", "PIZZABOT_LOG_LEVEL"],
        set: |config: &mut AppConfig, _key: &str, value: &str| -> Result<(), ConfigError> {
            config.logging.level = value.to_string();
            Ok(())
        },
        show: |config: &AppConfig| config.logging.level.clone(),
    },
    ConfigField {
        path: "logging.format",
        env_keys: &["PIZZABOT_LOGGING_FORMAT", "PIZZABOT_LOG_FORMAT"],
        set: |config: &mut AppConfig, key: &str, value: &str| -> Result<(), ConfigError> {
            config.logging.format = parse_env(key, value)?;
            Ok(())
        },
        show: |config: &AppConfig| config.logging.format.as_str().to_string(),
    },
];

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = match options.config_path.clone().or_else(discover_config_path) {
            Some(path) if path.exists() => Self::from_file(&path)?,
            missing if options.require_file => {
                let expected = missing.unwrap_or_else(|| PathBuf::from(CONFIG_CANDIDATES[0]));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            _ => Self::default(),
        };

        for field in FIELDS {
            field.apply_env(&mut config)?;
        }
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
        toml::from_str(&expand_env_refs(&raw)?)
            .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        let ConfigOverrides { database_url, log_level, signing_secret, port, freshness_window_secs } =
            overrides;

        if let Some(url) = database_url {
            self.database.url = url;
        }
        if let Some(level) = log_level {
            self.logging.level = level;
        }
        if let Some(secret) = signing_secret {
            self.slack.signing_secret = SecretString::from(secret);
        }
        self.server.port = port.unwrap_or(self.server.port);
        self.intake.freshness_window_secs =
            freshness_window_secs.unwrap_or(self.intake.freshness_window_secs);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.database.url.trim();
        require(
            "database.url",
            url.starts_with("sqlite:") || url == ":memory:",
            "must be a sqlite URL",
        )?;
        require(
            "database.max_connections",
            self.database.max_connections > 0,
            "must be greater than zero",
        )?;
        require(
            "database.timeout_secs",
            (1..=300).contains(&self.database.timeout_secs),
            "must be in range 1..=300",
        )?;
        require(
            "slack.signing_secret",
            !self.slack.signing_secret.expose_secret().trim().is_empty(),
            "is required (Slack app > Basic Information > Signing Secret)",
        )?;
        require("server.port", self.server.port > 0, "must be greater than zero")?;
        require(
            "server.graceful_shutdown_secs",
            self.server.graceful_shutdown_secs > 0,
            "must be greater than zero",
        )?;
        require(
            "intake.freshness_window_secs",
            (1..=3600).contains(&self.intake.freshness_window_secs),
            "must be in range 1..=3600",
        )?;
        require(
            "intake.store_timeout_secs",
            (1..=60).contains(&self.intake.store_timeout_secs),
            "must be in range 1..=60",
        )?;
        require(
            "logging.level",
            LOG_LEVELS.contains(&self.logging.level.trim().to_ascii_lowercase().as_str()),
            "must be one of trace|debug|info|warn|error",
        )
    }
}

/// The config file `AppConfig::load` reads when no path is given.
pub fn discover_config_path() -> Option<PathBuf> {
    CONFIG_CANDIDATES.iter().map(PathBuf::from).find(|path| path.exists())
}

fn require(path: &str, holds: bool, rule: &str) -> Result<(), ConfigError> {
    if holds {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{path} {rule}")))
    }
}

/// Replaces every `${NAME}` with the value of env var `NAME`.
fn expand_env_refs(raw: &str) -> Result<String, ConfigError> {
    let mut expanded = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some((before, after)) = rest.split_once("${") {
        let (name, tail) = after.split_once('}').ok_or(ConfigError::UnterminatedEnvReference)?;
        let value = env::var(name).map_err(|_| ConfigError::UnsetEnvReference(name.to_string()))?;
        expanded.push_str(before);
        expanded.push_str(&value);
        rest = tail;
    }

    expanded.push_str(rest);
    Ok(expanded)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn redact(secret: &SecretString) -> String {
    match secret.expose_secret().trim().chars().count() {
        0 => "<empty>".to_string(),
        length => format!("<redacted, {length} chars>"),
    }
}

fn secret_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

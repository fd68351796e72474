//! Configuration management for dataapi
//!
//! This module handles loading, parsing, and managing configuration from various sources:
//! - Configuration files (TOML format)
//! - Environment variables
//! - Command-line arguments
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

pub mod uri;

pub use uri::{ParsedUri, create_astra_uri, parse_uri};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Keyspace used when none is given.
pub const DEFAULT_KEYSPACE: &str = "default_keyspace";

/// Header carrying the application token.
pub const DEFAULT_AUTH_HEADER: &str = "Token";

/// Per-request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Connection configuration
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Display configuration
    #[serde(default)]
    pub display: DisplayConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Service origin, e.g. `https://db.example.com`
    #[serde(default)]
    pub base_url: String,

    /// Path between the origin and the keyspace, e.g. `api/json/v1`
    #[serde(default)]
    pub base_api_path: Option<String>,

    /// Default keyspace
    #[serde(default = "default_keyspace")]
    pub keyspace: String,

    /// Application token
    #[serde(default)]
    pub token: String,

    /// Name of the header carrying the token
    #[serde(default = "default_auth_header")]
    pub auth_header: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Use one multiplexed HTTP/2 session instead of an HTTP/1.1 pool
    #[serde(default = "default_use_http2")]
    pub use_http2: bool,

    /// Maximum idle pooled connections per host (HTTP/1.1 only)
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,

    /// Idle connection timeout in seconds
    #[serde(default = "default_pool_idle_timeout_secs")]
    pub pool_idle_timeout_secs: u64,

    /// Warn when a command option is dropped before sending
    #[serde(default)]
    pub log_skipped_options: bool,
}

/// Display and output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Multi-line JSON output
    #[serde(default)]
    pub pretty: bool,

    /// Enable colored output
    #[serde(default = "default_color_output")]
    pub color_output: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, wire)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
///
/// `Wire` is `Debug` plus full request and response payloads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Wire,
}

// Default value functions
fn default_keyspace() -> String {
    DEFAULT_KEYSPACE.to_string()
}

fn default_auth_header() -> String {
    DEFAULT_AUTH_HEADER.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_use_http2() -> bool {
    true
}

fn default_pool_max_idle_per_host() -> usize {
    10
}

fn default_pool_idle_timeout_secs() -> u64 {
    90
}

fn default_color_output() -> bool {
    true
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    false
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            base_api_path: None,
            keyspace: default_keyspace(),
            token: String::new(),
            auth_header: default_auth_header(),
            timeout_ms: default_timeout_ms(),
            use_http2: default_use_http2(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
            pool_idle_timeout_secs: default_pool_idle_timeout_secs(),
            log_skipped_options: false,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            pretty: false,
            color_output: default_color_output(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| ConfigError::InvalidFormat(format!("{}: {}", path.display(), e)).into())
    }

    /// Load configuration from an explicit file, or from the default location
    ///
    /// A missing default file is not an error; a missing explicit file is.
    ///
    /// # Arguments
    /// * `path` - Explicit config file, if any
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables are prefixed with DATAAPI_
    /// Example: DATAAPI_TIMEOUT_MS=60000
    ///
    /// # Returns
    /// * `Result<Config>` - Configuration from environment or default
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build a configuration from a variable lookup.
    ///
    /// `DATAAPI_URI` is parsed first; the individual variables override it.
    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(raw) = lookup("DATAAPI_URI") {
            config.apply_uri(parse_uri(&raw)?);
        }

        let conn = &mut config.connection;
        if let Some(token) = lookup("DATAAPI_TOKEN") {
            conn.token = token;
        }
        if let Some(keyspace) = lookup("DATAAPI_KEYSPACE") {
            conn.keyspace = keyspace;
        }
        if let Some(header) = lookup("DATAAPI_AUTH_HEADER") {
            conn.auth_header = header;
        }
        if let Some(raw) = lookup("DATAAPI_TIMEOUT_MS") {
            conn.timeout_ms = parse_env_value("DATAAPI_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("DATAAPI_HTTP2") {
            conn.use_http2 = parse_env_value("DATAAPI_HTTP2", &raw)?;
        }
        if let Some(raw) = lookup("DATAAPI_LOG_LEVEL") {
            config.logging.level = raw.parse()?;
        }

        Ok(config)
    }

    /// Take endpoint, keyspace and, when present, token and log level from
    /// a parsed URI
    pub fn apply_uri(&mut self, parsed: ParsedUri) {
        let conn = &mut self.connection;
        conn.base_url = parsed.base_url;
        conn.base_api_path = parsed.base_api_path;
        conn.keyspace = parsed.keyspace;
        if let Some(token) = parsed.token {
            conn.token = token;
        }
        if let Some(level) = parsed.log_level {
            self.logging.level = level;
        }
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".dataapi")
            .join("config.toml")
    }

    /// Merge this configuration with another, giving priority to the other
    ///
    /// A field of `other` wins when it differs from its default value.
    ///
    /// # Arguments
    /// * `other` - Configuration to merge with (takes precedence)
    ///
    /// # Returns
    /// * `Config` - Merged configuration
    pub fn merge(&self, other: &Config) -> Config {
        fn pick<T: Clone + PartialEq>(base: &T, over: &T, default: &T) -> T {
            if over != default {
                over.clone()
            } else {
                base.clone()
            }
        }

        let d = Config::default();
        let (a, b, dc) = (&self.connection, &other.connection, &d.connection);

        Config {
            connection: ConnectionConfig {
                base_url: pick(&a.base_url, &b.base_url, &dc.base_url),
                base_api_path: pick(&a.base_api_path, &b.base_api_path, &dc.base_api_path),
                keyspace: pick(&a.keyspace, &b.keyspace, &dc.keyspace),
                token: pick(&a.token, &b.token, &dc.token),
                auth_header: pick(&a.auth_header, &b.auth_header, &dc.auth_header),
                timeout_ms: pick(&a.timeout_ms, &b.timeout_ms, &dc.timeout_ms),
                use_http2: pick(&a.use_http2, &b.use_http2, &dc.use_http2),
                pool_max_idle_per_host: pick(
                    &a.pool_max_idle_per_host,
                    &b.pool_max_idle_per_host,
                    &dc.pool_max_idle_per_host,
                ),
                pool_idle_timeout_secs: pick(
                    &a.pool_idle_timeout_secs,
                    &b.pool_idle_timeout_secs,
                    &dc.pool_idle_timeout_secs,
                ),
                log_skipped_options: pick(
                    &a.log_skipped_options,
                    &b.log_skipped_options,
                    &dc.log_skipped_options,
                ),
            },
            display: DisplayConfig {
                pretty: pick(&self.display.pretty, &other.display.pretty, &d.display.pretty),
                color_output: pick(
                    &self.display.color_output,
                    &other.display.color_output,
                    &d.display.color_output,
                ),
            },
            logging: LoggingConfig {
                level: pick(&self.logging.level, &other.logging.level, &d.logging.level),
                timestamps: pick(
                    &self.logging.timestamps,
                    &other.logging.timestamps,
                    &d.logging.timestamps,
                ),
            },
        }
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        self.connection.validate()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        self.connection.request_timeout()
    }

    /// Serialize to TOML, as shown by `dataapi config --show`
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }
}

impl ConnectionConfig {
    /// Check that the connection settings can reach a service
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(ConfigError::MissingField("connection.base_url".to_string()).into());
        }
        url::Url::parse(&self.base_url).map_err(|_| ConfigError::InvalidValue {
            field: "connection.base_url".to_string(),
            value: self.base_url.clone(),
        })?;
        if self.token.is_empty() {
            return Err(ConfigError::MissingField("connection.token".to_string()).into());
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "connection.timeout_ms".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        if self.keyspace.is_empty() {
            return Err(ConfigError::MissingField("connection.keyspace".to_string()).into());
        }
        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_secs)
    }
}

impl LogLevel {
    /// Name as accepted in config files and URIs
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Wire => "wire",
        }
    }

    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug | LogLevel::Wire => tracing::Level::DEBUG,
        }
    }

    /// Filter directives for `tracing_subscriber::EnvFilter`
    ///
    /// Payload logging lives under its own target so that `debug` stays quiet.
    pub fn filter_directives(&self) -> String {
        let level = self.to_tracing_level().to_string().to_lowercase();
        match self {
            LogLevel::Wire => format!("dataapi={level},{}=trace", crate::connection::WIRE_TARGET),
            _ => format!("dataapi={level}"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "wire" | "http" | "trace" => Ok(LogLevel::Wire),
            other => Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

fn parse_env_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        ConfigError::InvalidValue {
            field: key.to_string(),
            value: raw.to_string(),
        }
        .into()
    })
}

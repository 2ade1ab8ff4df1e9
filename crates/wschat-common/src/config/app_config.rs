//! Application configuration structs
//!
//! Loads configuration from environment variables and an optional `.env` file.

use std::env;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: GatewayConfig,
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
    pub log_format: LogFormat,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            env: Environment::default(),
            log_format: LogFormat::default(),
        }
    }
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Chat gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Largest frame payload accepted from clients or broadcast to them
    pub max_frame_bytes: usize,
    /// Largest handshake request buffered before it is discarded
    pub max_handshake_bytes: usize,
    /// Frames queued per connection before broadcasts to it are skipped
    pub outbound_buffer: usize,
}

impl GatewayConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_frame_bytes: default_max_frame_bytes(),
            max_handshake_bytes: default_max_handshake_bytes(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "wschat".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4141
}

fn default_max_frame_bytes() -> usize {
    1024 * 1024 // 1 MiB
}

fn default_max_handshake_bytes() -> usize {
    8 * 1024
}

fn default_outbound_buffer() -> usize {
    256
}

/// Parse an optional variable, falling back to `default` when it is unset
fn parse_or<T, F>(
    lookup: &F,
    name: &'static str,
    default: impl FnOnce() -> T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        None => Ok(default()),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable is set to a value that does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: parse_or(&lookup, "APP_ENV", Environment::default)?,
                log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::default)?,
            },
            gateway: GatewayConfig {
                host: lookup("GATEWAY_HOST").unwrap_or_else(default_host),
                port: parse_or(&lookup, "GATEWAY_PORT", default_port)?,
                max_frame_bytes: parse_or(
                    &lookup,
                    "GATEWAY_MAX_FRAME_BYTES",
                    default_max_frame_bytes,
                )?,
                max_handshake_bytes: parse_or(
                    &lookup,
                    "GATEWAY_MAX_HANDSHAKE_BYTES",
                    default_max_handshake_bytes,
                )?,
                outbound_buffer: parse_or(
                    &lookup,
                    "GATEWAY_OUTBOUND_BUFFER",
                    default_outbound_buffer,
                )?,
            },
        };

        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.gateway.outbound_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_OUTBOUND_BUFFER",
                "0".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

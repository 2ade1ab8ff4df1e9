//! Tracing and logging setup
//!
//! One subscriber per process: an `EnvFilter` (from `RUST_LOG`, else the configured
//! directives) in front of either a pretty or a JSON formatter.

use crate::config::{AppSettings, LogFormat};
use tracing::Subscriber;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Directives for a development build: per-connection detail from the server crates
const DEVELOPMENT_DIRECTIVES: &str = "info,wschat_gateway=debug,wschat_core=debug";

/// Directives for deployed servers
const PRODUCTION_DIRECTIVES: &str = "info";

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Filter directives used when `RUST_LOG` is not set
    pub directives: String,
    /// Emit one JSON object per event instead of human-readable lines
    pub json: bool,
    /// Report span open/close
    pub span_events: bool,
    /// Include file and line numbers
    pub file_line: bool,
    /// Include thread names
    pub thread_names: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            directives: PRODUCTION_DIRECTIVES.to_string(),
            json: false,
            span_events: false,
            file_line: false,
            thread_names: false,
        }
    }
}

impl TracingConfig {
    /// Verbose, human-readable output
    #[must_use]
    pub fn development() -> Self {
        Self {
            directives: DEVELOPMENT_DIRECTIVES.to_string(),
            json: false,
            span_events: true,
            file_line: true,
            thread_names: true,
        }
    }

    /// Info-level JSON output
    #[must_use]
    pub fn production() -> Self {
        Self {
            directives: PRODUCTION_DIRECTIVES.to_string(),
            json: true,
            ..Self::default()
        }
    }

    /// Pick a preset from the application settings
    ///
    /// `LOG_FORMAT` wins over the preset's output format.
    #[must_use]
    pub fn from_settings(settings: &AppSettings) -> Self {
        let preset = if settings.env.is_development() {
            Self::development()
        } else {
            Self::production()
        };

        Self {
            json: settings.log_format == LogFormat::Json,
            ..preset
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.directives))
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Try to initialize tracing with the default configuration
pub fn try_init_tracing() -> Result<(), TracingError> {
    try_init_tracing_with_config(TracingConfig::default())
}

/// Try to initialize tracing with a custom configuration
///
/// Fails if this process already installed a global subscriber.
pub fn try_init_tracing_with_config(config: TracingConfig) -> Result<(), TracingError> {
    build_subscriber(&config)
        .try_init()
        .map_err(|_| TracingError::AlreadyInitialized)?;

    tracing::debug!(
        directives = %config.directives,
        json = config.json,
        "Tracing initialized"
    );
    Ok(())
}

/// Assemble the filter and formatter without installing them
fn build_subscriber(config: &TracingConfig) -> impl Subscriber + Send + Sync + 'static {
    // Exactly one of the two layers is present
    let json_layer = config.json.then(|| {
        fmt::layer()
            .json()
            .with_file(config.file_line)
            .with_line_number(config.file_line)
            .with_thread_names(config.thread_names)
            .with_span_events(config.span_events())
    });
    let pretty_layer = (!config.json).then(|| {
        fmt::layer()
            .with_file(config.file_line)
            .with_line_number(config.file_line)
            .with_thread_names(config.thread_names)
            .with_span_events(config.span_events())
    });

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(json_layer)
        .with(pretty_layer)
}

/// Tracing initialization errors
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,
}

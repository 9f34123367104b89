//! Tracing and logging setup
//!
//! One global `tracing` subscriber per process. `RUST_LOG` overrides the
//! configured directives when set.

use crate::config::Environment;
use tracing_subscriber::{
    filter::ParseError,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Filter directives used when `RUST_LOG` is unset
const DEVELOPMENT_DIRECTIVES: &str =
    "info,relay_gateway=debug,relay_channel=debug,tower_http=debug";
const PRODUCTION_DIRECTIVES: &str = "info,tower_http=warn";

/// Subscriber options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub directives: String,
    /// Emit one JSON object per event
    pub json: bool,
    /// Log span open/close, useful for following a connection's tasks
    pub span_events: bool,
    /// Include source file and line
    pub source_location: bool,
}

impl TracingConfig {
    /// Pick the subscriber options for a deployment environment
    ///
    /// Development gets human-readable output; staging and production emit
    /// JSON for log shipping.
    #[must_use]
    pub fn for_environment(env: Environment) -> Self {
        match env {
            Environment::Development => Self {
                directives: DEVELOPMENT_DIRECTIVES.to_string(),
                json: false,
                span_events: true,
                source_location: true,
            },
            Environment::Staging | Environment::Production => Self {
                directives: PRODUCTION_DIRECTIVES.to_string(),
                json: true,
                span_events: false,
                source_location: false,
            },
        }
    }

    /// Replace the filter directives
    #[must_use]
    pub fn with_directives(mut self, directives: impl Into<String>) -> Self {
        self.directives = directives.into();
        self
    }

    fn filter(&self) -> Result<EnvFilter, ParseError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.directives),
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::for_environment(Environment::Development)
    }
}

/// Install the global subscriber
///
/// # Errors
/// Fails if the directives do not parse or a subscriber is already installed.
pub fn init_tracing(config: &TracingConfig) -> Result<(), TracingError> {
    let filter = config.filter()?;

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = fmt::layer()
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_span_events(span_events);

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry.with(fmt_layer.json()).try_init()
    } else {
        registry.with(fmt_layer).try_init()
    };

    installed.map_err(|_| TracingError::AlreadyInitialized)
}

/// Tracing initialization errors
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(#[from] ParseError),

    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,
}

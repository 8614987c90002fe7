//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,bitgrail=debug";

/// Initialize structured logging.
///
/// Reads the filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
/// `RUST_ENV=production` selects JSON output, anything else selects
/// pretty output for development.
pub fn init_logging() -> TelemetryResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(env_filter)
}

/// Initialize structured logging with an explicit filter directive.
///
/// # Errors
/// Returns `TelemetryError::InvalidFilter` if the directive does not parse.
pub fn init_logging_with_filter(directive: &str) -> TelemetryResult<()> {
    let env_filter = EnvFilter::try_new(directive)
        .map_err(|e| TelemetryError::InvalidFilter(format!("{directive}: {e}")))?;
    install(env_filter)
}

fn is_production() -> bool {
    std::env::var("RUST_ENV")
        .map(|v| v == "production")
        .unwrap_or(false)
}

fn install(env_filter: EnvFilter) -> TelemetryResult<()> {
    let result = if is_production() {
        // JSON format for production
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()
    } else {
        // Pretty format for development
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(true))
            .try_init()
    };

    result.map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))
}

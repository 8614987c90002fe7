//! Structured logging for the BitGrail API client.
//!
//! The client library itself only emits `tracing` events; binaries and
//! demos call [`init_logging`] once at startup to install a subscriber.

pub mod error;
pub mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, init_logging_with_filter, DEFAULT_FILTER};

//! Observability infrastructure for tessera.
//!
//! Structured logging with consistent spans. This module provides
//! initialization helpers and span constructors used by the orchestrator
//! and the binary.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `tessera_flow=debug`)
///
/// # Example
///
/// ```rust
/// use tessera_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for one map build with standard fields.
///
/// # Example
///
/// ```rust
/// use tessera_core::observability::build_span;
///
/// let span = build_span(1, "incremental", 1000, 1500);
/// let _guard = span.enter();
/// // ... run the build
/// ```
#[must_use]
pub fn build_span(revision: u64, mode: &str, start: u64, end: u64) -> Span {
    tracing::info_span!(
        "map_build",
        revision = revision,
        mode = mode,
        range_start = start,
        range_end = end,
    )
}

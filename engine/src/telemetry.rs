//! Telemetry and Observability
//!
//! Sets up `tracing-subscriber` for the runtime's structured logs. The loop,
//! registry and memory stores log through `tracing` macros; this module only
//! decides where those records go.
//!
//! Filter priority: `RUST_LOG` env var > configured `log_level` > "info".

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::RuntimeConfig;

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output
    Pretty,
    /// One JSON object per record, with the current span attached
    Json,
}

impl Default for LogFormat {
    /// Pretty in debug builds, JSON in release builds
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

fn env_filter(log_level: &str) -> EnvFilter {
    let default_filter = format!("{},strider_engine={}", log_level, log_level);
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install the global subscriber.
///
/// Later calls are ignored once a subscriber is installed.
pub fn init_telemetry_with(log_level: &str, format: LogFormat) {
    let registry = tracing_subscriber::registry().with(env_filter(log_level));

    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_target(false))
            .try_init()
            .ok(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
            .ok(),
    };
}

/// Install the global subscriber with the build's default format.
pub fn init_telemetry_with_level(log_level: &str) {
    init_telemetry_with(log_level, LogFormat::default());
}

/// Install the global subscriber from a loaded configuration.
pub fn init_telemetry_from_config(config: &RuntimeConfig) {
    init_telemetry_with_level(&config.log_level);
}

/// Install a subscriber that writes through the test harness's capture.
pub fn init_test_telemetry() {
    tracing_subscriber::registry()
        .with(env_filter("debug"))
        .with(fmt::layer().with_test_writer())
        .try_init()
        .ok();
}

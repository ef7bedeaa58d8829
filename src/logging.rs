//! Tracing subscriber setup for the CLI
//!
//! The library only emits events; installing a subscriber is left to the
//! binary.

use crate::cli::Verbosity;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the log filter
pub const LOG_ENV: &str = "XH_LOG";

/// Pick the filter directive
///
/// `XH_LOG` wins, then the command-line verbosity, then the configured
/// level, then `warn`.
pub fn filter_directive(
    env_value: Option<&str>,
    verbosity: Verbosity,
    config_log: Option<&str>,
) -> String {
    if let Some(value) = env_value.filter(|v| !v.trim().is_empty()) {
        return value.to_string();
    }
    match verbosity {
        Verbosity::Silent => "off".to_string(),
        Verbosity::Quiet => "error".to_string(),
        Verbosity::Verbose => "debug".to_string(),
        Verbosity::Normal => config_log.unwrap_or("warn").to_string(),
    }
}

/// Install a stderr subscriber; a second call is a no-op
pub fn init(verbosity: Verbosity, config_log: Option<&str>) {
    let env_value = std::env::var(LOG_ENV).ok();
    let directive = filter_directive(env_value.as_deref(), verbosity, config_log);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

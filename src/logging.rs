//! Process-wide tracing subscriber.
//!
//! `RUST_LOG` picks the filter (default `info`). `PAYNODE_LOG_JSON=1`
//! switches from pretty to JSON lines. Output goes to stderr so CLI
//! commands keep stdout for their JSON results.

use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_JSON_VAR: &str = "PAYNODE_LOG_JSON";
const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn from_flag(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("1") | Some("true") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }

    pub fn from_env() -> Self {
        Self::from_flag(std::env::var(LOG_JSON_VAR).ok().as_deref())
    }
}

/// Installs the subscriber once; later calls are no-ops.
pub fn init_logging() {
    init_logging_with(LogFormat::from_env());
}

pub fn init_logging_with(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}

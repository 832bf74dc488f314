use crate::config::TelemetryConfig;
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Crates whose events follow `APP_LOG_LEVEL` when it names a bare level.
const SERVICE_TARGETS: [&str; 2] = ["retrofund", "retrofund_api"];
const BARE_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("APP_LOG_LEVEL {value:?} is not a valid tracing filter")]
    Filter {
        value: String,
        #[source]
        source: ParseError,
    },
    #[error("tracing subscriber already installed: {0}")]
    Subscriber(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A bare level like `debug` applies to the service crates only; dependencies stay at `warn`.
/// Directive lists such as `info,tower=trace` are used as written.
pub(crate) fn filter_directives(log_level: &str) -> String {
    let level = log_level.trim().to_ascii_lowercase();
    if !BARE_LEVELS.contains(&level.as_str()) {
        return log_level.trim().to_string();
    }

    std::iter::once("warn".to_string())
        .chain(SERVICE_TARGETS.iter().map(|target| format!("{target}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

fn configured_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(filter_directives(&config.log_level)).map_err(|source| {
        TelemetryError::Filter {
            value: config.log_level.clone(),
            source,
        }
    })
}

/// Installs the global fmt subscriber. `RUST_LOG` wins over `APP_LOG_LEVEL`.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    tracing_subscriber::fmt()
        .with_env_filter(configured_filter(config)?)
        .with_target(true)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

use std::env;
use std::net::{AddrParseError, IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Deployment stage. Production disables the development signature scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnvironment {
    #[default]
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub snapshots: SnapshotConfig,
}

impl AppConfig {
    /// Reads `APP_*` variables, honouring a `.env` file when one is present.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let setting = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port = match setting("APP_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort { value: raw })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            environment: setting("APP_ENV")
                .map(|value| AppEnvironment::parse(&value))
                .unwrap_or_default(),
            server: ServerConfig {
                host: setting("APP_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port,
            },
            telemetry: TelemetryConfig {
                log_level: setting("APP_LOG_LEVEL")
                    .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            },
            snapshots: SnapshotConfig {
                indexer_path: setting("APP_INDEXER_SNAPSHOT").map(PathBuf::from),
                metrics_path: setting("APP_METRICS_SNAPSHOT").map(PathBuf::from),
            },
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = if self.host.eq_ignore_ascii_case("localhost") {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.host
                .parse::<IpAddr>()
                .map_err(|source| ConfigError::InvalidHost {
                    host: self.host.clone(),
                    source,
                })?
        };
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Files standing in for the round indexer and the metrics provider.
#[derive(Debug, Clone, Default)]
pub struct SnapshotConfig {
    pub indexer_path: Option<PathBuf>,
    pub metrics_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("APP_PORT must be a valid u16, got {value:?}")]
    InvalidPort { value: String },
    #[error("APP_HOST {host:?} is neither localhost nor an IP address")]
    InvalidHost {
        host: String,
        #[source]
        source: AddrParseError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).expect("defaults load");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.snapshots.indexer_path.is_none());
        assert!(config.snapshots.metrics_path.is_none());
    }

    #[test]
    fn ci_maps_to_test_environment() {
        let config = config_from(&[("APP_ENV", " CI ")]).expect("config loads");
        assert_eq!(config.environment, AppEnvironment::Test);
        assert!(!config.environment.is_production());

        let config = config_from(&[("APP_ENV", "prod")]).expect("config loads");
        assert!(config.environment.is_production());
    }

    #[test]
    fn localhost_binds_loopback() {
        let config = config_from(&[("APP_HOST", "localhost"), ("APP_PORT", "8080")])
            .expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080));
    }

    #[test]
    fn hostnames_other_than_localhost_are_rejected() {
        let config = config_from(&[("APP_HOST", "funding.internal")]).expect("config loads");
        let err = config.server.socket_addr().expect_err("hostname rejected");
        assert!(matches!(err, ConfigError::InvalidHost { ref host, .. } if host == "funding.internal"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn non_numeric_port_is_rejected() {
        let err = config_from(&[("APP_PORT", "eighty")]).expect_err("port rejected");
        assert!(matches!(err, ConfigError::InvalidPort { ref value } if value == "eighty"));
    }

    #[test]
    fn blank_snapshot_paths_are_ignored() {
        let config = config_from(&[
            ("APP_INDEXER_SNAPSHOT", "  "),
            ("APP_METRICS_SNAPSHOT", "data/scores.csv"),
        ])
        .expect("config loads");
        assert!(config.snapshots.indexer_path.is_none());
        assert_eq!(
            config.snapshots.metrics_path,
            Some(PathBuf::from("data/scores.csv"))
        );
    }
}

use crate::config::ConfigError;
use crate::funding::router::status_for;
use crate::funding::{FundingError, SnapshotError};
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::error::Error as StdError;
use std::fmt;

/// Everything that can stop the service binary or the demo walkthrough.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Render(serde_json::Error),
    Server(axum::Error),
    Snapshot(SnapshotError),
    Funding(FundingError),
}

impl AppError {
    fn label(&self) -> &'static str {
        match self {
            AppError::Config(_) => "configuration",
            AppError::Telemetry(_) => "telemetry",
            AppError::Io(_) => "io",
            AppError::Render(_) => "render",
            AppError::Server(_) => "server",
            AppError::Snapshot(_) => "snapshot",
            AppError::Funding(_) => "funding",
        }
    }

    fn inner(&self) -> &(dyn StdError + 'static) {
        match self {
            AppError::Config(err) => err,
            AppError::Telemetry(err) => err,
            AppError::Io(err) => err,
            AppError::Render(err) => err,
            AppError::Server(err) => err,
            AppError::Snapshot(err) => err,
            AppError::Funding(err) => err,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Funding(err) => status_for(err.kind()),
            AppError::Snapshot(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.label(), self.inner())
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.inner())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

macro_rules! wrap_error {
    ($($source:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$source> for AppError {
                fn from(value: $source) -> Self {
                    Self::$variant(value)
                }
            }
        )+
    };
}

wrap_error! {
    ConfigError => Config,
    TelemetryError => Telemetry,
    std::io::Error => Io,
    serde_json::Error => Render,
    axum::Error => Server,
    SnapshotError => Snapshot,
    FundingError => Funding,
}

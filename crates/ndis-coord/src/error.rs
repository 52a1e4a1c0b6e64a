use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::coordination::{CoordinationError, RateImportError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Coordination(CoordinationError),
    RateImport(RateImportError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Coordination(err) => write!(f, "coordination error: {}", err),
            AppError::RateImport(err) => write!(f, "rate table error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Coordination(err) => Some(err),
            AppError::RateImport(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, action) = match &self {
            AppError::Coordination(err) => {
                let kind = err.kind();
                (
                    crate::workflows::coordination::router::status_for(kind),
                    kind.code(),
                    kind.action(),
                )
            }
            AppError::RateImport(_) => (StatusCode::BAD_REQUEST, "invalid_rate_table", "correct_input"),
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", "retry_later"),
        };

        let body = Json(json!({
            "error": self.to_string(),
            "kind": kind,
            "action": action,
        }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<CoordinationError> for AppError {
    fn from(value: CoordinationError) -> Self {
        Self::Coordination(value)
    }
}

impl From<RateImportError> for AppError {
    fn from(value: RateImportError) -> Self {
        Self::RateImport(value)
    }
}

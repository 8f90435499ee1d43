use crate::config::ConfigError;
use crate::kpi::{PersistenceError, RenderError, TrackerError};
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

/// Top-level error for the CLI, the console glue and HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Tracker(TrackerError),
    Persistence(PersistenceError),
    Render(RenderError),
    BadRequest(String),
}

impl AppError {
    /// HTTP status reported for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Tracker(TrackerError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Tracker(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            AppError::Persistence(PersistenceError::Tracker(err)) if err.is_client_error() => {
                StatusCode::BAD_REQUEST
            }
            AppError::Persistence(PersistenceError::EmptyPath) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Persistence(PersistenceError::Missing(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Tracker(err) => write!(f, "{}", err),
            AppError::Persistence(err) => write!(f, "storage error: {}", err),
            AppError::Render(err) => write!(f, "report error: {}", err),
            AppError::BadRequest(message) => write!(f, "{}", message),
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
            AppError::Tracker(err) => Some(err),
            AppError::Persistence(err) => Some(err),
            AppError::Render(err) => Some(err),
            AppError::BadRequest(_) => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
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
    axum::Error => Server,
    TrackerError => Tracker,
    PersistenceError => Persistence,
    RenderError => Render,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::{EntityRef, KpiId, Period};

    #[test]
    fn maps_tracker_errors_to_statuses() {
        let missing = AppError::from(TrackerError::NotFound(EntityRef::Kpi(KpiId(4))));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.to_string(), "KPI 4 not found");

        let period = Period::new(2025, 3).expect("valid period");
        let reversed = AppError::from(TrackerError::InvalidRange {
            start: period,
            end: Period::new(2025, 1).expect("valid period"),
        });
        assert_eq!(reversed.status(), StatusCode::BAD_REQUEST);

        let poisoned = AppError::from(TrackerError::LockPoisoned);
        assert_eq!(poisoned.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn invalid_workbook_data_is_a_client_error() {
        let invalid = AppError::from(PersistenceError::Tracker(TrackerError::DuplicateId {
            kind: "role",
            id: 1,
        }));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::from(PersistenceError::EmptyPath).status(),
            StatusCode::BAD_REQUEST
        );
    }
}

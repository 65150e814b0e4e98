use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Database(String),
    Extraction(String),
    Messaging(String),
    ConfigError(String),
    JsonError(serde_json::Error),
    ValidationError(String),
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::Extraction(msg) => write!(f, "Extraction error: {}", msg),
            AppError::Messaging(msg) => write!(f, "Messaging error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::JsonError(err) => write!(f, "JSON error: {}", err),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::JsonError(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<zapi::ZApiError> for AppError {
    fn from(err: zapi::ZApiError) -> Self {
        AppError::Messaging(err.to_string())
    }
}

impl From<ia_service::IaServiceError> for AppError {
    fn from(err: ia_service::IaServiceError) -> Self {
        AppError::Extraction(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Database(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Extraction(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Messaging(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::ConfigError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::JsonError(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = json!({
            "error": error_message,
            "status": status.as_u16()
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            AppError::Database("conexão recusada".into()).to_string(),
            "Database error: conexão recusada"
        );
        assert_eq!(
            AppError::ValidationError("phone".into()).to_string(),
            "Validation error: phone"
        );
    }

    #[test]
    fn test_status_codes() {
        let resp = AppError::ValidationError("x".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = AppError::Database("x".into()).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_from_zapi_error() {
        let err: AppError = zapi::ZApiError::ConfigError("sem token".into()).into();
        assert!(matches!(err, AppError::Messaging(_)));
    }
}

//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>` and use `?` on
//! anything convertible to `AppError`, so every failure renders the same
//! [`ErrorResponse`] body with the status from [`ErrorMetadata`].

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use convertease_core::{AppError, ErrorMetadata, LogLevel};
use convertease_infra::ErrorResponse;
use serde::de::DeserializeOwned;

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from convertease-core)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

/// Convert JSON body deserialization failures into a 400 with our ErrorResponse format.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        let body_text = rejection.body_text();
        let message = if body_text.contains("expected a formatted UUID") {
            "Invalid request body: upload_id must be a UUID string".to_string()
        } else {
            format!("Invalid request body: {}", body_text)
        };
        HttpAppError(AppError::InvalidInput(message))
    }
}

impl From<QueryRejection> for HttpAppError {
    fn from(rejection: QueryRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid query string: {}",
            rejection.body_text()
        )))
    }
}

/// JSON body extractor that returns our ErrorResponse format (400 + JSON) on deserialization failure.
/// Use this instead of `Json<T>` when you want a consistent API error shape for invalid bodies.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

/// Build the JSON body for `error`. Details are only exposed outside
/// production and never for sensitive errors.
pub fn error_body(error: &AppError, is_production: bool) -> ErrorResponse {
    let details = if is_production || error.is_sensitive() {
        None
    } else {
        Some(error.detailed_message())
    };

    ErrorResponse {
        error: error.client_message(),
        code: error.error_code().to_string(),
        kind: error.kind().to_string(),
        recoverable: error.is_recoverable(),
        suggested_action: error.suggested_action().map(String::from),
        details,
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        (status, Json(error_body(app_error, is_production_env()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_full_body() {
        let err = AppError::QueueFull {
            tier: "free".to_string(),
            active: 3,
            limit: 3,
        };
        let body = serde_json::to_value(error_body(&err, false)).unwrap();
        assert_eq!(body["code"], "QUEUE_FULL");
        assert_eq!(body["kind"], "capacity");
        assert_eq!(body["recoverable"], true);
        assert!(body["details"].as_str().unwrap().contains("3"));
    }

    #[test]
    fn test_details_hidden_in_production() {
        let err = AppError::NotFound("job 42".to_string());
        let body = serde_json::to_value(error_body(&err, true)).unwrap();
        assert!(body.get("details").is_none());
        assert_eq!(body["kind"], "not_found");
    }

    #[test]
    fn test_internal_details_never_exposed() {
        let err = AppError::Internal("connection string leaked".to_string());
        let body = serde_json::to_value(error_body(&err, false)).unwrap();
        assert!(body.get("details").is_none());
        assert!(!body["error"].as_str().unwrap().contains("leaked"));
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::TooManyFiles { count: 2 }, StatusCode::BAD_REQUEST),
            (
                AppError::FileTooLarge {
                    size: 10,
                    limit: 5,
                    tier: "free".to_string(),
                },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (AppError::Unauthorized("no".to_string()), StatusCode::UNAUTHORIZED),
            (AppError::NotFound("x".to_string()), StatusCode::NOT_FOUND),
        ];
        for (err, expected) in cases {
            let response = HttpAppError(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}

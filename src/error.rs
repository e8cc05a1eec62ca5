//! Application error taxonomy.
//!
//! Every gate, store and handler in the crate reports failures through [`AppError`].
//! The variant decides the status code; the response body is always a JSON
//! envelope of the form `{"error": ...}`.

use std::collections::BTreeMap;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Result alias used across the crate.
pub type AppResult<T> = Result<T, AppError>;

/// Field name to message, as reported by failed validation.
pub type FieldErrors = BTreeMap<String, String>;

/// Errors that terminate a request.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("invalid or missing authentication token")]
    InvalidAuthToken,

    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,

    #[error("your user account must be activated to access this resource")]
    AccountNotActivated,

    #[error("your user account doesn't have the necessary permissions to access this resource")]
    PermissionDenied,

    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,

    #[error("the requested resource could not be found")]
    RecordNotFound,

    #[error("a user with this email address already exists")]
    DuplicateEmail,

    #[error("{0}")]
    BadRequest(String),

    #[error("failed validation")]
    FailedValidation(FieldErrors),

    /// Carries the server-side context. Never shown to the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for [`AppError::Internal`].
    pub fn internal(context: impl Into<String>) -> Self {
        AppError::Internal(context.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::InvalidAuthToken | AppError::AuthenticationRequired => {
                StatusCode::UNAUTHORIZED
            }
            AppError::AccountNotActivated | AppError::PermissionDenied => StatusCode::FORBIDDEN,
            AppError::EditConflict => StatusCode::CONFLICT,
            AppError::RecordNotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateEmail | AppError::FailedValidation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The body sent to the client.
    fn client_message(&self) -> serde_json::Value {
        match self {
            AppError::Internal(_) => {
                json!("the server encountered a problem and could not process your request")
            }
            AppError::FailedValidation(errors) => json!(errors),
            AppError::DuplicateEmail => json!({ "email": self.to_string() }),
            other => json!(other.to_string()),
        }
    }

    fn log(&self) {
        match self {
            AppError::Internal(context) => {
                tracing::error!(error = %context, "Internal server error");
            }
            AppError::RateLimitExceeded => {
                tracing::debug!("Request rejected by rate limiter");
            }
            other => {
                tracing::debug!(error = %other, status = %other.status_code(), "Request rejected");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status_code();
        let mut response = (status, Json(json!({ "error": self.client_message() }))).into_response();

        if matches!(self, AppError::InvalidAuthToken) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_wire_status_codes() {
        assert_eq!(AppError::RateLimitExceeded.status_code(), 429);
        assert_eq!(AppError::InvalidAuthToken.status_code(), 401);
        assert_eq!(AppError::AuthenticationRequired.status_code(), 401);
        assert_eq!(AppError::AccountNotActivated.status_code(), 403);
        assert_eq!(AppError::PermissionDenied.status_code(), 403);
        assert_eq!(AppError::EditConflict.status_code(), 409);
        assert_eq!(AppError::RecordNotFound.status_code(), 404);
        assert_eq!(AppError::internal("boom").status_code(), 500);
        assert_eq!(AppError::BadRequest("bad".into()).status_code(), 400);
        assert_eq!(AppError::FailedValidation(FieldErrors::new()).status_code(), 422);
    }

    #[tokio::test]
    async fn internal_errors_do_not_leak_context() {
        let response = AppError::internal("connection refused by 10.0.0.7").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("10.0.0.7"));
        assert!(text.contains("the server encountered a problem"));
    }

    #[test]
    fn invalid_token_advertises_bearer_scheme() {
        let response = AppError::InvalidAuthToken.into_response();
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }
}

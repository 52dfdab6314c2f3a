//! Error taxonomy shared by every handler and its mapping onto HTTP.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Request, State,
    },
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::{db::StoreError, envelope::ApiResponse, state::AppState};

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub value: Value,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("User with this email already exists")]
    DuplicateEmail,

    #[error("Duplicate field value entered")]
    DuplicateKey,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is deactivated. Please contact support.")]
    AccountDeactivated,

    #[error("Access denied. No token provided or invalid format.")]
    NoToken,

    #[error("Token has expired. Please login again.")]
    TokenExpired,

    #[error("Invalid token format.")]
    TokenMalformed,

    #[error("Invalid token. User not found.")]
    UnknownTokenSubject,

    #[error("Admin access required")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    NotModifiable(String),

    #[error("Feedback has already been rated")]
    AlreadyRated,

    #[error("Too many requests from this IP, please try again later.")]
    RateLimited { retry_after_secs: u64 },

    #[error("Service temporarily unavailable, please retry")]
    ServiceUnavailable,

    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

/// Carried on 500 responses so the development-mode layer can surface it.
#[derive(Debug, Clone)]
pub struct InternalDetail(pub String);

impl AppError {
    pub fn validation(field: &str, message: &str, value: Value) -> Self {
        Self::Validation(vec![FieldError::new(field, message, value)])
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::DuplicateEmail
            | AppError::DuplicateKey
            | AppError::NotModifiable(_)
            | AppError::AlreadyRated => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials
            | AppError::AccountDeactivated
            | AppError::NoToken
            | AppError::TokenExpired
            | AppError::TokenMalformed
            | AppError::UnknownTokenSubject => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        match self {
            AppError::Validation(errors) => {
                (status, ApiResponse::failure(message, Some(errors))).into_response()
            }
            AppError::RateLimited { retry_after_secs } => {
                let mut res = (status, ApiResponse::failure(message, None)).into_response();
                if let Ok(v) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                    res.headers_mut().insert(header::RETRY_AFTER, v);
                }
                res
            }
            AppError::Internal(err) => {
                error!(error = ?err, "internal error");
                let mut res = (status, ApiResponse::failure(message, None)).into_response();
                res.extensions_mut().insert(InternalDetail(format!("{err:#}")));
                res
            }
            _ => (status, ApiResponse::failure(message, None)).into_response(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AppError::DuplicateEmail,
            StoreError::DuplicateKey(constraint) => {
                warn!(%constraint, "unique constraint violated");
                AppError::DuplicateKey
            }
            StoreError::PoolExhausted => {
                warn!("store pool exhausted");
                AppError::ServiceUnavailable
            }
            StoreError::Database(e) => AppError::internal(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(error = %rejection.body_text(), "rejected request body");
        AppError::validation("body", &rejection.body_text(), Value::Null)
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::validation("query", &rejection.body_text(), Value::Null)
    }
}

/// In development mode, appends the suppressed detail of a 500 as `error`.
pub async fn expose_internal_detail(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if !state.config.is_development() {
        return response;
    }
    let detail = response.extensions().get::<InternalDetail>().cloned();
    match detail {
        Some(InternalDetail(detail)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "message": "Internal server error",
                "error": detail,
            })),
        )
            .into_response(),
        None => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(res: Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn authentication_failures_share_one_status() {
        for err in [
            AppError::InvalidCredentials,
            AppError::AccountDeactivated,
            AppError::NoToken,
            AppError::TokenExpired,
            AppError::TokenMalformed,
            AppError::UnknownTokenSubject,
        ] {
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn lifecycle_violations_are_bad_requests() {
        assert_eq!(
            AppError::NotModifiable("nope".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::AlreadyRated.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::DuplicateEmail.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn internal_error_hides_detail() {
        let res = AppError::internal(anyhow::anyhow!("connection reset by peer")).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.extensions().get::<InternalDetail>().is_some());
        let body = body_json(res).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Internal server error");
        assert!(!body.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after() {
        let res = AppError::RateLimited { retry_after_secs: 42 }.into_response();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }

    #[tokio::test]
    async fn validation_error_lists_every_field() {
        let res = AppError::Validation(vec![
            FieldError::new("feedbackText", "Feedback text is required", Value::Null),
            FieldError::new("category", "Invalid category selected", Value::Null),
        ])
        .into_response();
        let body = body_json(res).await;
        assert_eq!(body["errors"].as_array().unwrap().len(), 2);
    }
}

//! HTTP error type for the counting API.
//!
//! Every failure leaves the server as `{"error": "<message>"}` with a status
//! matching its kind. Storage failures are logged with their cause and
//! answered with a generic message so no database detail reaches the client.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Postgres SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";
/// Postgres SQLSTATE for foreign key violations.
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing field, bad number, negative quantity (400)
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid credential (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (403)
    #[error("{0}")]
    Forbidden(String),

    /// Session, user, bin or request absent (404)
    #[error("{0}")]
    NotFound(String),

    /// Would violate a uniqueness rule, e.g. a second active session (409)
    #[error("{0}")]
    Conflict(String),

    /// Transition not allowed from the current state (409)
    #[error("{0}")]
    InvalidState(String),

    /// Anything unexpected (500)
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) | ApiError::InvalidState(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map a storage error, turning constraint violations into client errors.
    ///
    /// `conflict` is the message used for a unique violation.
    pub fn from_storage(err: anyhow::Error, conflict: &str) -> ApiError {
        let code = err
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .and_then(|db| db.code().map(|c| c.into_owned()));
        match code.as_deref() {
            Some(UNIQUE_VIOLATION) => ApiError::Conflict(conflict.to_string()),
            Some(FOREIGN_KEY_VIOLATION) => {
                ApiError::Validation("Referenced record does not exist".to_string())
            }
            _ => ApiError::Internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_maps_to_400_with_error_body() {
        let (status, body) = body_of(ApiError::Validation("binNo is required".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "binNo is required"}));
    }

    #[tokio::test]
    async fn internal_hides_cause() {
        let err = ApiError::Internal(anyhow::anyhow!("relation \"users\" does not exist"));
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Internal server error"}));
    }

    #[test]
    fn status_codes_follow_kind() {
        assert_eq!(ApiError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::InvalidState("x".into()).status(), StatusCode::CONFLICT);
    }

    #[test]
    fn non_database_storage_errors_stay_internal() {
        let err = ApiError::from_storage(anyhow::anyhow!("pool timed out"), "duplicate");
        assert!(matches!(err, ApiError::Internal(_)));
    }
}

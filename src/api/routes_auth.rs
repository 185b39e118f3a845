//! Auth API: login and current-user lookup.
//!
//! Workers log in with username, password and the code of an OTP request
//! their team leader approved. Other roles need only the password.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::middleware_auth::{issue_token, RequireAuth};
use super::AppState;
use crate::credentials::verify_password;
use crate::db::UserRow;
use crate::error::{ApiError, ApiResult};
use crate::hierarchy::Role;

const BAD_CREDENTIALS: &str = "Invalid username or password";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LoginRequest {
    username: String,
    password: String,
    #[serde(default)]
    otp_code: Option<String>,
}

/// Look up a user by name and check the password. Approval is not checked.
pub(super) async fn authenticate(
    state: &AppState,
    username: &str,
    password: &str,
) -> ApiResult<UserRow> {
    let user = state
        .db
        .get_user_by_username(username.trim())
        .await?
        .ok_or_else(|| ApiError::Unauthorized(BAD_CREDENTIALS.into()))?;
    let password = password.to_string();
    let stored = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(anyhow::Error::from)?;
    if !matches {
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS.into()));
    }
    Ok(user)
}

/// POST /api/auth/login
pub(super) async fn handler_login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let Json(req) = payload?;
    let user = authenticate(&state, &req.username, &req.password).await?;
    if !user.is_approved {
        return Err(ApiError::Forbidden("Account is awaiting approval".into()));
    }

    let mut otp_id = None;
    if user.role()? == Role::Worker {
        let code = req
            .otp_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("OTP code required".into()))?;
        let otp = state
            .db
            .consume_otp(user.id, code, Utc::now())
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired OTP code".into()))?;
        otp_id = Some(otp.id);
    }

    let (token, expires_at) = issue_token(&state.config, &user)?;
    state
        .audit(Some(user.id), "LOGIN", json!({ "otpId": otp_id }))
        .await;
    Ok(Json(json!({
        "token": token,
        "expiresAt": expires_at,
        "user": user,
    })))
}

/// GET /api/auth/me
pub(super) async fn handler_me(RequireAuth(auth_user): RequireAuth) -> Json<UserRow> {
    Json(auth_user.user)
}

//! OTP login approval API.
//!
//! A worker asks for a code with its credentials; the request is addressed
//! to its team leader, who approves or rejects it before it expires. The code
//! is only ever shown to the worker that asked for it.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::middleware_auth::{AuthUser, RequireAuth};
use super::routes_auth::authenticate;
use super::AppState;
use crate::credentials::generate_otp_code;
use crate::db::OtpRow;
use crate::error::{ApiError, ApiResult};
use crate::hierarchy::Role;

#[derive(Deserialize)]
pub(super) struct OtpRequest {
    username: String,
    password: String,
}

/// POST /api/otp/request
pub(super) async fn handler_otp_request(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<OtpRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let Json(req) = payload?;
    let worker = authenticate(&state, &req.username, &req.password).await?;
    if worker.role()? != Role::Worker {
        return Err(ApiError::Validation(
            "Only workers need OTP approval".into(),
        ));
    }
    if !worker.is_approved {
        return Err(ApiError::Forbidden("Account is awaiting approval".into()));
    }
    let team_leader_id = worker.team_leader_id.ok_or_else(|| {
        ApiError::Validation("Worker has no team leader to approve the request".into())
    })?;

    let code = generate_otp_code();
    let expires_at = Utc::now() + Duration::minutes(state.config.otp_ttl_minutes);
    let otp = state
        .db
        .create_otp(worker.id, team_leader_id, &code, expires_at)
        .await?;
    state
        .audit(
            Some(worker.id),
            "REQUEST_OTP",
            json!({ "otpId": otp.id, "teamLeaderId": team_leader_id }),
        )
        .await;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": otp.id,
            "code": code,
            "expiresAt": otp.expires_at,
        })),
    ))
}

/// GET /api/otp/pending: undecided, unexpired requests for the calling team leader.
pub(super) async fn handler_otp_pending(
    State(state): State<Arc<AppState>>,
    RequireAuth(actor): RequireAuth,
) -> ApiResult<Json<Vec<OtpRow>>> {
    if actor.role() != Role::TeamLeader {
        return Err(ApiError::Forbidden(
            "Only team leaders approve OTP requests".into(),
        ));
    }
    Ok(Json(
        state.db.list_pending_otps(actor.id(), Utc::now()).await?,
    ))
}

async fn decide(
    state: &AppState,
    actor: &AuthUser,
    id: i64,
    approved: bool,
) -> ApiResult<OtpRow> {
    let otp = state
        .db
        .get_otp(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("OTP request {} not found", id)))?;
    if otp.team_leader_id != actor.id() {
        return Err(ApiError::Forbidden(
            "OTP request is addressed to another team leader".into(),
        ));
    }
    let now = Utc::now();
    if !otp.is_pending() {
        return Err(ApiError::InvalidState(format!(
            "OTP request {} was already decided",
            id
        )));
    }
    if otp.is_expired(now) {
        return Err(ApiError::InvalidState(format!(
            "OTP request {} has expired",
            id
        )));
    }
    let decided = state
        .db
        .decide_otp(id, approved, now)
        .await?
        .ok_or_else(|| {
            ApiError::InvalidState(format!("OTP request {} is no longer pending", id))
        })?;

    let action = if approved { "APPROVE_OTP" } else { "REJECT_OTP" };
    state
        .audit(
            Some(actor.id()),
            action,
            json!({ "otpId": id, "workerId": decided.worker_id }),
        )
        .await;
    Ok(decided)
}

/// POST /api/otp/{id}/approve
pub(super) async fn handler_otp_approve(
    State(state): State<Arc<AppState>>,
    RequireAuth(actor): RequireAuth,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<OtpRow>> {
    let Path(id) = path?;
    Ok(Json(decide(&state, &actor, id, true).await?))
}

/// POST /api/otp/{id}/reject
pub(super) async fn handler_otp_reject(
    State(state): State<Arc<AppState>>,
    RequireAuth(actor): RequireAuth,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<OtpRow>> {
    let Path(id) = path?;
    Ok(Json(decide(&state, &actor, id, false).await?))
}

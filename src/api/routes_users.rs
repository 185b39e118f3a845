//! Accounts API: create within the hierarchy, list visible users, approval.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::middleware_auth::RequireAuth;
use super::AppState;
use crate::credentials::hash_password;
use crate::db::{NewUser, UserRow};
use crate::error::{ApiError, ApiResult};
use crate::hierarchy::{can_create, is_superior_of, resolve_links, Principal, Role};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateUserRequest {
    username: String,
    password: String,
    #[serde(default)]
    full_name: Option<String>,
    role: String,
    #[serde(default)]
    vendor_id: Option<Uuid>,
    #[serde(default)]
    team_leader_id: Option<Uuid>,
}

async fn parent(state: &AppState, id: Option<Uuid>, field: &str) -> ApiResult<Option<Principal>> {
    let Some(id) = id else {
        return Ok(None);
    };
    let user = state
        .db
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::Validation(format!("{} does not reference a user", field)))?;
    Ok(Some(user.principal()?))
}

/// POST /api/users
///
/// Admins create any role; vendors create team leaders and workers under
/// themselves. Accounts created by an admin start approved, others wait for
/// a superior.
pub(super) async fn handler_user_create(
    State(state): State<Arc<AppState>>,
    RequireAuth(actor): RequireAuth,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserRow>)> {
    let Json(req) = payload?;
    let username = req.username.trim();
    if username.is_empty() {
        return Err(ApiError::Validation("username is required".into()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let role: Role = req.role.parse().map_err(ApiError::Validation)?;

    let vendor = parent(&state, req.vendor_id, "vendorId").await?;
    let team_leader = parent(&state, req.team_leader_id, "teamLeaderId").await?;
    let links = resolve_links(role, vendor.as_ref(), team_leader.as_ref())
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    if !can_create(&actor.principal, role, links) {
        return Err(ApiError::Forbidden(format!(
            "Not allowed to create {} accounts here",
            role
        )));
    }

    let password = req.password.clone();
    let cost = state.config.password_hash_cost;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(anyhow::Error::from)??;
    let user = state
        .db
        .create_user(&NewUser {
            username,
            full_name: req.full_name.as_deref(),
            role,
            password_hash: &password_hash,
            vendor_id: links.0,
            team_leader_id: links.1,
            is_approved: actor.role() == Role::Admin,
        })
        .await
        .map_err(|e| ApiError::from_storage(e, "Username already exists"))?;

    state
        .audit(
            Some(actor.id()),
            "CREATE_USER",
            json!({ "userId": user.id, "username": user.username, "role": user.role }),
        )
        .await;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/users
pub(super) async fn handler_users_list(
    State(state): State<Arc<AppState>>,
    RequireAuth(actor): RequireAuth,
) -> ApiResult<Json<Vec<UserRow>>> {
    Ok(Json(state.db.list_visible_users(&actor.principal).await?))
}

#[derive(Deserialize)]
pub(super) struct ApprovalRequest {
    approved: bool,
}

/// PUT /api/users/{id}/approval, superiors only.
pub(super) async fn handler_user_approval(
    State(state): State<Arc<AppState>>,
    RequireAuth(actor): RequireAuth,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ApprovalRequest>, JsonRejection>,
) -> ApiResult<Json<UserRow>> {
    let Path(id) = path?;
    let Json(req) = payload?;
    let target = state.require_user(id).await?;
    if !is_superior_of(&actor.principal, &target.principal()?) {
        return Err(ApiError::Forbidden(format!(
            "Not allowed to change approval of {}",
            target.username
        )));
    }
    let user = state
        .db
        .set_user_approval(id, req.approved)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", id)))?;
    state
        .audit(
            Some(actor.id()),
            "SET_APPROVAL",
            json!({ "userId": user.id, "approved": user.is_approved }),
        )
        .await;
    Ok(Json(user))
}

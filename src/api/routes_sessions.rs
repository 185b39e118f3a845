//! Counting sessions API: start, end, active lookup, history.
//!
//! A second start while a session is active is a 409. The check runs before
//! the insert for a clean message; the partial unique index catches the race.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::middleware_auth::{AuthUser, RequireAuth};
use super::{ensure_can_act_for, AppState};
use crate::db::{SessionEnd, SessionRow, UserRow};
use crate::error::{ApiError, ApiResult};
use crate::hierarchy::Role;

const ACTIVE_CONFLICT: &str = "Worker already has an active counting session";
const HISTORY_LIMIT: i64 = 100;

/// Load the session's worker and check the caller may touch the session:
/// the worker itself, a superior, or the session's own team leader.
pub(super) async fn authorize_session(
    state: &AppState,
    actor: &AuthUser,
    session: &SessionRow,
) -> ApiResult<UserRow> {
    let worker = state.require_user(session.worker_id).await?;
    if actor.id() == session.team_leader_id {
        return Ok(worker);
    }
    ensure_can_act_for(actor, &worker)?;
    Ok(worker)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct StartRequest {
    worker_id: Uuid,
    team_leader_id: Uuid,
    warehouse_name: String,
}

/// POST /api/counting-session/start
pub(super) async fn handler_session_start(
    State(state): State<Arc<AppState>>,
    RequireAuth(actor): RequireAuth,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SessionRow>)> {
    let Json(req) = payload?;
    let warehouse = req.warehouse_name.trim();
    if warehouse.is_empty() {
        return Err(ApiError::Validation("warehouseName is required".into()));
    }

    let worker = state.require_user(req.worker_id).await?;
    if worker.role()? != Role::Worker {
        return Err(ApiError::Validation(format!(
            "User {} is not a worker",
            worker.username
        )));
    }
    ensure_can_act_for(&actor, &worker)?;

    let leader = state
        .db
        .get_user(req.team_leader_id)
        .await?
        .filter(|u| u.role == Role::TeamLeader.as_str())
        .ok_or_else(|| ApiError::Validation("teamLeaderId must reference a team leader".into()))?;
    if worker.team_leader_id != Some(leader.id) {
        return Err(ApiError::Validation(format!(
            "{} is not the team leader of {}",
            leader.username, worker.username
        )));
    }

    if state.db.get_active_session(worker.id).await?.is_some() {
        return Err(ApiError::Conflict(ACTIVE_CONFLICT.into()));
    }
    let session = state
        .db
        .start_session(worker.id, leader.id, warehouse)
        .await
        .map_err(|e| ApiError::from_storage(e, ACTIVE_CONFLICT))?;

    state.prom_metrics.sessions_started.inc();
    tracing::info!(session_id = session.id, worker = %worker.username, "session started");
    state
        .audit(
            Some(actor.id()),
            "START_SESSION",
            json!({ "sessionId": session.id, "workerId": worker.id, "warehouse": warehouse }),
        )
        .await;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /api/counting-session/end/{session_id}
pub(super) async fn handler_session_end(
    State(state): State<Arc<AppState>>,
    RequireAuth(actor): RequireAuth,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<SessionRow>> {
    let Path(id) = path?;
    let session = state
        .db
        .get_session(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Session {} not found", id)))?;
    authorize_session(&state, &actor, &session).await?;

    match state.db.end_session(id).await? {
        SessionEnd::Ended(session) => {
            state.prom_metrics.sessions_completed.inc();
            tracing::info!(session_id = session.id, "session completed");
            state
                .audit(
                    Some(actor.id()),
                    "END_SESSION",
                    json!({ "sessionId": session.id }),
                )
                .await;
            Ok(Json(session))
        }
        SessionEnd::AlreadyCompleted(_) => Err(ApiError::InvalidState(format!(
            "Session {} is already completed",
            id
        ))),
        SessionEnd::NotFound => Err(ApiError::NotFound(format!("Session {} not found", id))),
    }
}

/// GET /api/counting-session/active/{worker_id} returns the session, or `null`.
pub(super) async fn handler_session_active(
    State(state): State<Arc<AppState>>,
    RequireAuth(actor): RequireAuth,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Option<SessionRow>>> {
    let Path(worker_id) = path?;
    let worker = state.require_user(worker_id).await?;
    ensure_can_act_for(&actor, &worker)?;
    Ok(Json(state.db.get_active_session(worker_id).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct HistoryQuery {
    worker_id: Option<Uuid>,
}

/// GET /api/counting-session?workerId=, newest first. Defaults to the caller.
pub(super) async fn handler_sessions_list(
    State(state): State<Arc<AppState>>,
    RequireAuth(actor): RequireAuth,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<SessionRow>>> {
    let Query(query) = query?;
    let worker_id = query.worker_id.unwrap_or(actor.id());
    let worker = state.require_user(worker_id).await?;
    ensure_can_act_for(&actor, &worker)?;
    Ok(Json(state.db.list_sessions(worker_id, HISTORY_LIMIT).await?))
}

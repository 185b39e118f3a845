//! Counting data API: submit a count, recount, list.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::middleware_auth::{AuthUser, RequireAuth};
use super::routes_sessions::authorize_session;
use super::{ensure_can_act_for, AppState};
use crate::db::{CountSubmission, CountingFilter, CountingRecordRow};
use crate::error::{ApiError, ApiResult};
use crate::hierarchy::{can_recount, Role};
use crate::recorder::{resolve_book_quantity, validate_count, CountRejection};

const LIST_LIMIT: i64 = 500;

impl From<CountRejection> for ApiError {
    fn from(rejection: CountRejection) -> Self {
        if rejection.is_not_found() {
            ApiError::NotFound(rejection.to_string())
        } else {
            ApiError::Validation(rejection.to_string())
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CountRequest {
    session_id: i64,
    bin_no: String,
    qty_counted_worker: i64,
    #[serde(default)]
    qty_as_per_books: Option<i64>,
}

/// POST /api/counting-data
///
/// Stores the record and bumps the worker's day totals atomically, then
/// appends `COUNT_BIN` to the audit trail.
pub(super) async fn handler_count_submit(
    State(state): State<Arc<AppState>>,
    RequireAuth(actor): RequireAuth,
    payload: Result<Json<CountRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CountingRecordRow>)> {
    let Json(req) = payload?;
    let (bin_no, counted) = validate_count(&req.bin_no, req.qty_counted_worker)?;

    let session = state
        .db
        .get_session(req.session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Session {} not found", req.session_id)))?;
    let worker = authorize_session(&state, &actor, &session).await?;

    let catalog = if state.config.trust_client_book_quantity {
        None
    } else {
        state
            .db
            .get_bin(&session.warehouse_name, &bin_no)
            .await?
            .map(|b| b.book_quantity)
    };
    let book = resolve_book_quantity(
        state.config.trust_client_book_quantity,
        req.qty_as_per_books,
        catalog,
        &bin_no,
        &session.warehouse_name,
    )?;
    if let Some(client) = book.ignored_client {
        warn!(
            session_id = session.id,
            bin = %bin_no,
            client,
            catalog = book.value,
            "client book quantity differs from catalog, using catalog"
        );
    }

    let (record, totals) = state
        .db
        .record_count(
            &CountSubmission {
                session: &session,
                username: &worker.username,
                bin_no: &bin_no,
                counted_quantity: counted,
                book_quantity: book.value,
            },
            Utc::now(),
        )
        .await?;

    state.prom_metrics.record_count(&session.warehouse_name);
    info!(
        session_id = session.id,
        bin = %record.bin_no,
        difference = record.difference,
        bins_today = totals.bins_counted,
        "count recorded"
    );
    state
        .audit(
            Some(actor.id()),
            "COUNT_BIN",
            json!({
                "recordId": record.id,
                "sessionId": session.id,
                "binNo": record.bin_no,
                "counted": record.counted_quantity,
                "book": record.book_quantity,
                "difference": record.difference,
            }),
        )
        .await;
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RecountRequest {
    recount_quantity: i64,
}

/// PUT /api/counting-data/{id}/recount, by the session's team leader or an admin.
pub(super) async fn handler_count_recount(
    State(state): State<Arc<AppState>>,
    RequireAuth(actor): RequireAuth,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<RecountRequest>, JsonRejection>,
) -> ApiResult<Json<CountingRecordRow>> {
    let Path(id) = path?;
    let Json(req) = payload?;
    let recount = i32::try_from(req.recount_quantity)
        .ok()
        .filter(|q| *q >= 0)
        .ok_or_else(|| {
            ApiError::Validation("recountQuantity must be a non-negative integer".into())
        })?;

    let record = state
        .db
        .get_counting_record(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Counting record {} not found", id)))?;
    let session = state
        .db
        .get_session(record.session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Session {} not found", record.session_id)))?;
    if !can_recount(&actor.principal, session.team_leader_id) {
        return Err(ApiError::Forbidden(
            "Only the session's team leader can recount".into(),
        ));
    }

    let updated = state
        .db
        .set_recount(id, recount)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Counting record {} not found", id)))?;
    state
        .audit(
            Some(actor.id()),
            "RECOUNT_BIN",
            json!({
                "recordId": updated.id,
                "binNo": updated.bin_no,
                "counted": updated.counted_quantity,
                "recount": recount,
                "difference": updated.difference,
            }),
        )
        .await;
    Ok(Json(updated))
}

/// Narrow a listing request to what the caller may see.
async fn scope_filter(
    state: &AppState,
    actor: &AuthUser,
    mut filter: CountingFilter,
) -> ApiResult<CountingFilter> {
    if actor.role() == Role::Admin {
        return Ok(filter);
    }
    if let Some(session_id) = filter.session_id {
        if let Some(session) = state.db.get_session(session_id).await? {
            authorize_session(state, actor, &session).await?;
        }
    }
    match filter.worker_id {
        Some(worker_id) => {
            let worker = state.require_user(worker_id).await?;
            ensure_can_act_for(actor, &worker)?;
        }
        None if actor.role() == Role::Worker => filter.worker_id = Some(actor.id()),
        None if filter.session_id.is_none() => {
            return Err(ApiError::Validation(
                "workerId or sessionId is required".into(),
            ));
        }
        None => {}
    }
    Ok(filter)
}

/// GET /api/counting-data?sessionId=&workerId=&date=, newest first.
pub(super) async fn handler_counts_list(
    State(state): State<Arc<AppState>>,
    RequireAuth(actor): RequireAuth,
    query: Result<Query<CountingFilter>, QueryRejection>,
) -> ApiResult<Json<Vec<CountingRecordRow>>> {
    let Query(filter) = query?;
    let filter = scope_filter(&state, &actor, filter).await?;
    Ok(Json(
        state.db.list_counting_records(&filter, LIST_LIMIT).await?,
    ))
}

//! Audit trail API (admin).

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use std::sync::Arc;

use super::middleware_auth::RequireAdmin;
use super::AppState;
use crate::db::{AuditEntry, AuditFilter};
use crate::error::ApiResult;

/// GET /api/audit-log?userId=&action=&limit=, newest first.
pub(super) async fn handler_audit_list(
    State(state): State<Arc<AppState>>,
    RequireAdmin(_): RequireAdmin,
    query: Result<Query<AuditFilter>, QueryRejection>,
) -> ApiResult<Json<Vec<AuditEntry>>> {
    let Query(filter) = query?;
    Ok(Json(state.db.list_audit(&filter).await?))
}

//! Worker performance API: today's stats, leaderboard, admin upsert.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::middleware_auth::{RequireAdmin, RequireAuth};
use super::{ensure_can_act_for, AppState};
use crate::db::{PerformanceRow, PerformanceUpsert};
use crate::error::{ApiError, ApiResult};
use crate::performance::business_day;

/// A worker's stats for one day; zeros when nothing was counted yet.
#[derive(Debug, Serialize)]
pub(super) struct DayStats {
    username: String,
    perf_date: NaiveDate,
    warehouse_name: Option<String>,
    bins_counted: i32,
    quantity_counted: i64,
    minutes_taken: i32,
    efficiency: f64,
    ranking: Option<i32>,
}

impl DayStats {
    fn from_row(username: String, day: NaiveDate, row: Option<PerformanceRow>) -> DayStats {
        match row {
            Some(row) => DayStats {
                username: row.username,
                perf_date: row.perf_date,
                warehouse_name: Some(row.warehouse_name),
                bins_counted: row.bins_counted,
                quantity_counted: row.quantity_counted,
                minutes_taken: row.minutes_taken,
                efficiency: row.efficiency,
                ranking: row.ranking,
            },
            None => DayStats {
                username,
                perf_date: day,
                warehouse_name: None,
                bins_counted: 0,
                quantity_counted: 0,
                minutes_taken: 0,
                efficiency: 0.0,
                ranking: None,
            },
        }
    }
}

/// GET /api/worker-performance/today/{worker_id}
pub(super) async fn handler_performance_today(
    State(state): State<Arc<AppState>>,
    RequireAuth(actor): RequireAuth,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<DayStats>> {
    let Path(worker_id) = path?;
    let worker = state.require_user(worker_id).await?;
    ensure_can_act_for(&actor, &worker)?;

    let today = business_day(Utc::now());
    let row = state.db.get_performance(&worker.username, today).await?;
    Ok(Json(DayStats::from_row(worker.username, today, row)))
}

#[derive(Deserialize)]
pub(super) struct LeaderboardQuery {
    warehouse: Option<String>,
    date: Option<NaiveDate>,
    limit: Option<i64>,
}

/// GET /api/worker-performance?warehouse=&date=&limit=
///
/// Ranks only the returned window and stores those ranks.
pub(super) async fn handler_leaderboard(
    State(state): State<Arc<AppState>>,
    RequireAuth(_): RequireAuth,
    query: Result<Query<LeaderboardQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<PerformanceRow>>> {
    let Query(query) = query?;
    let day = query.date.unwrap_or_else(|| business_day(Utc::now()));
    let limit = state.config.leaderboard_limit(query.limit);
    let warehouse = query
        .warehouse
        .as_deref()
        .map(str::trim)
        .filter(|w| !w.is_empty());
    let rows = state
        .db
        .rank_performance(day, warehouse, limit as usize)
        .await?;
    Ok(Json(rows))
}

fn validate_upsert(upsert: &PerformanceUpsert) -> ApiResult<()> {
    if upsert.username.trim().is_empty() || upsert.warehouse_name.trim().is_empty() {
        return Err(ApiError::Validation(
            "username and warehouseName are required".into(),
        ));
    }
    if upsert.bins_counted < 0 || upsert.quantity_counted < 0 || upsert.minutes_taken < 0 {
        return Err(ApiError::Validation(
            "binsCounted, quantityCounted and minutesTaken must be non-negative".into(),
        ));
    }
    Ok(())
}

/// POST /api/worker-performance writes a whole row; efficiency is derived.
pub(super) async fn handler_performance_upsert(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    payload: Result<Json<PerformanceUpsert>, JsonRejection>,
) -> ApiResult<Json<PerformanceRow>> {
    let Json(upsert) = payload?;
    validate_upsert(&upsert)?;
    let row = state.db.upsert_performance(&upsert).await?;
    state
        .audit(
            Some(admin.id()),
            "UPSERT_PERFORMANCE",
            json!({ "username": row.username, "date": row.perf_date }),
        )
        .await;
    Ok(Json(row))
}

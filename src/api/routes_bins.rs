//! Bin catalog API: list per warehouse, admin import, admin book-quantity edit.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::middleware_auth::{RequireAdmin, RequireAuth};
use super::AppState;
use crate::db::{validate_bin_import, BinImport, BinRecord};
use crate::error::{ApiError, ApiResult};

#[derive(Deserialize)]
pub(super) struct BinsQuery {
    warehouse: Option<String>,
}

/// GET /api/bin-master?warehouse=<name>
pub(super) async fn handler_bins_list(
    State(state): State<Arc<AppState>>,
    RequireAuth(_): RequireAuth,
    query: Result<Query<BinsQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<BinRecord>>> {
    let Query(query) = query?;
    let warehouse = query
        .warehouse
        .as_deref()
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .ok_or_else(|| ApiError::Validation("warehouse is required".into()))?;
    Ok(Json(state.db.get_bins(warehouse).await?))
}

/// POST /api/bin-master. The body is a JSON array of bins; existing bins are updated.
pub(super) async fn handler_bins_import(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    payload: Result<Json<Vec<BinImport>>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let Json(bins) = payload?;
    validate_bin_import(&bins).map_err(ApiError::Validation)?;
    let written = state.db.import_bins(&bins).await?;
    state
        .audit(
            Some(admin.id()),
            "IMPORT_BINS",
            json!({ "count": written }),
        )
        .await;
    Ok(Json(json!({ "imported": written })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BookQuantityUpdate {
    book_quantity: i32,
}

/// PUT /api/bin-master/{warehouse}/{bin_no}
pub(super) async fn handler_bin_update(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    path: Result<Path<(String, String)>, PathRejection>,
    payload: Result<Json<BookQuantityUpdate>, JsonRejection>,
) -> ApiResult<Json<BinRecord>> {
    let Path((warehouse, bin_no)) = path?;
    let Json(update) = payload?;
    if update.book_quantity < 0 {
        return Err(ApiError::Validation(
            "bookQuantity must be non-negative".into(),
        ));
    }
    let previous = state.db.get_bin(&warehouse, &bin_no).await?;
    let bin = state
        .db
        .set_book_quantity(&warehouse, &bin_no, update.book_quantity)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("Bin {} not found in warehouse {}", bin_no, warehouse))
        })?;
    state
        .audit(
            Some(admin.id()),
            "UPDATE_BOOK_QTY",
            json!({
                "warehouse": warehouse,
                "binNo": bin_no,
                "from": previous.map(|b| b.book_quantity),
                "to": bin.book_quantity,
            }),
        )
        .await;
    Ok(Json(bin))
}

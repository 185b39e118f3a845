//! Worker performance: per-day aggregate, leaderboard, direct upsert.
//!
//! The per-count update is an atomic `INSERT … ON CONFLICT DO UPDATE` that
//! increments in place, so concurrent submissions for the same worker and
//! day serialize on the row lock instead of overwriting each other. The
//! efficiency is then recomputed from the returned totals while the lock is
//! still held by the surrounding transaction.

use anyhow::Result;
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgConnection;

use super::{Database, PerformanceRow};
use crate::performance::{efficiency, rank_window};

/// Admin/bulk write of a full performance row.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceUpsert {
    pub warehouse_name: String,
    pub date: NaiveDate,
    pub username: String,
    pub bins_counted: i32,
    pub quantity_counted: i64,
    pub minutes_taken: i32,
}

/// Count one more bin for `username` on `day`.
///
/// `minutes` replaces the stored time when the session has ended; `None`
/// keeps whatever is stored (zero for a new row).
pub(super) async fn apply_count(
    conn: &mut PgConnection,
    username: &str,
    warehouse_name: &str,
    day: NaiveDate,
    quantity: i32,
    minutes: Option<i32>,
) -> Result<PerformanceRow> {
    let mut row = sqlx::query_as::<_, PerformanceRow>(
        "INSERT INTO worker_performance
           (warehouse_name, perf_date, username, bins_counted, quantity_counted, minutes_taken)
         VALUES ($1, $2, $3, 1, $4, COALESCE($5::INTEGER, 0))
         ON CONFLICT (username, perf_date) DO UPDATE SET
           warehouse_name = EXCLUDED.warehouse_name,
           bins_counted = worker_performance.bins_counted + 1,
           quantity_counted = worker_performance.quantity_counted + EXCLUDED.quantity_counted,
           minutes_taken = COALESCE($5::INTEGER, worker_performance.minutes_taken),
           updated_at = NOW()
         RETURNING *",
    )
    .bind(warehouse_name)
    .bind(day)
    .bind(username)
    .bind(i64::from(quantity))
    .bind(minutes)
    .fetch_one(&mut *conn)
    .await?;

    row.efficiency = efficiency(row.bins_counted, row.minutes_taken);
    sqlx::query("UPDATE worker_performance SET efficiency = $2 WHERE id = $1")
        .bind(row.id)
        .bind(row.efficiency)
        .execute(&mut *conn)
        .await?;
    Ok(row)
}

/// Replace the time of an existing day row after a session ends.
pub(super) async fn apply_session_minutes(
    conn: &mut PgConnection,
    username: &str,
    day: NaiveDate,
    minutes: i32,
) -> Result<Option<PerformanceRow>> {
    let existing = sqlx::query_as::<_, PerformanceRow>(
        "SELECT * FROM worker_performance WHERE username = $1 AND perf_date = $2 FOR UPDATE",
    )
    .bind(username)
    .bind(day)
    .fetch_optional(&mut *conn)
    .await?;
    let Some(mut row) = existing else {
        return Ok(None);
    };

    let totals = row.totals().with_minutes(minutes);
    sqlx::query(
        "UPDATE worker_performance SET minutes_taken = $2, efficiency = $3, updated_at = NOW()
         WHERE id = $1",
    )
    .bind(row.id)
    .bind(totals.minutes_taken)
    .bind(totals.efficiency)
    .execute(&mut *conn)
    .await?;
    row.minutes_taken = totals.minutes_taken;
    row.efficiency = totals.efficiency;
    Ok(Some(row))
}

impl Database {
    pub async fn get_performance(
        &self,
        username: &str,
        day: NaiveDate,
    ) -> Result<Option<PerformanceRow>> {
        let row = sqlx::query_as::<_, PerformanceRow>(
            "SELECT * FROM worker_performance WHERE username = $1 AND perf_date = $2",
        )
        .bind(username)
        .bind(day)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// All rows of a day, optionally restricted to one warehouse.
    pub async fn get_day_performance(
        &self,
        day: NaiveDate,
        warehouse_name: Option<&str>,
    ) -> Result<Vec<PerformanceRow>> {
        let rows = sqlx::query_as::<_, PerformanceRow>(
            "SELECT * FROM worker_performance
             WHERE perf_date = $1 AND ($2::TEXT IS NULL OR warehouse_name = $2)",
        )
        .bind(day)
        .bind(warehouse_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Leaderboard pass: rank the day's (filtered) rows by efficiency,
    /// keep the first `limit`, and persist their ranks.
    ///
    /// Only the returned rows are ranked; rows outside the window keep
    /// whatever rank an earlier pass gave them.
    pub async fn rank_performance(
        &self,
        day: NaiveDate,
        warehouse_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<PerformanceRow>> {
        let rows = self.get_day_performance(day, warehouse_name).await?;
        let ranked = rank_window(rows, limit);

        let mut tx = self.pool.begin().await?;
        for row in &ranked {
            sqlx::query("UPDATE worker_performance SET ranking = $2 WHERE id = $1")
                .bind(row.id)
                .bind(row.ranking)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(ranked)
    }

    /// Write a whole row. Efficiency is always derived from the totals.
    pub async fn upsert_performance(&self, upsert: &PerformanceUpsert) -> Result<PerformanceRow> {
        let row = sqlx::query_as::<_, PerformanceRow>(
            "INSERT INTO worker_performance
               (warehouse_name, perf_date, username, bins_counted, quantity_counted, minutes_taken, efficiency)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (username, perf_date) DO UPDATE SET
               warehouse_name = EXCLUDED.warehouse_name,
               bins_counted = EXCLUDED.bins_counted,
               quantity_counted = EXCLUDED.quantity_counted,
               minutes_taken = EXCLUDED.minutes_taken,
               efficiency = EXCLUDED.efficiency,
               updated_at = NOW()
             RETURNING *",
        )
        .bind(&upsert.warehouse_name)
        .bind(upsert.date)
        .bind(&upsert.username)
        .bind(upsert.bins_counted)
        .bind(upsert.quantity_counted)
        .bind(upsert.minutes_taken)
        .bind(efficiency(upsert.bins_counted, upsert.minutes_taken))
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}

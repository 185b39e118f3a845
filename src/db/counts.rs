//! Counting records: submission, recount, queries.
//!
//! A submission inserts the record and bumps the worker's per-day aggregate
//! in one transaction. `difference` is a generated column and never appears
//! in an INSERT or UPDATE here.

use anyhow::Result;
use chrono::{DateTime, Utc};

use super::{CountingFilter, CountingRecordRow, Database, PerformanceRow, SessionRow};
use crate::performance::{business_day, session_minutes};

/// A count ready to persist: book quantity already resolved.
#[derive(Debug, Clone)]
pub struct CountSubmission<'a> {
    pub session: &'a SessionRow,
    pub username: &'a str,
    pub bin_no: &'a str,
    pub counted_quantity: i32,
    pub book_quantity: i32,
}

impl Database {
    /// Insert the record and update the aggregate for `(username, day of now)`.
    pub async fn record_count(
        &self,
        count: &CountSubmission<'_>,
        now: DateTime<Utc>,
    ) -> Result<(CountingRecordRow, PerformanceRow)> {
        let mut tx = self.pool.begin().await?;
        let record = sqlx::query_as::<_, CountingRecordRow>(
            "INSERT INTO counting_records (session_id, bin_no, counted_quantity, book_quantity, counted_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(count.session.id)
        .bind(count.bin_no)
        .bind(count.counted_quantity)
        .bind(count.book_quantity)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let performance = super::performance::apply_count(
            &mut *tx,
            count.username,
            &count.session.warehouse_name,
            business_day(now),
            count.counted_quantity,
            session_minutes(count.session.start_time, count.session.end_time),
        )
        .await?;
        tx.commit().await?;
        Ok((record, performance))
    }

    pub async fn get_counting_record(&self, id: i64) -> Result<Option<CountingRecordRow>> {
        let row =
            sqlx::query_as::<_, CountingRecordRow>("SELECT * FROM counting_records WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    /// Store a team leader's recount. Returns `None` if the record is unknown.
    pub async fn set_recount(
        &self,
        id: i64,
        recount_quantity: i32,
    ) -> Result<Option<CountingRecordRow>> {
        let row = sqlx::query_as::<_, CountingRecordRow>(
            "UPDATE counting_records SET recount_quantity = $2, recounted_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(recount_quantity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Records matching every given filter, most recent first.
    pub async fn list_counting_records(
        &self,
        filter: &CountingFilter,
        limit: i64,
    ) -> Result<Vec<CountingRecordRow>> {
        let rows = sqlx::query_as::<_, CountingRecordRow>(
            "SELECT r.* FROM counting_records r
             JOIN counting_sessions s ON s.id = r.session_id
             WHERE ($1::BIGINT IS NULL OR r.session_id = $1)
               AND ($2::UUID IS NULL OR s.worker_id = $2)
               AND ($3::DATE IS NULL OR (r.counted_at AT TIME ZONE 'UTC')::date = $3)
             ORDER BY r.counted_at DESC, r.id DESC
             LIMIT $4",
        )
        .bind(filter.session_id)
        .bind(filter.worker_id)
        .bind(filter.date)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

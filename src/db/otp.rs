//! OTP login approvals.
//!
//! Expiry is evaluated against the current time whenever a row is read or
//! decided; expired rows are left in place.

use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Database, OtpRow};

impl Database {
    pub async fn create_otp(
        &self,
        worker_id: Uuid,
        team_leader_id: Uuid,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<OtpRow> {
        let row = sqlx::query_as::<_, OtpRow>(
            "INSERT INTO otp_requests (worker_id, team_leader_id, code, expires_at)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(worker_id)
        .bind(team_leader_id)
        .bind(code)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_otp(&self, id: i64) -> Result<Option<OtpRow>> {
        let row = sqlx::query_as::<_, OtpRow>("SELECT * FROM otp_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Undecided, unexpired requests addressed to a team leader, newest first.
    pub async fn list_pending_otps(
        &self,
        team_leader_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<OtpRow>> {
        let rows = sqlx::query_as::<_, OtpRow>(
            "SELECT * FROM otp_requests
             WHERE team_leader_id = $1 AND decided_at IS NULL AND expires_at > $2
             ORDER BY created_at DESC",
        )
        .bind(team_leader_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Approve or reject a pending request. `None` means the request was
    /// already decided or had expired by the time the update ran.
    pub async fn decide_otp(
        &self,
        id: i64,
        approved: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<OtpRow>> {
        let row = sqlx::query_as::<_, OtpRow>(
            "UPDATE otp_requests SET is_approved = $2, decided_at = $3
             WHERE id = $1 AND decided_at IS NULL AND expires_at > $3
             RETURNING *",
        )
        .bind(id)
        .bind(approved)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Consume an approved, unexpired, unused request matching the code.
    /// Returns `None` when no such request exists; a code works once.
    pub async fn consume_otp(
        &self,
        worker_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OtpRow>> {
        let row = sqlx::query_as::<_, OtpRow>(
            "UPDATE otp_requests SET consumed_at = $3
             WHERE id = (
               SELECT id FROM otp_requests
               WHERE worker_id = $1 AND code = $2 AND is_approved
                 AND consumed_at IS NULL AND expires_at > $3
               ORDER BY created_at DESC
               LIMIT 1
               FOR UPDATE SKIP LOCKED
             )
             RETURNING *",
        )
        .bind(worker_id)
        .bind(code)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

//! Counting sessions: start, end, lookup.
//!
//! A worker has at most one `active` session. The partial unique index
//! `counting_sessions_one_active` enforces it in storage, so two concurrent
//! starts cannot both succeed; the loser gets a unique violation.
//!
//! Ending is a conditional update (`WHERE status = 'active'`), so a second
//! end never moves `end_time`.

use anyhow::Result;
use uuid::Uuid;

use super::{Database, SessionRow, SESSION_ACTIVE, SESSION_COMPLETED};
use crate::performance::{business_day, elapsed_minutes};

/// Outcome of an end request.
#[derive(Debug)]
pub enum SessionEnd {
    Ended(SessionRow),
    AlreadyCompleted(SessionRow),
    NotFound,
}

impl Database {
    pub async fn start_session(
        &self,
        worker_id: Uuid,
        team_leader_id: Uuid,
        warehouse_name: &str,
    ) -> Result<SessionRow> {
        let row = sqlx::query_as::<_, SessionRow>(
            "INSERT INTO counting_sessions (worker_id, team_leader_id, warehouse_name, status)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(worker_id)
        .bind(team_leader_id)
        .bind(warehouse_name)
        .bind(SESSION_ACTIVE)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_active_session(&self, worker_id: Uuid) -> Result<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM counting_sessions WHERE worker_id = $1 AND status = $2",
        )
        .bind(worker_id)
        .bind(SESSION_ACTIVE)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_session(&self, id: i64) -> Result<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>("SELECT * FROM counting_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Sessions of a worker, most recent first.
    pub async fn list_sessions(&self, worker_id: Uuid, limit: i64) -> Result<Vec<SessionRow>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM counting_sessions WHERE worker_id = $1
             ORDER BY start_time DESC LIMIT $2",
        )
        .bind(worker_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Complete an active session and fold its elapsed time into the
    /// worker's performance row for the day, in one transaction.
    pub async fn end_session(&self, id: i64) -> Result<SessionEnd> {
        let mut tx = self.pool.begin().await?;
        let ended = sqlx::query_as::<_, SessionRow>(
            "UPDATE counting_sessions SET end_time = NOW(), status = $2
             WHERE id = $1 AND status = $3
             RETURNING *",
        )
        .bind(id)
        .bind(SESSION_COMPLETED)
        .bind(SESSION_ACTIVE)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(session) = ended else {
            tx.rollback().await?;
            return Ok(match self.get_session(id).await? {
                Some(existing) => SessionEnd::AlreadyCompleted(existing),
                None => SessionEnd::NotFound,
            });
        };

        if let Some(end) = session.end_time {
            let username: Option<String> =
                sqlx::query_scalar("SELECT username FROM users WHERE id = $1")
                    .bind(session.worker_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if let Some(username) = username {
                super::performance::apply_session_minutes(
                    &mut *tx,
                    &username,
                    business_day(end),
                    elapsed_minutes(session.start_time, end),
                )
                .await?;
            }
        }
        tx.commit().await?;
        Ok(SessionEnd::Ended(session))
    }
}

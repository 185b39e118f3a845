//! Audit trail: append and query.

use anyhow::Result;
use serde_json::Value;
use uuid::Uuid;

use super::{AuditEntry, AuditFilter, Database};

pub const DEFAULT_AUDIT_LIMIT: i64 = 100;
pub const MAX_AUDIT_LIMIT: i64 = 1000;

impl Database {
    pub async fn append_audit(
        &self,
        user_id: Option<Uuid>,
        action: &str,
        details: &Value,
    ) -> Result<()> {
        sqlx::query("INSERT INTO audit_log (user_id, action, details) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(action)
            .bind(details)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Entries matching the filter, newest first.
    pub async fn list_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let limit = filter
            .limit
            .unwrap_or(DEFAULT_AUDIT_LIMIT)
            .clamp(1, MAX_AUDIT_LIMIT);
        let rows = sqlx::query_as::<_, AuditEntry>(
            "SELECT * FROM audit_log
             WHERE ($1::UUID IS NULL OR user_id = $1)
               AND ($2::TEXT IS NULL OR action = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3",
        )
        .bind(filter.user_id)
        .bind(filter.action.as_deref())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

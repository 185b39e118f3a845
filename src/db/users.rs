//! User accounts: creation, hierarchy lookups, approval.

use anyhow::Result;
use uuid::Uuid;

use super::{Database, UserRow};
use crate::hierarchy::{Principal, Role};

/// A validated account ready to insert.
pub struct NewUser<'a> {
    pub username: &'a str,
    pub full_name: Option<&'a str>,
    pub role: Role,
    pub password_hash: &'a str,
    pub vendor_id: Option<Uuid>,
    pub team_leader_id: Option<Uuid>,
    pub is_approved: bool,
}

impl Database {
    pub async fn create_user(&self, user: &NewUser<'_>) -> Result<UserRow> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (username, full_name, role, password_hash, vendor_id, team_leader_id, is_approved)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(user.username)
        .bind(user.full_name)
        .bind(user.role.as_str())
        .bind(user.password_hash)
        .bind(user.vendor_id)
        .bind(user.team_leader_id)
        .bind(user.is_approved)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Users the given principal can see: everyone for admins, the subtree
    /// for vendors and team leaders, only themselves for workers.
    pub async fn list_visible_users(&self, viewer: &Principal) -> Result<Vec<UserRow>> {
        let rows = match viewer.role {
            Role::Admin => {
                sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY role, username")
                    .fetch_all(&self.pool)
                    .await?
            }
            Role::Vendor => {
                sqlx::query_as::<_, UserRow>(
                    "SELECT * FROM users WHERE vendor_id = $1 ORDER BY role, username",
                )
                .bind(viewer.id)
                .fetch_all(&self.pool)
                .await?
            }
            Role::TeamLeader => {
                sqlx::query_as::<_, UserRow>(
                    "SELECT * FROM users WHERE team_leader_id = $1 ORDER BY username",
                )
                .bind(viewer.id)
                .fetch_all(&self.pool)
                .await?
            }
            Role::Worker => {
                sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
                    .bind(viewer.id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows)
    }

    /// Toggle the approval flag. Returns `None` if the user does not exist.
    pub async fn set_user_approval(&self, id: Uuid, approved: bool) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(
            "UPDATE users SET is_approved = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(approved)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

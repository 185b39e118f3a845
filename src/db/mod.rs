//! # Database: PostgreSQL Storage Layer
//!
//! Async storage for the counting workflow via `sqlx::PgPool`.
//!
//! ## Schema
//!
//! - `users`: accounts with role and hierarchy links (vendor, team leader)
//! - `bin_master`: bin catalog with book quantities, unique per warehouse
//! - `counting_sessions`: one active session per worker (partial unique index)
//! - `counting_records`: counted/recounted quantities; `difference` is a
//!   generated column and can never be written by a client
//! - `worker_performance`: per-worker, per-day aggregate and ranking
//! - `otp_requests`: worker login approvals, expiring after a TTL
//! - `audit_log`: append-only action trail
//!
//! ## Module Structure
//!
//! - [`users`]: account CRUD, hierarchy lookups, approval
//! - [`bins`]: catalog reads and admin upserts
//! - [`sessions`]: session start/end/lookup
//! - [`counts`]: counting record insert (with aggregate update), recount, queries
//! - [`performance`]: per-day aggregate, leaderboard write-back, direct upsert
//! - [`otp`]: OTP request lifecycle
//! - [`audit`]: audit append and query

mod audit;
mod bins;
mod counts;
mod otp;
mod performance;
mod sessions;
mod users;

pub use counts::CountSubmission;
pub use performance::PerformanceUpsert;
pub use sessions::SessionEnd;
pub use users::NewUser;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::hierarchy::{Principal, Role};

// ── Identity ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub role: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub vendor_id: Option<Uuid>,
    pub team_leader_id: Option<Uuid>,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    pub fn role(&self) -> Result<Role> {
        self.role.parse::<Role>().map_err(anyhow::Error::msg)
    }

    pub fn principal(&self) -> Result<Principal> {
        Ok(Principal {
            id: self.id,
            role: self.role()?,
            vendor_id: self.vendor_id,
            team_leader_id: self.team_leader_id,
        })
    }
}

// ── Bin catalog ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BinRecord {
    pub id: i64,
    pub bin_no: String,
    pub warehouse_name: String,
    pub book_quantity: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinImport {
    pub bin_no: String,
    pub warehouse_name: String,
    pub book_quantity: i32,
}

/// Check an import batch before anything is written. The message names the
/// offending row by index.
pub fn validate_bin_import(bins: &[BinImport]) -> std::result::Result<(), String> {
    if bins.is_empty() {
        return Err("at least one bin is required".into());
    }
    for (i, bin) in bins.iter().enumerate() {
        if bin.bin_no.trim().is_empty() || bin.warehouse_name.trim().is_empty() {
            return Err(format!("bin {}: binNo and warehouseName are required", i));
        }
        if bin.book_quantity < 0 {
            return Err(format!("bin {}: bookQuantity must be non-negative", i));
        }
    }
    Ok(())
}

// ── Counting ────────────────────────────────────────────────────

pub const SESSION_ACTIVE: &str = "active";
pub const SESSION_COMPLETED: &str = "completed";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SessionRow {
    pub id: i64,
    pub worker_id: Uuid,
    pub team_leader_id: Uuid,
    pub warehouse_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: String,
}

impl SessionRow {
    pub fn is_active(&self) -> bool {
        self.status == SESSION_ACTIVE
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CountingRecordRow {
    pub id: i64,
    pub session_id: i64,
    pub bin_no: String,
    pub counted_quantity: i32,
    pub recount_quantity: Option<i32>,
    pub book_quantity: i32,
    pub difference: i32,
    pub counted_at: DateTime<Utc>,
    pub recounted_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Default, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CountingFilter {
    pub session_id: Option<i64>,
    pub worker_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
}

// ── Performance ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PerformanceRow {
    pub id: i64,
    pub warehouse_name: String,
    pub perf_date: NaiveDate,
    pub username: String,
    pub bins_counted: i32,
    pub quantity_counted: i64,
    pub minutes_taken: i32,
    pub efficiency: f64,
    pub ranking: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

impl crate::performance::Standing for PerformanceRow {
    fn efficiency(&self) -> f64 {
        self.efficiency
    }
    fn bins_counted(&self) -> i32 {
        self.bins_counted
    }
    fn username(&self) -> &str {
        &self.username
    }
    fn set_ranking(&mut self, rank: i32) {
        self.ranking = Some(rank);
    }
}

impl PerformanceRow {
    pub fn totals(&self) -> crate::performance::DayTotals {
        crate::performance::DayTotals {
            bins_counted: self.bins_counted,
            quantity_counted: self.quantity_counted,
            minutes_taken: self.minutes_taken,
            efficiency: self.efficiency,
        }
    }
}

// ── OTP and audit ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OtpRow {
    pub id: i64,
    pub worker_id: Uuid,
    pub team_leader_id: Uuid,
    #[serde(skip_serializing)]
    pub code: String,
    pub is_approved: bool,
    pub decided_at: Option<DateTime<Utc>>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl OtpRow {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_pending(&self) -> bool {
        self.decided_at.is_none()
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: i64,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Default, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuditFilter {
    pub user_id: Option<Uuid>,
    pub action: Option<String>,
    pub limit: Option<i64>,
}

// ── Database struct and connection ──────────────────────────────

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

/// Build connect options from a URL, keeping the full (decoded) username.
///
/// sqlx's own parser strips a ".project-ref" suffix that some hosted
/// poolers require, so the URL is taken apart by hand.
fn connect_options(database_url: &str) -> Result<PgConnectOptions> {
    let url = url::Url::parse(database_url)?;
    let username = urlencoding::decode(url.username())?.into_owned();
    let password = url
        .password()
        .map(|p| urlencoding::decode(p).map(|s| s.into_owned()))
        .transpose()?;
    let mut opts = PgConnectOptions::new()
        .host(url.host_str().unwrap_or("localhost"))
        .port(url.port().unwrap_or(5432))
        .database(url.path().trim_start_matches('/'))
        .username(&username);
    if let Some(ref pw) = password {
        opts = opts.password(pw);
    }
    Ok(opts)
}

impl Database {
    /// Connect to PostgreSQL using the provided database URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect_with(connect_options(database_url)?)
            .await?;
        Ok(Database { pool })
    }

    /// Build a pool that opens connections on first use.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(std::time::Duration::from_secs(3))
            .connect_lazy_with(connect_options(database_url)?);
        Ok(Database { pool })
    }

    /// Apply the embedded migrations in `migrations/`.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check: execute `SELECT 1` to verify database connectivity.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

//! # API: HTTP Server for the Counting Workflow
//!
//! Runs an Axum server exposing the bin catalog, counting sessions, count
//! submission, performance dashboards, account management, OTP login
//! approval, and the audit trail as JSON under `/api`.
//!
//! ## Layers (outermost first)
//!
//! timeout (408) → body limit → `TraceLayer` → request-id span + latency
//! histogram → panic catcher → CORS.

pub mod middleware_auth;
mod routes_audit;
mod routes_auth;
mod routes_bins;
mod routes_counting;
mod routes_health;
mod routes_otp;
mod routes_performance;
mod routes_sessions;
mod routes_users;

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::{db, hierarchy, prom_metrics};
use middleware_auth::AuthUser;
use anyhow::Result;
use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::routing::{get, post, put};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

pub struct AppState {
    pub db: db::Database,
    pub config: Config,
    pub prom_metrics: prom_metrics::Metrics,
}

impl AppState {
    pub fn with_db(db: db::Database, config: Config) -> Arc<Self> {
        Arc::new(AppState {
            db,
            config,
            prom_metrics: prom_metrics::Metrics::new(),
        })
    }

    /// Append to the audit trail. A failed write is logged and counted but
    /// never fails the caller.
    pub(crate) async fn audit(&self, user_id: Option<Uuid>, action: &str, details: Value) {
        if let Err(e) = self.db.append_audit(user_id, action, &details).await {
            self.prom_metrics.audit_write_failures.inc();
            warn!(error = %e, action, "audit write failed");
        }
    }

    pub(crate) async fn require_user(&self, id: Uuid) -> ApiResult<db::UserRow> {
        self.db
            .get_user(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("User {} not found", id)))
    }
}

/// 403 unless `actor` may act for `worker`: itself, or someone above it.
pub(crate) fn ensure_can_act_for(actor: &AuthUser, worker: &db::UserRow) -> ApiResult<()> {
    let target = worker.principal()?;
    if hierarchy::can_act_for(&actor.principal, &target) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "Not allowed to act for user {}",
            worker.username
        )))
    }
}

/// Records request latency, and runs the request inside a span carrying a
/// request id (taken from `x-request-id` or generated) that is echoed back.
async fn metrics_middleware(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> axum::response::Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = req.method().to_string();
    let raw_path = req.uri().path().to_string();
    let start = std::time::Instant::now();

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %raw_path,
    );
    let mut response = next.run(req).instrument(span).await;

    state.prom_metrics.observe_request(
        &method,
        &normalize_path(&raw_path),
        start.elapsed().as_secs_f64(),
    );
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Collapse numeric ids, UUIDs and bin addresses into placeholders so the
/// latency histogram keeps a bounded label set.
fn normalize_path(path: &str) -> String {
    if path
        .strip_prefix("/api/bin-master/")
        .is_some_and(|rest| !rest.is_empty())
    {
        return "/api/bin-master/:warehouse/:bin_no".to_string();
    }
    path.split('/')
        .map(|seg| {
            if seg.is_empty() {
                seg.to_string()
            } else if seg.chars().all(|c| c.is_ascii_digit()) {
                ":id".to_string()
            } else if Uuid::parse_str(seg).is_ok() {
                ":uuid".to_string()
            } else {
                seg.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.allows_any_origin() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = config
        .cors_allow_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config);
    let body_limit = state.config.body_limit_bytes;
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        // Bin catalog
        .route(
            "/api/bin-master",
            get(routes_bins::handler_bins_list).post(routes_bins::handler_bins_import),
        )
        .route(
            "/api/bin-master/{warehouse}/{bin_no}",
            put(routes_bins::handler_bin_update),
        )
        // Sessions
        .route(
            "/api/counting-session",
            get(routes_sessions::handler_sessions_list),
        )
        .route(
            "/api/counting-session/active/{worker_id}",
            get(routes_sessions::handler_session_active),
        )
        .route(
            "/api/counting-session/start",
            post(routes_sessions::handler_session_start),
        )
        .route(
            "/api/counting-session/end/{session_id}",
            post(routes_sessions::handler_session_end),
        )
        // Counting
        .route(
            "/api/counting-data",
            get(routes_counting::handler_counts_list).post(routes_counting::handler_count_submit),
        )
        .route(
            "/api/counting-data/{id}/recount",
            put(routes_counting::handler_count_recount),
        )
        // Performance
        .route(
            "/api/worker-performance",
            get(routes_performance::handler_leaderboard)
                .post(routes_performance::handler_performance_upsert),
        )
        .route(
            "/api/worker-performance/today/{worker_id}",
            get(routes_performance::handler_performance_today),
        )
        // Accounts and login
        .route(
            "/api/users",
            get(routes_users::handler_users_list).post(routes_users::handler_user_create),
        )
        .route(
            "/api/users/{id}/approval",
            put(routes_users::handler_user_approval),
        )
        .route("/api/auth/login", post(routes_auth::handler_login))
        .route("/api/auth/me", get(routes_auth::handler_me))
        .route("/api/otp/request", post(routes_otp::handler_otp_request))
        .route("/api/otp/pending", get(routes_otp::handler_otp_pending))
        .route("/api/otp/{id}/approve", post(routes_otp::handler_otp_approve))
        .route("/api/otp/{id}/reject", post(routes_otp::handler_otp_reject))
        .route("/api/audit-log", get(routes_audit::handler_audit_list))
        .route("/healthz", get(routes_health::handler_healthz))
        .route("/readyz", get(routes_health::handler_readyz))
        .route("/metrics", get(routes_health::handler_metrics))
        .layer(cors)
        .layer(CatchPanicLayer::new())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .with_state(state)
}

/// Serve the API until SIGINT/SIGTERM.
pub async fn run(database: db::Database, config: Config) -> Result<()> {
    if config.jwt_secret.is_none() {
        warn!("no JWT secret configured: tokens are accepted without signature verification");
    }
    let port = config.port;
    let state = AppState::with_db(database, config);
    let app = build_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "api listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("api shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("received SIGINT, shutting down");
    }
}

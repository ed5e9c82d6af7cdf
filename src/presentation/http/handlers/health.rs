//! Health Check Handlers
//!
//! Provides health check endpoints for Kubernetes-style liveness and readiness probes.
//!
//! # Endpoints
//! - `GET /health` - Basic health check
//! - `GET /health/live` - Liveness probe (is the server running?)
//! - `GET /health/ready` - Readiness probe (can the server accept traffic?)

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use redis::aio::ConnectionManager;
use serde::Serialize;
use std::time::Instant;

use crate::infrastructure::metrics;
use crate::startup::AppState;

/// Server start time for uptime calculation
static SERVER_START: Lazy<Instant> = Lazy::new(Instant::now);
static SERVER_START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Initialize the server start time (call during startup)
pub fn init_server_start() {
    Lazy::force(&SERVER_START);
    Lazy::force(&SERVER_START_TIME);
}

/// Basic health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed health check response
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub checks: HealthChecks,
}

/// Individual service health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub database: ServiceHealth,
    /// Absent when the permission cache is disabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<ServiceHealth>,
}

/// Health status for individual services
#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Overall health status
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Simple liveness response
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

/// Basic health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Liveness probe - checks if the server is running
/// Returns 200 if alive, used by Kubernetes to restart dead pods
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "alive" })
}

/// Readiness probe - checks if the server can accept traffic
/// Returns 200 if ready, 503 if dependencies are unavailable
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = SERVER_START.elapsed().as_secs();
    let started_at = SERVER_START_TIME.to_rfc3339();

    // Check database health
    let db_health = check_database(&state).await;

    // Check Redis health
    let redis_health = match &state.redis {
        Some(conn) => Some(check_redis(conn.clone()).await),
        None => None,
    };

    metrics::update_db_pool_stats(
        state.db.num_idle() as u32,
        state.db.size().saturating_sub(state.db.num_idle() as u32),
    );

    // Determine overall status
    let overall_status = determine_overall_status(&db_health, redis_health.as_ref());

    let response = DetailedHealthResponse {
        status: overall_status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: uptime,
        started_at,
        checks: HealthChecks {
            database: db_health,
            redis: redis_health,
        },
    };

    // Return 503 if unhealthy
    let status_code = match overall_status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

impl ServiceHealth {
    /// Classify a probe: failed is unhealthy, slower than `degraded_after_ms`
    /// is degraded.
    fn from_probe<E: std::fmt::Display>(
        service: &str,
        outcome: Result<(), E>,
        started: Instant,
        degraded_after_ms: u64,
    ) -> Self {
        match outcome {
            Ok(()) => {
                let latency = started.elapsed().as_millis() as u64;
                let status = if latency < degraded_after_ms {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Degraded
                };
                Self { status, latency_ms: Some(latency), message: None }
            }
            Err(e) => Self {
                status: HealthStatus::Unhealthy,
                latency_ms: None,
                message: Some(format!("{service} connection failed: {e}")),
            },
        }
    }
}

async fn check_database(state: &AppState) -> ServiceHealth {
    let started = Instant::now();
    let outcome = sqlx::query("SELECT 1").execute(&state.db).await.map(|_| ());
    ServiceHealth::from_probe("Database", outcome, started, 100)
}

async fn check_redis(mut conn: ConnectionManager) -> ServiceHealth {
    let started = Instant::now();
    let outcome = redis::cmd("PING")
        .query_async::<String>(&mut conn)
        .await
        .map(|_| ());
    ServiceHealth::from_probe("Redis", outcome, started, 50)
}

/// Determine overall health based on individual checks
fn determine_overall_status(db: &ServiceHealth, redis: Option<&ServiceHealth>) -> HealthStatus {
    // If any critical service is unhealthy, overall is unhealthy
    if db.status == HealthStatus::Unhealthy {
        return HealthStatus::Unhealthy;
    }

    // If database is degraded or redis is unhealthy/degraded, overall is degraded
    let redis_ok = redis.map_or(true, |r| r.status == HealthStatus::Healthy);
    if db.status == HealthStatus::Degraded || !redis_ok {
        return HealthStatus::Degraded;
    }

    HealthStatus::Healthy
}

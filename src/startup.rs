//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{middleware, Router};
use chrono::Utc;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::compression::CompressionLayer;

use crate::application::services::{MappingService, Services};
use crate::config::Settings;
use crate::infrastructure::cache::{self, ManagerPermissionCache, NoPermissionCache, RedisPermissionCache};
use crate::infrastructure::repositories::{
    PgPartnerRepository, PgProjectRepository, PgTaskRepository, PgUserRepository,
};
use crate::infrastructure::{database, metrics};
use crate::presentation::http::handlers::health;
use crate::presentation::http::routes;
use crate::presentation::middleware::{cors, logging};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: Option<ConnectionManager>,
    pub services: Services,
    pub settings: Arc<Settings>,
}

/// Build the router with the full middleware stack.
pub fn build_router(state: AppState) -> Router {
    let cors = cors::create_cors_layer(&state.settings.cors);

    routes::create_router(state)
        .layer(middleware::from_fn(logging::track_metrics))
        .layer(CompressionLayer::new())
        .layer(logging::propagate_request_id_layer())
        .layer(logging::create_trace_layer())
        .layer(logging::set_request_id_layer())
        .layer(cors)
}

/// Periodically release task locks held past their expiry.
pub fn spawn_lock_sweeper(mapping: Arc<dyn MappingService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match mapping.auto_unlock_expired_tasks(Utc::now()).await {
                Ok(0) => {}
                Ok(released) => {
                    metrics::record_expired_locks(released);
                    tracing::info!(released, "Released expired task locks");
                }
                Err(e) => tracing::warn!(error = %e, "Expired lock sweep failed"),
            }
        }
    })
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        // Create database pool
        let db = database::create_pool(&settings.database).await?;
        tracing::info!("Database connection pool created");

        if settings.database.run_migrations {
            database::run_migrations(&db).await?;
        }

        // Redis is optional; without it permission checks always hit the database
        let redis = match &settings.redis.url {
            Some(url) => Some(cache::create_redis_client(url).await?),
            None => {
                tracing::info!("Redis not configured, permission cache disabled");
                None
            }
        };
        let permission_cache: Arc<dyn ManagerPermissionCache> = match &redis {
            Some(conn) => Arc::new(RedisPermissionCache::new(
                conn.clone(),
                settings.redis.permission_ttl_secs,
            )),
            None => Arc::new(NoPermissionCache),
        };

        let services = Services::new(
            Arc::new(PgTaskRepository::new(db.clone())),
            Arc::new(PgProjectRepository::new(db.clone())),
            Arc::new(PgUserRepository::new(db.clone())),
            Arc::new(PgPartnerRepository::new(db.clone())),
            permission_cache,
            &settings.tasks,
        );

        spawn_lock_sweeper(
            services.mapping.clone(),
            Duration::from_secs(settings.tasks.auto_unlock_interval_secs),
        );

        let addr = settings.server_addr();
        let state = AppState {
            db,
            redis,
            services,
            settings: Arc::new(settings),
        };

        health::init_server_start();
        let router = build_router(state);

        // Bind to address
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

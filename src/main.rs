//! # Tasking Manager
//!
//! Backend for coordinating collaborative mapping tasks.
//!
//! This is the application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Database connection pool and migrations
//! - Optional Redis permission cache
//! - HTTP server and the expired-lock sweeper

use anyhow::Result;
use tracing::info;

use tasking_manager::config::Settings;
use tasking_manager::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from environment and config files
    let settings = Settings::load()?;

    // Initialize tracing subscriber for structured logging
    tasking_manager::telemetry::init_tracing(&settings.log_format);

    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        "Configuration loaded"
    );

    // Build and run the application
    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}

//! drafter-da - Drawing Analysis Microservice
//!
//! **Module Identity:**
//! - Name: drafter-da (Drawing Analysis)
//! - Port: 5841 (default, configurable)
//!
//! **[DA-OV-010]** Responsible for ingesting uploaded CAD drawings, extracting
//! geometric and semantic content per format, and assembling analysis results.
//!
//! **[DA-MS-010]** Integrates with the Drafter UI via HTTP REST + SSE

use anyhow::Result;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

// Use library definitions
use drafter_da::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting drafter-da (Drawing Analysis) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration (TOML file + environment overrides) **[DA-CFG-010]**
    let config = drafter_common::config::DaConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    let port = config.port;
    let retention_hours = config.retention_hours;

    info!("Queue concurrency: {}", config.queue.concurrency);
    info!("Task timeout: {}s", config.queue.timeout_secs);
    if config.converter.base_url.is_none() {
        info!("DWG converter: not configured");
    }
    if config.kernel_bridge.enabled {
        info!("Kernel bridge: enabled");
    }

    // Wire up collaborators (queue, cache, dispatch, temp storage, event bus)
    let state = AppState::from_config(config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize service state: {}", e))?;

    // Background retention sweep for finished sessions **[DA-WF-030]**
    let sweep_sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(3600));
        loop {
            tick.tick().await;
            let removed = sweep_sessions.sweep(chrono::Duration::hours(retention_hours as i64));
            if removed > 0 {
                info!("Retention sweep removed {} expired sessions", removed);
            }
        }
    });

    // Build router
    let app = drafter_da::build_router(state);

    // Start server
    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    warn!("Server loop exited");
    Ok(())
}

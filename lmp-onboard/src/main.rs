//! lmp-onboard - Shadow Publisher Onboarding Service
//!
//! Ingests inbound-email webhooks, builds shadow publisher records from
//! extracted content, and runs the claim/activation flow.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lmp_onboard::config::OnboardConfig;
use lmp_onboard::services::extractor::HttpExtractor;
use lmp_onboard::services::invitations::TracingTransport;
use lmp_onboard::services::pipeline;
use lmp_onboard::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting lmp-onboard (Shadow Publisher Onboarding)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = OnboardConfig::load()?;
    info!("Bind address: {}", config.bind_address);
    info!("Database: {}", config.database_path);
    info!(
        "Confidence thresholds v{}: auto >= {}, timed >= {}, manual >= {}",
        config.thresholds.version,
        config.thresholds.auto_process,
        config.thresholds.timed_review,
        config.thresholds.manual_review
    );

    let db_pool = lmp_onboard::db::init_database_pool(Path::new(&config.database_path)).await?;
    info!("Database connection established");

    let extractor = Arc::new(HttpExtractor::new(&config.extractor));
    let transport = Arc::new(TracingTransport);

    let bind_address = config.bind_address.clone();
    let state = AppState::new(db_pool, config, extractor, transport);

    // Replay retries a previous process left behind; durable retry state
    // lives in the processing_log rows, not in timers.
    let resumed = pipeline::resume_pending(&state).await?;
    if resumed > 0 {
        info!("Resumed {} interrupted processing runs", resumed);
    }

    let app = lmp_onboard::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Listening on http://{}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}

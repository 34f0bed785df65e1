//! lmp-onboard - Shadow Publisher Onboarding Service
//!
//! Receives inbound-email webhooks from outreach providers, extracts
//! structured pricing/website/contact data through the AI extraction
//! collaborator, routes by confidence into automatic commit or human
//! review, and runs the token-gated claim flow that turns shadow publisher
//! records into active accounts.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::OnboardConfig;
use crate::services::extractor::ContentExtractor;
use crate::services::invitations::EmailTransport;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Immutable service configuration, built once at startup
    pub config: Arc<OnboardConfig>,
    /// AI extraction collaborator
    pub extractor: Arc<dyn ContentExtractor>,
    /// Outbound email collaborator
    pub transport: Arc<dyn EmailTransport>,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: OnboardConfig,
        extractor: Arc<dyn ContentExtractor>,
        transport: Arc<dyn EmailTransport>,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            extractor,
            transport,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::webhook::routes())
        .merge(api::claim::routes())
        .merge(api::invitations::routes())
        .merge(api::health::routes())
        .with_state(state)
}

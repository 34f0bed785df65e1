//! Shared helpers for lmp-onboard integration tests
#![allow(dead_code)] // not every test binary uses every helper

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use lmp_onboard::config::OnboardConfig;
use lmp_onboard::models::{
    ExtractedOffering, ExtractedPublisher, ExtractedWebsite, ExtractionRequest, ExtractionResult,
};
use lmp_onboard::services::extractor::{ContentExtractor, ExtractorError};
use lmp_onboard::services::invitations::{
    EmailTransport, OutboundEmail, SendReceipt, TransportError,
};
use lmp_onboard::AppState;

/// Extractor stub with a fixed behavior per test.
pub enum StubBehavior {
    Succeed(ExtractionResult),
    Fail,
}

pub struct StubExtractor {
    pub behavior: StubBehavior,
}

#[async_trait]
impl ContentExtractor for StubExtractor {
    async fn extract(
        &self,
        _request: &ExtractionRequest,
    ) -> Result<ExtractionResult, ExtractorError> {
        match &self.behavior {
            StubBehavior::Succeed(result) => Ok(result.clone()),
            StubBehavior::Fail => Err(ExtractorError::Request("extractor unavailable".into())),
        }
    }
}

pub struct StubTransport;

#[async_trait]
impl EmailTransport for StubTransport {
    async fn send(&self, _email: &OutboundEmail) -> Result<SendReceipt, TransportError> {
        Ok(SendReceipt {
            provider_message_id: Some("stub".to_string()),
        })
    }
}

/// In-memory pool pinned to a single connection so every query (including
/// ones from spawned pipeline tasks) sees the same database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    lmp_onboard::db::init_tables(&pool).await.expect("schema");
    pool
}

/// Retry policy with zero delays so exhaustion happens inside a test run.
pub fn fast_retry_config() -> OnboardConfig {
    let mut config = OnboardConfig::default();
    config.retry.base_delay_secs = 0;
    config.retry.max_delay_secs = 0;
    config
}

pub async fn test_state(config: OnboardConfig, behavior: StubBehavior) -> AppState {
    let pool = test_pool().await;
    test_state_with_pool(pool, config, behavior)
}

/// State over an existing pool, for tests that simulate a process restart
/// against the same database.
pub fn test_state_with_pool(
    pool: SqlitePool,
    config: OnboardConfig,
    behavior: StubBehavior,
) -> AppState {
    AppState::new(
        pool,
        config,
        Arc::new(StubExtractor { behavior }),
        Arc::new(StubTransport),
    )
}

/// High-confidence extraction matching a $300 guest post with 48h
/// turnaround on example.com.
pub fn confident_extraction() -> ExtractionResult {
    ExtractionResult {
        publisher: ExtractedPublisher {
            contact_name: Some("Pat Doe".to_string()),
            company_name: Some("Example Media".to_string()),
            confidence: 0.9,
        },
        websites: vec![ExtractedWebsite {
            domain: "https://www.example.com".to_string(),
            confidence: 0.93,
        }],
        offerings: vec![ExtractedOffering {
            offering_type: "guest_post".to_string(),
            base_price_cents: 30000,
            currency: "USD".to_string(),
            turnaround_days: Some(2),
            confidence: 0.9,
        }],
        overall_confidence: 0.91,
    }
}

/// Poll the processing log until it reaches `status` or the deadline hits.
pub async fn wait_for_status(pool: &SqlitePool, log_id: Uuid, status: &str) {
    for _ in 0..200 {
        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM processing_log WHERE id = ?")
                .bind(log_id.to_string())
                .fetch_optional(pool)
                .await
                .expect("status query");
        if current.as_deref() == Some(status) {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
    panic!("log {} never reached status {}", log_id, status);
}

//! Processing log entry: durable record of every inbound email

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of an inbound email through the pipeline.
///
/// Transitions are monotonic (pending → parsed | failed) except for the
/// bounded pending ↔ retrying cycle driven by the retry scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Parsed,
    Retrying,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Parsed => "parsed",
            ProcessingStatus::Retrying => "retrying",
            ProcessingStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ProcessingStatus::Pending),
            "parsed" => Some(ProcessingStatus::Parsed),
            "retrying" => Some(ProcessingStatus::Retrying),
            "failed" => Some(ProcessingStatus::Failed),
            _ => None,
        }
    }
}

/// One row of the processing log. Created on ingestion, mutated only by the
/// pipeline, never deleted. Raw content columns are write-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingLogEntry {
    pub id: Uuid,
    pub webhook_id: Option<String>,
    pub provider: String,
    pub campaign_id: Option<String>,
    pub campaign_name: Option<String>,
    pub campaign_type: Option<String>,
    pub sender_email: String,
    pub recipient_email: Option<String>,
    pub subject: Option<String>,
    pub raw_content: String,
    pub raw_html: Option<String>,
    /// Canonical event JSON persisted before async dispatch
    pub event_json: String,
    pub parsed_data: Option<String>,
    pub confidence: Option<f64>,
    pub status: ProcessingStatus,
    pub attempt_count: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//! Canonical email event
//!
//! Every provider payload is normalized into this one shape before anything
//! downstream sees it. Optional provider fields get defensible defaults here
//! so the pipeline never branches on missing data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical inbound email event, persisted verbatim alongside the log row
/// so retries can be reconstructed without replaying the original request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailEvent {
    /// Provider-assigned event id, or a generated UUID when absent
    pub event_id: String,
    pub campaign: CampaignInfo,
    pub email: EmailMessage,
    pub metadata: EventMetadata,
}

/// Outreach campaign the email belongs to
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// e.g. "guest_post", "link_insertion"; unknown providers leave it None
    #[serde(default)]
    pub campaign_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    pub received_at: DateTime<Utc>,
    pub content: EmailContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailContent {
    pub text: String,
    #[serde(default)]
    pub html: Option<String>,
}

/// Thread-level metadata. Modeled as a closed struct with explicit defaults
/// rather than a free-form JSON bag; unknown provider extras are dropped at
/// the normalizer, which keeps parsing total.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventMetadata {
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub reply_count: u32,
    #[serde(default)]
    pub is_auto_reply: bool,
}

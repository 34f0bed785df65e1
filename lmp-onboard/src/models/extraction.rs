//! Content extractor collaborator contract
//!
//! Request/response types for the external AI extraction step. The
//! extractor itself is a black box; this module pins down only the wire
//! shapes and the confidence conventions ([0,1] per field plus overall).

use serde::{Deserialize, Serialize};

/// Input to the extraction step
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionRequest {
    pub from: String,
    pub subject: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_type: Option<String>,
    /// Website the outreach campaign originally targeted, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_website: Option<String>,
}

/// Structured fields returned by the extraction step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub publisher: ExtractedPublisher,
    #[serde(default)]
    pub websites: Vec<ExtractedWebsite>,
    #[serde(default)]
    pub offerings: Vec<ExtractedOffering>,
    /// Overall trustworthiness of the whole extraction, [0,1]
    pub overall_confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedPublisher {
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedWebsite {
    /// Raw domain as extracted; normalization happens in the matcher/writer
    pub domain: String,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedOffering {
    /// e.g. "guest_post", "link_insertion", "sponsored_post"
    pub offering_type: String,
    /// Integer minor units (cents); $300 is 30000
    pub base_price_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub turnaround_days: Option<i64>,
    #[serde(default)]
    pub confidence: f64,
}

fn default_currency() -> String {
    "USD".to_string()
}

//! Publisher account model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account lifecycle state.
///
/// `Shadow` rows are inferred from email content and owned by nobody.
/// The only legal transition out of `Shadow` is to `Active`, via the claim
/// service; the reverse never happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Shadow,
    Unclaimed,
    Active,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Shadow => "shadow",
            AccountStatus::Unclaimed => "unclaimed",
            AccountStatus::Active => "active",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "shadow" => Some(AccountStatus::Shadow),
            "unclaimed" => Some(AccountStatus::Unclaimed),
            "active" => Some(AccountStatus::Active),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publisher {
    pub id: Uuid,
    pub email: String,
    pub contact_name: Option<String>,
    pub company_name: Option<String>,
    pub account_status: AccountStatus,
    pub invitation_token: Option<String>,
    pub invitation_expires_at: Option<DateTime<Utc>>,
    pub invitation_sent_at: Option<DateTime<Utc>>,
    pub claim_attempts: i64,
    pub last_claim_attempt_at: Option<DateTime<Utc>>,
    pub claimed_at: Option<DateTime<Utc>>,
    /// Extraction confidence the stored contact/company fields came from
    pub confidence: Option<f64>,
    /// Where the row came from, e.g. "email_extraction"
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

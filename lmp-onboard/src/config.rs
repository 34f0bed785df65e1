//! Configuration for lmp-onboard
//!
//! One `OnboardConfig` value is built at startup (TOML file + env
//! overrides) and passed explicitly into the components that need it.
//! Confidence thresholds are versioned policy carried by value, never
//! ambient global state.

use serde::Deserialize;
use std::collections::HashMap;

/// Top-level service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OnboardConfig {
    /// HTTP bind address
    pub bind_address: String,
    /// SQLite database path
    pub database_path: String,
    pub thresholds: ConfidenceThresholds,
    pub retry: RetryPolicy,
    pub security: SecurityConfig,
    pub invitations: InvitationConfig,
    pub claim: ClaimConfig,
    pub extractor: ExtractorConfig,
}

impl Default for OnboardConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5740".to_string(),
            database_path: "linkmart.db".to_string(),
            thresholds: ConfidenceThresholds::default(),
            retry: RetryPolicy::default(),
            security: SecurityConfig::default(),
            invitations: InvitationConfig::default(),
            claim: ClaimConfig::default(),
            extractor: ExtractorConfig::default(),
        }
    }
}

impl OnboardConfig {
    /// Load from `lmp-onboard.toml` / `LMP_ONBOARD_CONFIG`, then apply
    /// individual env overrides for the fields operators most often set.
    pub fn load() -> lmp_common::Result<Self> {
        let mut cfg: OnboardConfig = lmp_common::config::load_toml_config("lmp-onboard")?;

        if let Ok(addr) = std::env::var("LMP_ONBOARD_BIND") {
            cfg.bind_address = addr;
        }
        if let Ok(path) = std::env::var("LMP_ONBOARD_DB") {
            cfg.database_path = path;
        }
        if let Ok(url) = std::env::var("LMP_EXTRACTOR_URL") {
            cfg.extractor.endpoint = Some(url);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> lmp_common::Result<()> {
        self.thresholds.validate()?;
        if self.retry.max_attempts == 0 {
            return Err(lmp_common::Error::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.multiplier < 1.0 {
            return Err(lmp_common::Error::Config(
                "retry.multiplier must be >= 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Confidence routing policy. Versioned so an operator change is visible in
/// logs and in review-queue rows created under the old table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfidenceThresholds {
    pub version: u32,
    /// At or above: commit immediately, no queue
    pub auto_process: f64,
    /// At or above (below auto_process): review with auto-approve timer
    pub timed_review: f64,
    /// At or above (below timed_review): manual review only
    pub manual_review: f64,
    /// Hours until a timed-review entry may auto-approve
    pub auto_approve_hours: i64,
    /// Per-offering floor below which an extracted offering is not written
    pub min_offering_confidence: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            version: 1,
            auto_process: 0.85,
            timed_review: 0.70,
            manual_review: 0.50,
            auto_approve_hours: 24,
            min_offering_confidence: 0.50,
        }
    }
}

impl ConfidenceThresholds {
    pub fn validate(&self) -> lmp_common::Result<()> {
        let ordered = self.manual_review <= self.timed_review
            && self.timed_review <= self.auto_process
            && self.auto_process <= 1.0
            && self.manual_review >= 0.0;
        if !ordered {
            return Err(lmp_common::Error::Config(format!(
                "thresholds must satisfy 0 <= manual_review <= timed_review <= auto_process <= 1 (got {} / {} / {})",
                self.manual_review, self.timed_review, self.auto_process
            )));
        }
        Ok(())
    }
}

/// Exponential backoff policy for the async pipeline
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub base_delay_secs: u64,
    pub multiplier: f64,
    pub max_delay_secs: u64,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_secs: 60,
            multiplier: 2.0,
            max_delay_secs: 3600,
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (1-based): min(base * m^(attempt-1), cap)
    pub fn delay_secs(&self, attempt: u32) -> u64 {
        let exp = attempt.saturating_sub(1) as i32;
        let raw = self.base_delay_secs as f64 * self.multiplier.powi(exp);
        (raw as u64).min(self.max_delay_secs)
    }
}

/// Inbound webhook security settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Per-provider HMAC shared secrets
    pub provider_secrets: HashMap<String, String>,
    /// Reject requests that carry no signature header at all.
    /// Off by default: several outreach providers never sign.
    pub require_signature: bool,
    /// Enforce the timestamp window when the provider supplies one
    pub enforce_timestamp: bool,
    pub timestamp_tolerance_secs: i64,
    /// Allow-listed source CIDR ranges, e.g. "203.0.113.0/24".
    /// Empty means no IP restriction has been configured.
    pub allowed_ip_ranges: Vec<String>,
    /// Test-mode bypass for the IP check
    pub allow_any_ip: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            provider_secrets: HashMap::new(),
            require_signature: false,
            enforce_timestamp: true,
            timestamp_tolerance_secs: 300,
            allowed_ip_ranges: Vec::new(),
            allow_any_ip: false,
        }
    }
}

/// Invitation dispatch settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InvitationConfig {
    /// Base URL the claim link is built from
    pub claim_base_url: String,
    pub from_address: String,
    pub token_ttl_days: i64,
    /// An invitation within this window makes send_invitation a no-op
    pub resend_cooldown_hours: i64,
    /// Bulk send re-selects publishers last invited at least this long ago
    pub reinvite_after_days: i64,
    pub default_batch_size: u32,
    /// Outbound sends per second (provider throughput limit)
    pub sends_per_second: u32,
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self {
            claim_base_url: "https://app.linkmart.io/claim".to_string(),
            from_address: "invites@linkmart.io".to_string(),
            token_ttl_days: 30,
            resend_cooldown_hours: 24,
            reinvite_after_days: 7,
            default_batch_size: 20,
            sends_per_second: 1,
        }
    }
}

/// Claim flow settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClaimConfig {
    pub max_attempts: i64,
    pub lockout_minutes: i64,
    pub redirect_url: String,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_minutes: 30,
            redirect_url: "/publisher/dashboard".to_string(),
        }
    }
}

/// Content extractor collaborator settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// POST endpoint of the extraction service; None means extraction is
    /// unavailable and every email fails into retry/review
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 30,
        }
    }
}

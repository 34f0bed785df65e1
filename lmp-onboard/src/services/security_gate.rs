//! Webhook security gate
//!
//! Three checks, in order: HMAC signature over the raw body, timestamp
//! window, source-IP allowlist. Signature and timestamp are lenient when
//! the provider sends no header at all: several outreach tools never sign,
//! and rejecting them would drop their traffic entirely. That leniency is a
//! recorded trust decision; the IP check has no such escape short of the
//! explicit test-mode bypass.
//!
//! Every verification, pass or fail, writes one immutable security_log row
//! with the first failing reason.

use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use sqlx::SqlitePool;
use std::net::IpAddr;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::SecurityConfig;
use crate::db::security_log;

type HmacSha256 = Hmac<Sha256>;

/// Request metadata the gate inspects. All fields may be absent depending
/// on the provider.
#[derive(Debug, Default)]
pub struct InboundMeta {
    pub signature: Option<String>,
    pub webhook_id: Option<String>,
    pub timestamp: Option<String>,
    pub source_ip: Option<IpAddr>,
}

/// Rejection reasons, machine-readable. `IpNotAllowed` maps to 403, the
/// rest to 401.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecurityRejection {
    #[error("Signature header required but absent")]
    MissingSignature,
    #[error("Signature verification failed")]
    SignatureMismatch,
    #[error("Timestamp outside tolerance window ({0}s skew)")]
    TimestampSkew(i64),
    #[error("Unparsable timestamp header")]
    BadTimestamp,
    #[error("IP not allowed")]
    IpNotAllowed,
}

impl SecurityRejection {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, SecurityRejection::IpNotAllowed)
    }
}

/// Run all checks and record the outcome. The log write happens on both
/// paths before the verdict is returned.
pub async fn verify_and_log(
    pool: &SqlitePool,
    provider: &str,
    meta: &InboundMeta,
    raw_body: &[u8],
    config: &SecurityConfig,
) -> Result<(), SecurityRejection> {
    let verdict = verify(provider, meta, raw_body, config, Utc::now());

    let ip = meta.source_ip.map(|ip| ip.to_string());
    let reason = verdict.as_ref().err().map(|r| r.to_string());
    if let Err(e) = security_log::record(
        pool,
        provider,
        ip.as_deref(),
        meta.webhook_id.as_deref(),
        verdict.is_ok(),
        reason.as_deref(),
    )
    .await
    {
        // The security log is an audit trail, not a gate of its own.
        warn!("Failed to write security log row: {}", e);
    }

    verdict
}

/// Pure verification against a fixed `now`, unit-testable without a pool.
pub fn verify(
    provider: &str,
    meta: &InboundMeta,
    raw_body: &[u8],
    config: &SecurityConfig,
    now: DateTime<Utc>,
) -> Result<(), SecurityRejection> {
    // 1. Signature
    match (&meta.signature, config.provider_secrets.get(provider)) {
        (Some(sig), Some(secret)) => {
            if !signature_matches(secret, raw_body, sig) {
                return Err(SecurityRejection::SignatureMismatch);
            }
        }
        (Some(_), None) => {
            // Signed request, no secret on file: nothing to verify against.
            warn!("Provider {} sent a signature but no secret is configured", provider);
        }
        (None, _) => {
            if config.require_signature {
                return Err(SecurityRejection::MissingSignature);
            }
            debug!("Provider {} sent no signature, tolerated", provider);
        }
    }

    // 2. Timestamp window, only when supplied
    if let Some(raw_ts) = &meta.timestamp {
        if config.enforce_timestamp {
            let sent = parse_timestamp(raw_ts).ok_or(SecurityRejection::BadTimestamp)?;
            let skew = (now - sent).num_seconds().abs();
            if skew > config.timestamp_tolerance_secs {
                return Err(SecurityRejection::TimestampSkew(skew));
            }
        }
    }

    // 3. Source IP
    if !config.allow_any_ip && !config.allowed_ip_ranges.is_empty() {
        let allowed = meta
            .source_ip
            .map(|ip| ip_allowed(ip, &config.allowed_ip_ranges))
            .unwrap_or(false);
        if !allowed {
            return Err(SecurityRejection::IpNotAllowed);
        }
    }

    Ok(())
}

/// Constant-time HMAC-SHA256 check. The header value may be hex or base64.
fn signature_matches(secret: &str, raw_body: &[u8], provided: &str) -> bool {
    let Some(sig_bytes) = decode_signature(provided.trim()) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(raw_body);
    mac.verify_slice(&sig_bytes).is_ok()
}

fn decode_signature(s: &str) -> Option<Vec<u8>> {
    // sha256= prefix used by several providers
    let s = s.strip_prefix("sha256=").unwrap_or(s);

    if s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit()) {
        let mut bytes = Vec::with_capacity(32);
        for i in (0..s.len()).step_by(2) {
            bytes.push(u8::from_str_radix(&s[i..i + 2], 16).ok()?);
        }
        return Some(bytes);
    }

    base64::engine::general_purpose::STANDARD.decode(s).ok()
}

/// Accept RFC3339 or unix seconds.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// True if `ip` falls inside any of the CIDR ranges. A bare address is
/// treated as a /32 (or /128) range. Malformed entries are skipped.
fn ip_allowed(ip: IpAddr, ranges: &[String]) -> bool {
    ranges.iter().any(|range| ip_in_range(ip, range))
}

fn ip_in_range(ip: IpAddr, range: &str) -> bool {
    let (base, prefix) = match range.split_once('/') {
        Some((base, len)) => {
            let Ok(len) = len.parse::<u32>() else { return false };
            (base, len)
        }
        None => (range, u32::MAX), // full-length mask, fixed below
    };

    let Ok(base_ip) = base.parse::<IpAddr>() else { return false };

    match (ip, base_ip) {
        (IpAddr::V4(ip), IpAddr::V4(base)) => {
            let prefix = prefix.min(32);
            if prefix == 0 {
                return true;
            }
            let mask = u32::MAX << (32 - prefix);
            (u32::from(ip) & mask) == (u32::from(base) & mask)
        }
        (IpAddr::V6(ip), IpAddr::V6(base)) => {
            let prefix = prefix.min(128);
            if prefix == 0 {
                return true;
            }
            let mask = u128::MAX << (128 - prefix);
            (u128::from(ip) & mask) == (u128::from(base) & mask)
        }
        _ => false,
    }
}

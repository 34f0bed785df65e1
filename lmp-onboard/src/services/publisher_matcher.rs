//! Publisher matcher
//!
//! Deduplicates parsed emails against existing accounts before anything is
//! written. Precedence:
//!
//! 1. exact sender-email match, restricted to active/unclaimed accounts.
//!    Shadow rows are deliberately excluded so an automated write can never
//!    silently fork a claimed identity out of a shadow one
//! 2. normalized-domain match between the parsed websites and known website
//!    rows, following publisher↔website links to an indirect owner;
//!    active/unclaimed owners win over shadow owners
//!
//! Read-only and deterministic: same database state and input, same answer.

use lmp_common::domain::normalize_domain;
use lmp_common::Result;
use sqlx::SqlitePool;

use crate::db::{publishers, websites};
use crate::models::{AccountStatus, ExtractedWebsite, Publisher};

/// How a match was made, recorded in the automation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    ExactEmail,
    NormalizedDomain,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::ExactEmail => "exact_email",
            MatchMethod::NormalizedDomain => "normalized_domain",
        }
    }
}

#[derive(Debug)]
pub struct MatchOutcome {
    pub publisher: Publisher,
    pub method: MatchMethod,
}

/// Find the existing publisher this email belongs to, if any.
pub async fn find_existing(
    pool: &SqlitePool,
    sender_email: &str,
    parsed_websites: &[ExtractedWebsite],
) -> Result<Option<MatchOutcome>> {
    // (1) exact email, non-shadow only
    if let Some(publisher) = publishers::find_by_email_in_statuses(
        pool,
        sender_email,
        &[AccountStatus::Active, AccountStatus::Unclaimed],
    )
    .await?
    {
        return Ok(Some(MatchOutcome {
            publisher,
            method: MatchMethod::ExactEmail,
        }));
    }

    // (2) normalized domain, indirect owner
    let mut shadow_fallback: Option<Publisher> = None;
    for parsed in parsed_websites {
        let Some(domain) = normalize_domain(&parsed.domain) else {
            continue;
        };
        let Some(website_id) = websites::find_by_domain(pool, &domain).await? else {
            continue;
        };

        for publisher_id in websites::linked_publisher_ids(pool, website_id).await? {
            let Some(publisher) = publishers::find_by_id(pool, publisher_id).await? else {
                continue;
            };
            match publisher.account_status {
                AccountStatus::Active | AccountStatus::Unclaimed => {
                    return Ok(Some(MatchOutcome {
                        publisher,
                        method: MatchMethod::NormalizedDomain,
                    }));
                }
                AccountStatus::Shadow => {
                    if shadow_fallback.is_none() {
                        shadow_fallback = Some(publisher);
                    }
                }
            }
        }
    }

    Ok(shadow_fallback.map(|publisher| MatchOutcome {
        publisher,
        method: MatchMethod::NormalizedDomain,
    }))
}

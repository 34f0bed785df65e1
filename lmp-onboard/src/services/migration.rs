//! Migration engine
//!
//! Promotes everything a publisher accumulated while shadow (websites and
//! offerings) into the active inventory right after a successful claim.
//! Per-item failures are collected and reported, never propagated: the
//! claim already succeeded and a partial promotion must not undo a login.

use lmp_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{automation_log, offerings, websites};

/// Outcome of a promotion run, surfaced informationally in the claim
/// response.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub websites_migrated: usize,
    pub offerings_activated: usize,
    pub errors: Vec<String>,
}

/// Promote all shadow-owned inventory of a just-activated publisher.
pub async fn migrate(pool: &SqlitePool, publisher_id: Uuid) -> MigrationReport {
    let mut report = MigrationReport::default();

    match websites::shadow_websites_of(pool, publisher_id).await {
        Ok(ids) => {
            for website_id in ids {
                match websites::mark_active(pool, website_id).await {
                    Ok(()) => report.websites_migrated += 1,
                    Err(e) => report
                        .errors
                        .push(format!("website {}: {}", website_id, e)),
                }
            }
        }
        Err(e) => report.errors.push(format!("website scan: {}", e)),
    }

    match offerings::shadow_offerings_of(pool, publisher_id).await {
        Ok(ids) => {
            for offering_id in ids {
                match offerings::mark_active(pool, offering_id).await {
                    Ok(()) => report.offerings_activated += 1,
                    Err(e) => report
                        .errors
                        .push(format!("offering {}: {}", offering_id, e)),
                }
            }
        }
        Err(e) => report.errors.push(format!("offering scan: {}", e)),
    }

    if report.errors.is_empty() {
        info!(
            "Migrated publisher {}: {} websites, {} offerings",
            publisher_id, report.websites_migrated, report.offerings_activated
        );
    } else {
        warn!(
            "Partial migration for publisher {}: {} websites, {} offerings, {} errors",
            publisher_id,
            report.websites_migrated,
            report.offerings_activated,
            report.errors.len()
        );
    }

    let _ = record_audit(pool, publisher_id, &report).await;

    report
}

async fn record_audit(pool: &SqlitePool, publisher_id: Uuid, report: &MigrationReport) -> Result<()> {
    automation_log::record(
        pool,
        Some(publisher_id),
        None,
        "migrate_shadow_inventory",
        None,
        1.0,
        &serde_json::json!({
            "websites_migrated": report.websites_migrated,
            "offerings_activated": report.offerings_activated,
            "errors": report.errors,
        }),
    )
    .await
}

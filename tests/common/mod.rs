// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::time::Duration;

use anyhow::Result;
use chrono::{Datelike, Utc};
use saldo::application::{LedgerService, ReportingService};
use saldo::cache::ReportCache;
use saldo::{Repository, ReportPeriod};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to create ledger + reporting services over one database
pub async fn test_services(
    cache_ttl: Duration,
) -> Result<(LedgerService, ReportingService, TempDir)> {
    let (ledger, temp_dir) = test_service().await?;
    let cache = ReportCache::new(cache_ttl);
    let reporting = ReportingService::new(ledger.repository().clone(), cache);
    Ok((ledger, reporting, temp_dir))
}

/// The most recent closed month: reports are only served for months that
/// are over.
pub fn last_month() -> ReportPeriod {
    let now = Utc::now();
    if now.month() == 1 {
        ReportPeriod::new(now.year() - 1, 12).unwrap()
    } else {
        ReportPeriod::new(now.year(), now.month() - 1).unwrap()
    }
}

/// Rewrite every order's creation timestamp into the given period, so a
/// closed month has data to report on without waiting for one.
pub async fn backdate_orders(repo: &Repository, period: ReportPeriod) -> Result<()> {
    let stamp = format!("{:04}-{:02}-15T12:00:00.000Z", period.year, period.month);
    sqlx::query("UPDATE orders SET created_at = ?")
        .bind(&stamp)
        .execute(repo.pool())
        .await?;
    Ok(())
}

use chrono::Utc;
use tracing::info;

use crate::cache::ReportCache;
use crate::domain::{render_report_csv, ReportPeriod};
use crate::storage::Repository;

use super::AppError;

/// Read-side reporting over paid orders: how much each service earned in
/// a month, as a CSV artifact. Sits beside the transactional path, never
/// inside it — a stale cache can only cost a recomputation, never a wrong
/// balance.
pub struct ReportingService {
    repo: Repository,
    cache: ReportCache,
}

impl ReportingService {
    pub fn new(repo: Repository, cache: ReportCache) -> Self {
        Self { repo, cache }
    }

    pub fn cache(&self) -> &ReportCache {
        &self.cache
    }

    /// The monthly per-service report for a closed month.
    ///
    /// The current and future months are rejected as not yet available.
    /// On a cache miss the aggregation runs, is rendered deterministically
    /// and cached; a month with no paid orders is reported as not found
    /// and deliberately not cached as empty.
    pub async fn monthly_report(&self, period: ReportPeriod) -> Result<Vec<u8>, AppError> {
        if !period.is_closed(Utc::now()) {
            return Err(AppError::ReportNotAvailable(period));
        }

        let key = period.cache_key();
        if let Some(bytes) = self.cache.get(&key) {
            return Ok(bytes);
        }

        let mut conn = self.repo.acquire().await?;
        let rows = Repository::paid_amount_by_service(&mut conn, period).await?;
        if rows.is_empty() {
            return Err(AppError::ReportNotFound(period));
        }

        let bytes = render_report_csv(&rows)?;
        self.cache.set(&key, bytes.clone());
        info!(%period, services = rows.len(), "computed monthly report");

        Ok(bytes)
    }
}

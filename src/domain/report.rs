use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, ServiceId};

/// A calendar month a report can be requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub year: i32,
    pub month: u32,
}

impl ReportPeriod {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Cache key for this period, stable across processes.
    pub fn cache_key(&self) -> String {
        format!("{}-{:02}", self.year, self.month)
    }

    /// A month is reportable only once it is over: the current and any
    /// future month are still accumulating paid orders.
    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        (self.year, self.month) < (now.year(), now.month())
    }
}

impl std::fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// One aggregated report row: total paid amount for a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAmount {
    pub service_id: ServiceId,
    pub amount: Cents,
}

/// Render report rows as the CSV artifact: a `service_id,amount` header,
/// one row per service, ascending by service id, plain decimal integers.
/// Rows are re-sorted here so the output is deterministic no matter how
/// the aggregation produced them.
pub fn render_report_csv(rows: &[ServiceAmount]) -> Result<Vec<u8>> {
    let mut sorted: Vec<ServiceAmount> = rows.to_vec();
    sorted.sort_by_key(|row| row.service_id);

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["service_id", "amount"])
        .context("write report header")?;
    for row in &sorted {
        writer
            .write_record([row.service_id.to_string(), row.amount.to_string()])
            .context("write report row")?;
    }

    writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("flush report bytes: {err}"))
}

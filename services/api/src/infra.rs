use chrono::{NaiveDate, NaiveTime};
use metrics_exporter_prometheus::PrometheusHandle;
use ndis_coord::error::AppError;
use ndis_coord::workflows::coordination::{RateSchedule, RateTable};
use std::fs::File;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Start of the 2025-26 award year.
pub(crate) fn standard_effective_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 1).unwrap_or_default()
}

/// Standard SCHADS table, optionally overlaid with classifications from a CSV file.
pub(crate) fn load_rate_schedule(rates_csv: Option<&Path>) -> Result<RateSchedule, AppError> {
    let mut table = RateTable::schads_standard(standard_effective_date());

    if let Some(path) = rates_csv {
        let file = File::open(path)?;
        let imported = table.import_classifications(file)?;
        info!(path = %path.display(), imported, "rate classifications imported");
    }

    Ok(RateSchedule::single(table))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    let raw_trimmed = raw.trim();
    NaiveTime::parse_from_str(raw_trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw_trimmed, "%H:%M:%S"))
        .map_err(|err| format!("failed to parse '{raw}' as HH:MM ({err})"))
}

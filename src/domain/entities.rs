//! Domain entities. Pure data structures for the core business.
//!
//! No HTTP/SQL types here; these are mapped from adapters.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One auto-adjusted daily bar for a ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
    /// Cash dividend paid on this date (0.0 when none).
    pub dividends: f64,
    /// Split ratio effective on this date (0.0 when none).
    pub stock_splits: f64,
}

/// Downloaded history for a single ticker, oldest bar first.
#[derive(Debug, Clone)]
pub struct TickerHistory {
    pub symbol: String,
    pub bars: Vec<PriceBar>,
}

/// Written next to the ticker CSVs after each refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSummary {
    pub last_updated: DateTime<Utc>,
    pub total_tickers: usize,
    pub successful_downloads: usize,
    pub failed_downloads: usize,
}

impl UpdateSummary {
    /// True when the counts match; the timestamp is ignored.
    pub fn same_counts(&self, other: &UpdateSummary) -> bool {
        self.total_tickers == other.total_tickers
            && self.successful_downloads == other.successful_downloads
            && self.failed_downloads == other.failed_downloads
    }
}

/// What a refresh step reports back to the job.
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    /// Number of files rewritten (None when the refresh is an opaque external command).
    pub files_written: Option<usize>,
    pub succeeded: usize,
    pub failed: usize,
}

/// Result of one scheduled update job run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    /// Whether the financial-data directory had uncommitted changes after refresh.
    pub changed: bool,
    /// Commit id created on the development branch, if any.
    pub commit: Option<String>,
    /// Whether the development branch was merged into the stable branch.
    pub merged: bool,
}

/// Persisted record of the last job run (used by the scheduler and `job status`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// None when the run failed.
    pub outcome: Option<JobOutcome>,
    pub error: Option<String>,
}

/// One raw row loaded from the energy database.
///
/// `value` is the commodity's primary measure: price for natural gas and crude
/// oil, demand in MW for electricity, storage level for storage series.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub at: NaiveDateTime,
    pub value: Option<f64>,
    pub volume: Option<f64>,
    pub region: Option<String>,
}

impl Observation {
    pub fn daily(date: NaiveDate, value: Option<f64>) -> Self {
        Self {
            at: date.and_hms_opt(0, 0, 0).unwrap_or_default(),
            value,
            volume: None,
            region: None,
        }
    }
}

/// Rolling-window summary used as a model feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RollingStats {
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// An observation enriched by the processing pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub at: NaiveDateTime,
    pub region: Option<String>,
    pub value: Option<f64>,
    pub volume: Option<f64>,

    pub daily_return: Option<f64>,
    pub log_return: Option<f64>,

    pub ma_7: Option<f64>,
    pub ma_30: Option<f64>,
    pub ma_90: Option<f64>,
    pub volatility_30: Option<f64>,
    pub rsi: Option<f64>,

    pub year: i32,
    pub month: u32,
    pub day_of_year: u32,
    pub week_of_year: u32,
    /// Monday = 0.
    pub day_of_week: u32,
    pub is_summer: bool,
    pub is_winter: bool,
    pub is_shoulder: bool,

    /// Lagged value keyed by lag (1, 7, 30).
    pub lags: BTreeMap<u32, Option<f64>>,
    /// Rolling statistics keyed by window (7, 30, 90).
    pub rolling: BTreeMap<u32, RollingStats>,
}

impl ProcessedRecord {
    pub fn from_observation(obs: &Observation) -> Self {
        Self {
            at: obs.at,
            region: obs.region.clone(),
            value: obs.value,
            volume: obs.volume,
            ..Default::default()
        }
    }

    pub fn lag(&self, lag: u32) -> Option<f64> {
        self.lags.get(&lag).copied().flatten()
    }
}

/// Metadata row of the model registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredModel {
    pub model_id: String,
    pub model_name: String,
    pub model_type: String,
    pub commodity: Option<String>,
    pub created_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub performance_metrics: BTreeMap<String, f64>,
    /// Serialized model file, if the model was saved.
    pub model_path: Option<String>,
    pub is_active: bool,
}

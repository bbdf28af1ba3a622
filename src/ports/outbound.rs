//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{
    Commodity, CrudeOilPrice, DomainError, JobRecord, NaturalGasPrice, Observation, PowerDemand,
    PriceBar, ProcessedRecord, RefreshReport, RegisteredModel, SeriesPoint, StorageLevel,
    TableInfo, Ticker, TickerHistory, UpdateSummary,
};
use chrono::NaiveDate;
use std::path::Path;

/// Historical market data provider (Yahoo chart API).
#[async_trait::async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Fetch daily, auto-adjusted bars for `symbol` over `period` (e.g. "2y").
    /// An empty `bars` vector means the provider has no data for the symbol.
    async fn fetch_history(&self, symbol: &str, period: &str)
        -> Result<TickerHistory, DomainError>;
}

/// EIA open-data series provider.
#[async_trait::async_trait]
pub trait EnergySeriesPort: Send + Sync {
    /// Fetch a series by its legacy id (e.g. "NG.RNGWHHD.D"), optionally bounded.
    async fn fetch_series(
        &self,
        series_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<SeriesPoint>, DomainError>;
}

/// Ticker CSV files and the update summary under the market-data directory.
#[async_trait::async_trait]
pub trait DatasetPort: Send + Sync {
    /// Create the output directory if needed.
    async fn ensure_dir(&self) -> Result<(), DomainError>;

    /// Write the ticker's CSV. Returns true when the file content changed.
    async fn write_ticker(&self, ticker: &Ticker, bars: &[PriceBar]) -> Result<bool, DomainError>;

    /// Read a ticker's bars back (oldest first). Missing file is an error.
    async fn read_ticker(&self, ticker: &Ticker) -> Result<Vec<PriceBar>, DomainError>;

    async fn read_summary(&self) -> Result<Option<UpdateSummary>, DomainError>;

    async fn write_summary(&self, summary: &UpdateSummary) -> Result<(), DomainError>;
}

/// Energy database: raw EIA tables, processed tables, schema introspection.
#[async_trait::async_trait]
pub trait EnergyStorePort: Send + Sync {
    async fn save_natural_gas(&self, rows: &[NaturalGasPrice]) -> Result<usize, DomainError>;
    async fn save_crude_oil(&self, rows: &[CrudeOilPrice]) -> Result<usize, DomainError>;
    async fn save_power_demand(&self, rows: &[PowerDemand]) -> Result<usize, DomainError>;
    async fn save_storage(&self, rows: &[StorageLevel]) -> Result<usize, DomainError>;

    /// Raw observations for a commodity, oldest first. Missing table yields an empty vec.
    async fn load_observations(&self, commodity: &Commodity)
        -> Result<Vec<Observation>, DomainError>;

    /// Replace `<commodity>_processed` with `records`.
    async fn replace_processed(
        &self,
        commodity: &Commodity,
        records: &[ProcessedRecord],
    ) -> Result<(), DomainError>;

    async fn load_processed(&self, commodity: &Commodity)
        -> Result<Vec<ProcessedRecord>, DomainError>;

    async fn table_info(&self, table: &str) -> Result<TableInfo, DomainError>;
}

/// Persistent model registry.
#[async_trait::async_trait]
pub trait ModelRegistryPort: Send + Sync {
    async fn register(&self, model: &RegisteredModel) -> Result<(), DomainError>;
    async fn get(&self, model_id: &str) -> Result<Option<RegisteredModel>, DomainError>;
    /// All models, or those whose name starts with `prefix`. Newest first.
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<RegisteredModel>, DomainError>;
}

/// The data-refresh step of the scheduled job.
#[async_trait::async_trait]
pub trait RefreshPort: Send + Sync {
    /// Short label for logs (e.g. "built-in yfinance refresh").
    fn describe(&self) -> String;

    async fn refresh(&self) -> Result<RefreshReport, DomainError>;
}

/// Commit author used by the update job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

/// Version control of the repository the job commits into.
#[async_trait::async_trait]
pub trait VcsPort: Send + Sync {
    /// Check out `branch` and bring it up to date with the remote when pushing is enabled.
    /// A merge left unfinished by an earlier run is aborted first.
    async fn prepare(&self, branch: &str) -> Result<(), DomainError>;

    /// Paths with uncommitted changes (including untracked files) under `path`.
    async fn changed_paths(&self, path: &Path) -> Result<Vec<String>, DomainError>;

    /// Stage everything under `path` and nothing else.
    async fn stage(&self, path: &Path) -> Result<(), DomainError>;

    /// Commit the staged changes under `path` only. Returns the new commit id.
    async fn commit(
        &self,
        path: &Path,
        message: &str,
        identity: &CommitIdentity,
    ) -> Result<String, DomainError>;

    async fn push(&self, branch: &str) -> Result<(), DomainError>;

    /// Merge `from` into `into`, push `into`, and check `from` out again.
    async fn merge(&self, from: &str, into: &str, identity: &CommitIdentity)
        -> Result<(), DomainError>;
}

/// Job state. Last run record for scheduling and status.
#[async_trait::async_trait]
pub trait StatePort: Send + Sync {
    async fn last_run(&self) -> Result<Option<JobRecord>, DomainError>;

    async fn record_run(&self, record: JobRecord) -> Result<(), DomainError>;
}

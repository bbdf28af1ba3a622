//! Core domain layer. No external I/O dependencies.
//!
//! Entities, the ticker catalog, and pure numeric routines live here.

pub mod commodity;
pub mod energy;
pub mod entities;
pub mod errors;
pub mod forecast;
pub mod risk;
pub mod series;
pub mod tickers;

pub use commodity::Commodity;
pub use energy::{
    ColumnInfo, CrudeOilPrice, NaturalGasPrice, PowerDemand, SeriesPoint, StorageLevel, TableInfo,
};
pub use entities::{
    JobOutcome, JobRecord, Observation, PriceBar, ProcessedRecord, RefreshReport, RegisteredModel,
    RollingStats, TickerHistory, UpdateSummary,
};
pub use errors::DomainError;
pub use tickers::{Ticker, TICKERS};

//! Persistence adapters. Ticker CSVs, job state file, SQLite energy store.

pub mod atomic;
pub mod csv_dataset;
pub mod sqlite_store;
pub mod state_json;

pub use csv_dataset::CsvDataset;
pub use sqlite_store::SqliteStore;
pub use state_json::StateJson;

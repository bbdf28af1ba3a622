//! Rows of the energy database and EIA series points.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

/// One point of an EIA series. Daily/weekly series carry midnight timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub period: NaiveDateTime,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NaturalGasPrice {
    pub date: NaiveDate,
    pub price: Option<f64>,
    pub volume: Option<f64>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrudeOilPrice {
    pub date: NaiveDate,
    pub wti_price: Option<f64>,
    pub brent_price: Option<f64>,
    pub volume: Option<f64>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PowerDemand {
    pub datetime: NaiveDateTime,
    pub region: String,
    pub demand_mw: Option<f64>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageLevel {
    pub date: NaiveDate,
    pub commodity: String,
    pub storage_level: Option<f64>,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableInfo {
    pub exists: bool,
    pub columns: Vec<ColumnInfo>,
    pub row_count: u64,
}

impl TableInfo {
    pub fn missing() -> Self {
        Self {
            exists: false,
            columns: Vec::new(),
            row_count: 0,
        }
    }
}

//! Implements DatasetPort. One CSV per ticker plus `update_summary.json`.
//!
//! Files are rewritten only when their bytes change, so refreshing identical
//! upstream data leaves the working tree clean.

use super::atomic::write_if_changed;
use crate::domain::{DomainError, PriceBar, Ticker, UpdateSummary};
use crate::ports::DatasetPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

pub const SUMMARY_FILE: &str = "update_summary.json";
const HEADER: [&str; 10] = [
    "Date",
    "Open",
    "High",
    "Low",
    "Close",
    "Volume",
    "Dividends",
    "Stock Splits",
    "Ticker",
    "Name",
];

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open")]
    open: Option<f64>,
    #[serde(rename = "High")]
    high: Option<f64>,
    #[serde(rename = "Low")]
    low: Option<f64>,
    #[serde(rename = "Close")]
    close: Option<f64>,
    #[serde(rename = "Volume")]
    volume: Option<f64>,
    #[serde(rename = "Dividends", default)]
    dividends: Option<f64>,
    #[serde(rename = "Stock Splits", default)]
    stock_splits: Option<f64>,
}

/// CSV dataset rooted at the market-data directory (e.g. data/financial/yfinance).
pub struct CsvDataset {
    dir: PathBuf,
}

impl CsvDataset {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ticker_path(&self, ticker: &Ticker) -> PathBuf {
        self.dir.join(ticker.file_name())
    }
}

fn opt(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

/// Serialize bars with the ticker's symbol and display name on every row.
pub fn bars_to_csv(ticker: &Ticker, bars: &[PriceBar]) -> Result<Vec<u8>, csv::Error> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(HEADER)?;
    for bar in bars {
        wtr.write_record([
            bar.date.format("%Y-%m-%d").to_string(),
            opt(bar.open),
            opt(bar.high),
            opt(bar.low),
            opt(bar.close),
            bar.volume.map(|v| v.to_string()).unwrap_or_default(),
            bar.dividends.to_string(),
            bar.stock_splits.to_string(),
            ticker.symbol.to_string(),
            ticker.name.to_string(),
        ])?;
    }
    wtr.flush()?;
    wtr.into_inner()
        .map_err(|e| csv::Error::from(std::io::Error::other(e.to_string())))
}

/// Parse a ticker CSV. Accepts plain dates and pandas-style timestamps
/// (`2024-01-02 00:00:00-05:00`).
pub fn bars_from_csv(bytes: &[u8]) -> Result<Vec<PriceBar>, DomainError> {
    let mut rdr = csv::Reader::from_reader(bytes);
    let mut bars = Vec::new();
    for (line, row) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = row.map_err(|e| DomainError::Store(format!("csv row {}: {}", line + 2, e)))?;
        let date = NaiveDate::parse_from_str(row.date.get(..10).unwrap_or(&row.date), "%Y-%m-%d")
            .map_err(|e| DomainError::Store(format!("csv row {}: date: {}", line + 2, e)))?;
        bars.push(PriceBar {
            date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume.map(|v| v.max(0.0).round() as u64),
            dividends: row.dividends.unwrap_or(0.0),
            stock_splits: row.stock_splits.unwrap_or(0.0),
        });
    }
    Ok(bars)
}

#[async_trait::async_trait]
impl DatasetPort for CsvDataset {
    async fn ensure_dir(&self) -> Result<(), DomainError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| DomainError::Store(format!("create {}: {}", self.dir.display(), e)))
    }

    async fn write_ticker(&self, ticker: &Ticker, bars: &[PriceBar]) -> Result<bool, DomainError> {
        let bytes = bars_to_csv(ticker, bars)
            .map_err(|e| DomainError::Store(format!("{}: encode csv: {}", ticker.symbol, e)))?;
        let path = self.ticker_path(ticker);
        let changed = write_if_changed(&path, &bytes).await?;
        if changed {
            info!(path = %path.display(), rows = bars.len(), "saved ticker data");
        }
        Ok(changed)
    }

    async fn read_ticker(&self, ticker: &Ticker) -> Result<Vec<PriceBar>, DomainError> {
        let path = self.ticker_path(ticker);
        let bytes = fs::read(&path)
            .await
            .map_err(|e| DomainError::Store(format!("read {}: {}", path.display(), e)))?;
        bars_from_csv(&bytes)
    }

    async fn read_summary(&self) -> Result<Option<UpdateSummary>, DomainError> {
        match fs::read_to_string(self.dir.join(SUMMARY_FILE)).await {
            Ok(s) => Ok(serde_json::from_str(&s).ok()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DomainError::Store(format!("read summary: {}", e))),
        }
    }

    async fn write_summary(&self, summary: &UpdateSummary) -> Result<(), DomainError> {
        let json = serde_json::to_string_pretty(summary)
            .map_err(|e| DomainError::Store(e.to_string()))?;
        let path = self.dir.join(SUMMARY_FILE);
        write_if_changed(&path, json.as_bytes()).await?;
        info!(path = %path.display(), "update summary saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tickers::find_ticker;

    fn bar(day: u32, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: Some(close - 1.0),
            high: Some(close + 1.0),
            low: None,
            close: Some(close),
            volume: Some(1200),
            dividends: 0.0,
            stock_splits: 0.0,
        }
    }

    #[test]
    fn test_csv_layout() {
        let ticker = find_ticker("XOP").unwrap();
        let bytes = bars_to_csv(ticker, &[bar(2, 130.25)]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Date,Open,High,Low,Close,Volume,Dividends,Stock Splits,Ticker,Name"
        );
        assert_eq!(
            lines.next().unwrap(),
            "2024-01-02,129.25,131.25,,130.25,1200,0,0,XOP,SPDR S&P Oil & Gas Exploration & Production ETF"
        );
    }

    #[test]
    fn test_reads_pandas_timestamps() {
        let csv = "Date,Open,High,Low,Close,Volume,Dividends,Stock Splits,Ticker,Name\n\
                   2024-01-02 00:00:00-05:00,1.0,2.0,0.5,1.5,100,0.0,0.0,UNG,United States Natural Gas Fund\n";
        let bars = bars_from_csv(csv.as_bytes()).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, Some(1.5));
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[tokio::test]
    async fn test_write_ticker_reports_changes() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = CsvDataset::new(dir.path().join("yfinance"));
        dataset.ensure_dir().await.unwrap();
        let ticker = find_ticker("CL=F").unwrap();

        assert!(dataset.write_ticker(ticker, &[bar(2, 70.0)]).await.unwrap());
        assert!(!dataset.write_ticker(ticker, &[bar(2, 70.0)]).await.unwrap());
        assert!(dataset
            .write_ticker(ticker, &[bar(2, 70.0), bar(3, 71.0)])
            .await
            .unwrap());
        assert!(dir.path().join("yfinance/CL_F.csv").exists());

        let back = dataset.read_ticker(ticker).await.unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[1].close, Some(71.0));
    }

    #[tokio::test]
    async fn test_summary_round_trip_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = CsvDataset::new(dir.path());
        assert!(dataset.read_summary().await.unwrap().is_none());
        let summary = UpdateSummary {
            last_updated: chrono::Utc::now(),
            total_tickers: 20,
            successful_downloads: 19,
            failed_downloads: 1,
        };
        dataset.write_summary(&summary).await.unwrap();
        assert_eq!(dataset.read_summary().await.unwrap(), Some(summary));
    }
}

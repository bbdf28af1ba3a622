//! Built-in data refresh: download every catalog ticker and write its CSV.
//!
//! - A ticker with no bars or a failed request is counted as failed; the rest continue
//! - CSVs are only rewritten when their content changes
//! - The summary is rewritten only when a CSV changed or the counts moved

use crate::domain::{DomainError, RefreshReport, TICKERS, Ticker, UpdateSummary};
use crate::ports::{DatasetPort, MarketDataPort, RefreshPort};
use chrono::Utc;
use indicatif::ProgressBar;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct MarketUpdateService {
    market: Arc<dyn MarketDataPort>,
    dataset: Arc<dyn DatasetPort>,
    period: String,
    tickers: &'static [Ticker],
    progress: Option<ProgressBar>,
}

impl MarketUpdateService {
    pub fn new(
        market: Arc<dyn MarketDataPort>,
        dataset: Arc<dyn DatasetPort>,
        period: impl Into<String>,
    ) -> Self {
        Self {
            market,
            dataset,
            period: period.into(),
            tickers: TICKERS,
            progress: None,
        }
    }

    pub fn with_tickers(mut self, tickers: &'static [Ticker]) -> Self {
        self.tickers = tickers;
        self
    }

    /// Advance `bar` once per ticker (interactive runs only).
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Download and save one ticker. Ok(None) means the provider returned no bars.
    async fn update_ticker(&self, ticker: &Ticker) -> Result<Option<bool>, DomainError> {
        let history = self.market.fetch_history(ticker.symbol, &self.period).await?;
        if history.bars.is_empty() {
            return Ok(None);
        }
        let changed = self.dataset.write_ticker(ticker, &history.bars).await?;
        Ok(Some(changed))
    }

    pub async fn update_all(&self) -> Result<RefreshReport, DomainError> {
        self.dataset.ensure_dir().await?;
        info!(tickers = self.tickers.len(), period = %self.period, "starting market data update");

        let mut succeeded = 0usize;
        let mut failed = 0usize;
        let mut files_written = 0usize;

        for ticker in self.tickers {
            if let Some(pb) = &self.progress {
                pb.set_message(ticker.symbol);
            }
            match self.update_ticker(ticker).await {
                Ok(Some(changed)) => {
                    succeeded += 1;
                    if changed {
                        files_written += 1;
                    }
                }
                Ok(None) => {
                    failed += 1;
                    warn!(symbol = ticker.symbol, "no data found");
                }
                Err(e) => {
                    failed += 1;
                    error!(symbol = ticker.symbol, error = %e, "error downloading ticker");
                }
            }
            if let Some(pb) = &self.progress {
                pb.inc(1);
            }
        }

        let summary = UpdateSummary {
            last_updated: Utc::now(),
            total_tickers: self.tickers.len(),
            successful_downloads: succeeded,
            failed_downloads: failed,
        };
        let previous = self.dataset.read_summary().await.unwrap_or(None);
        let summary_stale = previous.is_none_or(|p| !p.same_counts(&summary));
        if files_written > 0 || summary_stale {
            self.dataset.write_summary(&summary).await?;
            files_written += 1;
        } else {
            info!("data unchanged, keeping existing summary");
        }

        if let Some(pb) = &self.progress {
            pb.finish_with_message("done");
        }
        info!(succeeded, failed, files_written, "market data update completed");
        Ok(RefreshReport {
            files_written: Some(files_written),
            succeeded,
            failed,
        })
    }
}

#[async_trait::async_trait]
impl RefreshPort for MarketUpdateService {
    fn describe(&self) -> String {
        format!("built-in market refresh ({} tickers, {})", self.tickers.len(), self.period)
    }

    async fn refresh(&self) -> Result<RefreshReport, DomainError> {
        self.update_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::CsvDataset;
    use crate::domain::{PriceBar, TickerHistory};
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::Mutex;

    static TEST_TICKERS: &[Ticker] = &[
        Ticker {
            symbol: "USO",
            name: "United States Oil Fund",
        },
        Ticker {
            symbol: "NG=F",
            name: "Natural Gas Futures",
        },
        Ticker {
            symbol: "BAD",
            name: "Delisted",
        },
    ];

    struct FakeMarket {
        closes: Mutex<HashMap<&'static str, f64>>,
    }

    #[async_trait::async_trait]
    impl MarketDataPort for FakeMarket {
        async fn fetch_history(
            &self,
            symbol: &str,
            _period: &str,
        ) -> Result<TickerHistory, DomainError> {
            let close = self.closes.lock().unwrap().get(symbol).copied();
            match close {
                Some(c) => Ok(TickerHistory {
                    symbol: symbol.to_string(),
                    bars: vec![PriceBar {
                        date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                        open: Some(c),
                        high: Some(c),
                        low: Some(c),
                        close: Some(c),
                        volume: Some(10),
                        dividends: 0.0,
                        stock_splits: 0.0,
                    }],
                }),
                None if symbol == "BAD" => Err(DomainError::MarketData("boom".into())),
                None => Ok(TickerHistory {
                    symbol: symbol.to_string(),
                    bars: vec![],
                }),
            }
        }
    }

    fn service(dir: &std::path::Path, market: Arc<FakeMarket>) -> MarketUpdateService {
        MarketUpdateService::new(market, Arc::new(CsvDataset::new(dir)), "2y")
            .with_tickers(TEST_TICKERS)
    }

    #[tokio::test]
    async fn test_counts_failures_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let market = Arc::new(FakeMarket {
            closes: Mutex::new(HashMap::from([("USO", 70.0)])),
        });
        let report = service(dir.path(), market).update_all().await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 2);
        assert!(dir.path().join("USO.csv").exists());
        assert!(!dir.path().join("NG_F.csv").exists());

        let summary: UpdateSummary = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("update_summary.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(summary.total_tickers, 3);
        assert_eq!(summary.failed_downloads, 2);
    }

    #[tokio::test]
    async fn test_identical_rerun_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let market = Arc::new(FakeMarket {
            closes: Mutex::new(HashMap::from([("USO", 70.0), ("NG=F", 2.5)])),
        });
        let svc = service(dir.path(), Arc::clone(&market));
        let first = svc.update_all().await.unwrap();
        assert_eq!(first.files_written, Some(3));
        let summary_before = std::fs::read(dir.path().join("update_summary.json")).unwrap();

        let second = svc.update_all().await.unwrap();
        assert_eq!(second.files_written, Some(0));
        let summary_after = std::fs::read(dir.path().join("update_summary.json")).unwrap();
        assert_eq!(summary_before, summary_after);

        market.closes.lock().unwrap().insert("NG=F", 2.6);
        let third = svc.update_all().await.unwrap();
        assert_eq!(third.files_written, Some(2));
    }
}

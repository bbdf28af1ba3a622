//! EIA ingestion: fetch known series and upsert them into the energy database.
//!
//! A failing feed is logged and reported; the remaining feeds still run.

use crate::domain::{
    CrudeOilPrice, DomainError, NaturalGasPrice, PowerDemand, SeriesPoint, StorageLevel,
};
use crate::ports::{EnergySeriesPort, EnergyStorePort};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

pub const HENRY_HUB_SPOT: &str = "NG.RNGWHHD.D";
pub const WTI_SPOT: &str = "PET.RWTC.D";
pub const BRENT_SPOT: &str = "PET.RBRTE.D";
pub const US48_DEMAND: &str = "EBA.US48-ALL.D.H";
pub const NG_STORAGE: &str = "NG.NW2_EPG0_SWO_R48_BCF.W";

const SOURCE: &str = "EIA";
const DEMAND_REGION: &str = "US48";

#[derive(Debug, Clone, Serialize)]
pub struct FeedResult {
    pub feed: &'static str,
    pub table: &'static str,
    pub rows: usize,
    pub error: Option<String>,
}

pub fn natural_gas_rows(points: &[SeriesPoint]) -> Vec<NaturalGasPrice> {
    points
        .iter()
        .map(|p| NaturalGasPrice {
            date: p.period.date(),
            price: p.value,
            volume: None,
            source: SOURCE.to_string(),
        })
        .collect()
}

/// Outer join of WTI and Brent on date.
pub fn crude_oil_rows(wti: &[SeriesPoint], brent: &[SeriesPoint]) -> Vec<CrudeOilPrice> {
    let mut by_date: BTreeMap<NaiveDate, (Option<f64>, Option<f64>)> = BTreeMap::new();
    for p in wti {
        by_date.entry(p.period.date()).or_default().0 = p.value;
    }
    for p in brent {
        by_date.entry(p.period.date()).or_default().1 = p.value;
    }
    by_date
        .into_iter()
        .map(|(date, (wti_price, brent_price))| CrudeOilPrice {
            date,
            wti_price,
            brent_price,
            volume: None,
            source: SOURCE.to_string(),
        })
        .collect()
}

pub fn power_rows(points: &[SeriesPoint], region: &str) -> Vec<PowerDemand> {
    points
        .iter()
        .map(|p| PowerDemand {
            datetime: p.period,
            region: region.to_string(),
            demand_mw: p.value,
            source: SOURCE.to_string(),
        })
        .collect()
}

pub fn storage_rows(points: &[SeriesPoint]) -> Vec<StorageLevel> {
    points
        .iter()
        .map(|p| StorageLevel {
            date: p.period.date(),
            commodity: "natural_gas".to_string(),
            storage_level: p.value,
            unit: "Bcf".to_string(),
        })
        .collect()
}

pub struct IngestService {
    eia: Arc<dyn EnergySeriesPort>,
    store: Arc<dyn EnergyStorePort>,
}

impl IngestService {
    pub fn new(eia: Arc<dyn EnergySeriesPort>, store: Arc<dyn EnergyStorePort>) -> Self {
        Self { eia, store }
    }

    async fn natural_gas(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<usize, DomainError> {
        let points = self.eia.fetch_series(HENRY_HUB_SPOT, start, end).await?;
        self.store.save_natural_gas(&natural_gas_rows(&points)).await
    }

    async fn crude_oil(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<usize, DomainError> {
        let wti = self.eia.fetch_series(WTI_SPOT, start, end).await?;
        let brent = self.eia.fetch_series(BRENT_SPOT, start, end).await?;
        self.store.save_crude_oil(&crude_oil_rows(&wti, &brent)).await
    }

    async fn power(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<usize, DomainError> {
        let points = self.eia.fetch_series(US48_DEMAND, start, end).await?;
        self.store
            .save_power_demand(&power_rows(&points, DEMAND_REGION))
            .await
    }

    async fn storage(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<usize, DomainError> {
        let points = self.eia.fetch_series(NG_STORAGE, start, end).await?;
        self.store.save_storage(&storage_rows(&points)).await
    }

    pub async fn ingest_all(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Vec<FeedResult> {
        let mut results = Vec::with_capacity(4);
        let outcomes = [
            ("natural_gas", "natural_gas_prices", self.natural_gas(start, end).await),
            ("crude_oil", "crude_oil_prices", self.crude_oil(start, end).await),
            ("power_demand", "power_demand", self.power(start, end).await),
            ("storage", "storage_levels", self.storage(start, end).await),
        ];
        for (feed, table, outcome) in outcomes {
            match outcome {
                Ok(rows) => {
                    info!(feed, table, rows, "feed ingested");
                    results.push(FeedResult {
                        feed,
                        table,
                        rows,
                        error: None,
                    });
                }
                Err(e) => {
                    error!(feed, error = %e, "feed failed");
                    results.push(FeedResult {
                        feed,
                        table,
                        rows: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::SqliteStore;
    use crate::domain::Commodity;

    fn point(day: u32, v: Option<f64>) -> SeriesPoint {
        SeriesPoint {
            period: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            value: v,
        }
    }

    #[test]
    fn test_crude_outer_join() {
        let rows = crude_oil_rows(
            &[point(2, Some(72.0)), point(3, Some(73.0))],
            &[point(3, Some(77.0)), point(4, Some(78.0))],
        );
        assert_eq!(rows.len(), 3);
        assert_eq!((rows[0].wti_price, rows[0].brent_price), (Some(72.0), None));
        assert_eq!((rows[1].wti_price, rows[1].brent_price), (Some(73.0), Some(77.0)));
        assert_eq!(rows[2].wti_price, None);
    }

    struct FakeEia;

    #[async_trait::async_trait]
    impl EnergySeriesPort for FakeEia {
        async fn fetch_series(
            &self,
            series_id: &str,
            _start: Option<NaiveDate>,
            _end: Option<NaiveDate>,
        ) -> Result<Vec<SeriesPoint>, DomainError> {
            match series_id {
                HENRY_HUB_SPOT => Ok(vec![point(2, Some(2.5)), point(3, Some(2.6))]),
                US48_DEMAND => Err(DomainError::Eia("rate limited".into())),
                _ => Ok(vec![point(2, Some(1.0))]),
            }
        }
    }

    #[tokio::test]
    async fn test_ingest_continues_after_failed_feed() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::connect(dir.path().join("db.db")).await.unwrap());
        let service = IngestService::new(Arc::new(FakeEia), store.clone());
        let results = service.ingest_all(None, None).await;
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].rows, 2);
        assert!(results[2].error.is_some());
        assert_eq!(results[3].rows, 1);

        let gas = store.load_observations(&Commodity::NaturalGas).await.unwrap();
        assert_eq!(gas.len(), 2);
        assert_eq!(store.table_info("storage_levels").await.unwrap().row_count, 1);
    }
}

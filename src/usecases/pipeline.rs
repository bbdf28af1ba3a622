//! Data pipeline: load raw rows -> process per region -> quality check -> replace processed table.

use super::processor::{
    add_technical_indicators, aggregate_regional_data, calculate_returns, clean_price_data,
    create_model_features, process_seasonal_patterns, validate_data_quality, QualityReport,
};
use crate::domain::{Commodity, DomainError, Observation, ProcessedRecord};
use crate::ports::EnergyStorePort;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub timestamp: DateTime<Utc>,
    pub commodity: String,
    pub status: PipelineStatus,
    pub raw_records: usize,
    pub processed_records: usize,
    pub quality_report: Option<QualityReport>,
    pub error: Option<String>,
}

/// Full processing chain for one region's observations.
pub fn process_series(mut observations: Vec<Observation>) -> Vec<ProcessedRecord> {
    observations.sort_by_key(|o| o.at);
    let cleaned = clean_price_data(&observations);
    let mut records: Vec<ProcessedRecord> =
        cleaned.iter().map(ProcessedRecord::from_observation).collect();
    calculate_returns(&mut records);
    add_technical_indicators(&mut records);
    process_seasonal_patterns(&mut records);
    create_model_features(&mut records);
    records
}

pub struct DataPipeline {
    store: Arc<dyn EnergyStorePort>,
}

impl DataPipeline {
    pub fn new(store: Arc<dyn EnergyStorePort>) -> Self {
        Self { store }
    }

    async fn process(
        &self,
        commodity: &Commodity,
        report: &mut PipelineReport,
    ) -> Result<(), DomainError> {
        let raw = self.store.load_observations(commodity).await?;
        report.raw_records = raw.len();

        let mut processed = Vec::new();
        for (region, rows) in aggregate_regional_data(raw, |o| o.region.as_deref()) {
            let records = process_series(rows);
            info!(commodity = %commodity, region = %region, records = records.len(), "region processed");
            processed.extend(records);
        }
        report.processed_records = processed.len();
        report.quality_report = Some(validate_data_quality(&processed));

        self.store.replace_processed(commodity, &processed).await
    }

    /// Never fails: errors are reported in the returned status.
    pub async fn run_pipeline(&self, commodity: &Commodity) -> PipelineReport {
        let mut report = PipelineReport {
            timestamp: Utc::now(),
            commodity: commodity.slug().to_string(),
            status: PipelineStatus::Completed,
            raw_records: 0,
            processed_records: 0,
            quality_report: None,
            error: None,
        };
        match self.process(commodity, &mut report).await {
            Ok(()) => info!(
                commodity = %commodity,
                raw = report.raw_records,
                processed = report.processed_records,
                "pipeline completed"
            ),
            Err(e) => {
                error!(commodity = %commodity, error = %e, "pipeline failed");
                report.status = PipelineStatus::Failed;
                report.error = Some(e.to_string());
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::SqliteStore;
    use crate::domain::{NaturalGasPrice, PowerDemand};
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_pipeline_processes_and_replaces_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::connect(dir.path().join("db.db")).await.unwrap());
        let rows: Vec<NaturalGasPrice> = (0..40u64)
            .map(|i| NaturalGasPrice {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(i),
                price: Some(2.0 + (i % 5) as f64 * 0.1),
                volume: None,
                source: "EIA".into(),
            })
            .collect();
        store.save_natural_gas(&rows).await.unwrap();

        let pipeline = DataPipeline::new(store.clone());
        let report = pipeline.run_pipeline(&Commodity::NaturalGas).await;
        assert_eq!(report.status, PipelineStatus::Completed);
        assert_eq!(report.raw_records, 40);
        assert_eq!(report.processed_records, 40);

        let processed = store.load_processed(&Commodity::NaturalGas).await.unwrap();
        assert_eq!(processed.len(), 40);
        assert!(processed[39].ma_30.is_some());
        assert!(processed[39].lag(30).is_some());
    }

    #[tokio::test]
    async fn test_regions_are_processed_separately() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::connect(dir.path().join("db.db")).await.unwrap());
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let rows: Vec<PowerDemand> = (0..4i64)
            .map(|h| PowerDemand {
                datetime: base + chrono::Duration::hours(h),
                region: if h % 2 == 0 { "US48".into() } else { "TEX".into() },
                demand_mw: Some(100.0 + h as f64),
                source: "EIA".into(),
            })
            .collect();
        store.save_power_demand(&rows).await.unwrap();

        let report = DataPipeline::new(store.clone())
            .run_pipeline(&Commodity::Electricity)
            .await;
        assert_eq!(report.status, PipelineStatus::Completed);
        let processed = store.load_processed(&Commodity::Electricity).await.unwrap();
        let tex: Vec<_> = processed
            .iter()
            .filter(|r| r.region.as_deref() == Some("TEX"))
            .collect();
        assert_eq!(tex.len(), 2);
        // The return is computed within TEX only: 103 / 101 - 1.
        assert!((tex[1].daily_return.unwrap() - (103.0 / 101.0 - 1.0)).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_missing_table_completes_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::connect(dir.path().join("db.db")).await.unwrap());
        let report = DataPipeline::new(store)
            .run_pipeline(&Commodity::parse("uranium"))
            .await;
        assert_eq!(report.status, PipelineStatus::Completed);
        assert_eq!(report.raw_records, 0);
    }
}

//! Forecasting, risk assessment and the model registry.
//!
//! - Forecasts read `<commodity>_processed` (run the pipeline first)
//! - A tail of the series is held out to score the model before refitting on everything
//! - Registered models get a JSON file under the models directory

use super::processor::{ValidationReport, aggregate_regional_data, validate_price_data};
use crate::domain::forecast::{
    DEFAULT_HORIZON, DriftForecastModel, ForecastMetrics, ForecastPoint, Forecaster,
    ModelEnsemble, PriceForecastModel,
};
use crate::domain::risk::{RiskAssessmentModel, RiskMetrics, simple_returns};
use crate::domain::tickers::find_ticker;
use crate::domain::{Commodity, DomainError, PriceBar, ProcessedRecord, RegisteredModel};
use crate::ports::{DatasetPort, EnergyStorePort, ModelRegistryPort};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

/// Benchmark used for beta in risk reports.
pub const RISK_BENCHMARK: &str = "XLE";
/// Share of the series held out for scoring (capped at the horizon).
const HOLDOUT_FRACTION: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct ForecastRun {
    pub commodity: String,
    pub region: Option<String>,
    pub observations: usize,
    pub points: Vec<ForecastPoint>,
    pub ensemble: Vec<f64>,
    pub ensemble_weights: Vec<f64>,
    pub metrics: Option<ForecastMetrics>,
    pub model_id: Option<String>,
}

/// Registry id: `<name>_<YYYYmmdd_HHMMSS>`.
pub fn model_id(name: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}", name, at.format("%Y%m%d_%H%M%S"))
}

/// Closes of `asset` matched by date against `benchmark`, as two aligned return series.
pub fn aligned_returns(asset: &[PriceBar], benchmark: &[PriceBar]) -> (Vec<f64>, Vec<f64>) {
    let bench: BTreeMap<NaiveDate, f64> = benchmark
        .iter()
        .filter_map(|b| b.close.map(|c| (b.date, c)))
        .collect();
    let (a, b): (Vec<f64>, Vec<f64>) = asset
        .iter()
        .filter_map(|bar| Some((bar.close?, *bench.get(&bar.date)?)))
        .unzip();
    (simple_returns(&a), simple_returns(&b))
}

pub struct ModelService {
    store: Arc<dyn EnergyStorePort>,
    registry: Arc<dyn ModelRegistryPort>,
    dataset: Arc<dyn DatasetPort>,
    models_dir: PathBuf,
}

impl ModelService {
    pub fn new(
        store: Arc<dyn EnergyStorePort>,
        registry: Arc<dyn ModelRegistryPort>,
        dataset: Arc<dyn DatasetPort>,
        models_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            registry,
            dataset,
            models_dir: models_dir.into(),
        }
    }

    /// Processed rows of the region with the most data.
    async fn training_rows(
        &self,
        commodity: &Commodity,
    ) -> Result<(Option<String>, Vec<ProcessedRecord>), DomainError> {
        let rows = self.store.load_processed(commodity).await?;
        let multi_region = rows.iter().any(|r| r.region.is_some());
        let groups = aggregate_regional_data(rows, |r| r.region.as_deref());
        let (region, rows) = groups
            .into_iter()
            .max_by_key(|(_, rows)| rows.len())
            .unwrap_or_default();
        Ok((multi_region.then_some(region), rows))
    }

    pub async fn forecast(
        &self,
        commodity: &Commodity,
        horizon: Option<usize>,
        register: bool,
    ) -> Result<ForecastRun, DomainError> {
        let horizon = horizon.unwrap_or(DEFAULT_HORIZON).max(1);
        let (region, rows) = self.training_rows(commodity).await?;
        let targets = PriceForecastModel::prepare_features(&rows);
        if targets.len() < 2 {
            return Err(DomainError::Model(format!(
                "not enough processed {} data to fit a model ({} usable rows); run `process {}` first",
                commodity,
                targets.len(),
                commodity
            )));
        }

        let holdout = (targets.len() / HOLDOUT_FRACTION).min(horizon);
        let metrics = if holdout > 0 {
            let (train, test) = targets.split_at(targets.len() - holdout);
            let mut scored = PriceForecastModel::new(commodity.slug(), horizon);
            scored.fit_series(train)?;
            Some(scored.evaluate(test)?)
        } else {
            None
        };

        let mut model = PriceForecastModel::new(commodity.slug(), horizon);
        model.fit(&rows)?;
        model.metrics = metrics;
        let points = model.predict(Some(horizon))?;

        let members: Vec<Box<dyn Forecaster>> = vec![
            Box::new(PriceForecastModel::new(commodity.slug(), horizon)),
            Box::new(DriftForecastModel::new()),
        ];
        let mut ensemble = ModelEnsemble::new(members);
        ensemble.fit(&targets, holdout)?;
        let ensemble_values = ensemble.predict(horizon)?;

        let model_id = if register {
            Some(self.register_model(&model, Some(commodity)).await?.model_id)
        } else {
            None
        };

        info!(
            commodity = %commodity,
            observations = targets.len(),
            horizon,
            rmse = ?metrics.map(|m| m.rmse),
            "forecast generated"
        );
        Ok(ForecastRun {
            commodity: commodity.slug().to_string(),
            region,
            observations: targets.len(),
            points,
            ensemble: ensemble_values,
            ensemble_weights: ensemble.weights().to_vec(),
            metrics,
            model_id,
        })
    }

    /// Save the model file and add it to the registry.
    pub async fn register_model(
        &self,
        model: &PriceForecastModel,
        commodity: Option<&Commodity>,
    ) -> Result<RegisteredModel, DomainError> {
        let now = Utc::now();
        let id = model_id(&model.name, now);
        fs::create_dir_all(&self.models_dir)
            .await
            .map_err(|e| DomainError::Model(format!("create models dir: {}", e)))?;
        let path = self.models_dir.join(format!("{}.json", id));
        let json =
            serde_json::to_vec_pretty(model).map_err(|e| DomainError::Model(e.to_string()))?;
        fs::write(&path, json)
            .await
            .map_err(|e| DomainError::Model(format!("write {}: {}", path.display(), e)))?;

        let entry = RegisteredModel {
            model_id: id,
            model_name: model.name.clone(),
            model_type: "moving_average".to_string(),
            commodity: commodity.map(|c| c.slug().to_string()),
            created_date: now,
            last_updated: now,
            performance_metrics: model.metrics.map(|m| m.to_map()).unwrap_or_default(),
            model_path: Some(path.to_string_lossy().into_owned()),
            is_active: true,
        };
        self.registry.register(&entry).await?;
        info!(model_id = %entry.model_id, "model registered");
        Ok(entry)
    }

    /// Registered entry plus its deserialized model, when the file is still there.
    pub async fn get_model(
        &self,
        model_id: &str,
    ) -> Result<Option<(RegisteredModel, Option<PriceForecastModel>)>, DomainError> {
        let Some(entry) = self.registry.get(model_id).await? else {
            return Ok(None);
        };
        let model = match &entry.model_path {
            Some(path) => match fs::read(path).await {
                Ok(bytes) => serde_json::from_slice(&bytes).ok(),
                Err(e) => {
                    warn!(model_id, path = %path, error = %e, "model file unreadable");
                    None
                }
            },
            None => None,
        };
        Ok(Some((entry, model)))
    }

    pub async fn list_models(
        &self,
        prefix: Option<&str>,
    ) -> Result<Vec<RegisteredModel>, DomainError> {
        self.registry.list(prefix).await
    }

    /// Price sanity report over a ticker's closes.
    pub async fn validate_ticker(&self, symbol: &str) -> Result<ValidationReport, DomainError> {
        let ticker = find_ticker(symbol)
            .ok_or_else(|| DomainError::InvalidInput(format!("unknown ticker '{}'", symbol)))?;
        let bars = self.dataset.read_ticker(ticker).await?;
        let closes: Vec<Option<f64>> = bars.iter().map(|b| b.close).collect();
        Ok(validate_price_data(&closes))
    }

    /// Risk metrics for a catalog ticker from its CSV closes; beta against XLE.
    pub async fn assess_ticker_risk(&self, symbol: &str) -> Result<RiskMetrics, DomainError> {
        let ticker = find_ticker(symbol)
            .ok_or_else(|| DomainError::InvalidInput(format!("unknown ticker '{}'", symbol)))?;
        let bars = self.dataset.read_ticker(ticker).await?;
        let closes: Vec<f64> = bars.iter().filter_map(|b| b.close).collect();

        let benchmark_returns = if ticker.symbol == RISK_BENCHMARK {
            None
        } else {
            match find_ticker(RISK_BENCHMARK) {
                Some(bench) => match self.dataset.read_ticker(bench).await {
                    Ok(bench_bars) => Some(aligned_returns(&bars, &bench_bars)),
                    Err(e) => {
                        warn!(error = %e, "benchmark unavailable, skipping beta");
                        None
                    }
                },
                None => None,
            }
        };

        let model = RiskAssessmentModel::default();
        let mut metrics = model.assess_portfolio_risk(&closes, None)?;
        if let Some((asset, bench)) = benchmark_returns {
            metrics.beta = crate::domain::risk::beta(&asset, &bench);
        }
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::{CsvDataset, SqliteStore};
    use crate::domain::NaturalGasPrice;
    use crate::usecases::pipeline::DataPipeline;
    use chrono::TimeZone;

    #[test]
    fn test_model_id_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 6, 5, 9).unwrap();
        assert_eq!(
            model_id("PriceForecast_natural_gas", at),
            "PriceForecast_natural_gas_20240301_060509"
        );
    }

    fn bar(day: u32, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: None,
            high: None,
            low: None,
            close: Some(close),
            volume: None,
            dividends: 0.0,
            stock_splits: 0.0,
        }
    }

    #[test]
    fn test_aligned_returns_joins_on_date() {
        let asset = vec![bar(2, 10.0), bar(3, 11.0), bar(4, 12.1)];
        let bench = vec![bar(2, 100.0), bar(4, 110.0)];
        let (a, b) = aligned_returns(&asset, &bench);
        assert_eq!(a.len(), 1);
        assert!((a[0] - 0.21).abs() < 1e-9);
        assert!((b[0] - 0.1).abs() < 1e-9);
    }

    async fn setup(dir: &std::path::Path) -> (Arc<SqliteStore>, ModelService) {
        let store = Arc::new(SqliteStore::connect(dir.join("db.db")).await.unwrap());
        let service = ModelService::new(
            store.clone(),
            store.clone(),
            Arc::new(CsvDataset::new(dir.join("yfinance"))),
            dir.join("models"),
        );
        (store, service)
    }

    #[tokio::test]
    async fn test_forecast_requires_processed_data() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, service) = setup(dir.path()).await;
        let err = service
            .forecast(&Commodity::NaturalGas, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Model(_)));
    }

    #[tokio::test]
    async fn test_forecast_registers_model() {
        let dir = tempfile::tempdir().unwrap();
        let (store, service) = setup(dir.path()).await;
        let rows: Vec<NaturalGasPrice> = (0..80u64)
            .map(|i| NaturalGasPrice {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(i),
                price: Some(2.5 + (i % 7) as f64 * 0.05),
                volume: None,
                source: "EIA".into(),
            })
            .collect();
        store.save_natural_gas(&rows).await.unwrap();
        DataPipeline::new(store.clone())
            .run_pipeline(&Commodity::NaturalGas)
            .await;

        let run = service
            .forecast(&Commodity::NaturalGas, Some(10), true)
            .await
            .unwrap();
        assert_eq!(run.points.len(), 10);
        assert_eq!(run.ensemble.len(), 10);
        assert!(run.metrics.is_some());
        assert!(run.points.iter().all(|p| p.lower <= p.value && p.value <= p.upper));

        let id = run.model_id.unwrap();
        let (entry, model) = service.get_model(&id).await.unwrap().unwrap();
        assert!(entry.performance_metrics.contains_key("rmse"));
        assert!(model.unwrap().is_fitted());
        assert_eq!(service.list_models(Some("PriceForecast")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ticker_risk_and_validation_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, service) = setup(dir.path()).await;
        let dataset = CsvDataset::new(dir.path().join("yfinance"));
        dataset.ensure_dir().await.unwrap();
        let closes = [50.0, 51.0, 49.5, 52.0, 51.5, 53.0];
        let uso: Vec<PriceBar> = closes
            .iter()
            .enumerate()
            .map(|(i, c)| bar(2 + i as u32, *c))
            .collect();
        let xle: Vec<PriceBar> = closes
            .iter()
            .enumerate()
            .map(|(i, c)| bar(2 + i as u32, c * 2.0))
            .collect();
        dataset.write_ticker(find_ticker("USO").unwrap(), &uso).await.unwrap();
        dataset.write_ticker(find_ticker("XLE").unwrap(), &xle).await.unwrap();

        let risk = service.assess_ticker_risk("uso").await.unwrap();
        assert!(risk.volatility > 0.0);
        assert!((risk.beta.unwrap() - 1.0).abs() < 1e-9);

        let report = service.validate_ticker("USO").await.unwrap();
        assert!(report.is_valid);
        assert_eq!(report.statistics.unwrap().max, 53.0);
    }

    #[tokio::test]
    async fn test_risk_for_unknown_ticker() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, service) = setup(dir.path()).await;
        assert!(matches!(
            service.assess_ticker_risk("NOPE").await,
            Err(DomainError::InvalidInput(_))
        ));
    }
}

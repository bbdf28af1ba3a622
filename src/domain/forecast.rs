//! Price forecasting models and accuracy metrics.

use super::entities::ProcessedRecord;
use super::errors::DomainError;
use super::series::{mean, std_dev};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default number of periods to forecast.
pub const DEFAULT_HORIZON: usize = 30;
/// Trailing observations kept by the moving-average model.
pub const MOVING_AVERAGE_WINDOW: usize = 30;
/// Drift added linearly across the forecast horizon (0 at step 1, this at the last step).
const TREND_SPAN: f64 = 0.1;
/// Two-sided 95% normal quantile.
const Z_95: f64 = 1.96;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// 1-based step ahead.
    pub step: usize,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    pub rmse: f64,
    pub mae: f64,
    /// Percent.
    pub mape: f64,
    pub r2: f64,
    /// Fraction of steps where predicted and actual moves share a sign.
    pub directional_accuracy: f64,
}

impl ForecastMetrics {
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("rmse".to_string(), self.rmse),
            ("mae".to_string(), self.mae),
            ("mape".to_string(), self.mape),
            ("r2".to_string(), self.r2),
            ("directional_accuracy".to_string(), self.directional_accuracy),
        ])
    }
}

/// Common surface of fitted point forecasters.
pub trait Forecaster: Send + Sync {
    fn name(&self) -> &str;

    /// Fit on the target series (oldest first).
    fn fit_series(&mut self, targets: &[f64]) -> Result<(), DomainError>;

    /// Point forecasts for `periods` steps ahead.
    fn predict_values(&self, periods: usize) -> Result<Vec<f64>, DomainError>;

    /// Last observed target, used as the reference for directional accuracy.
    fn last_observed(&self) -> Option<f64>;
}

/// Moving-average forecaster with a linear drift and widening confidence band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceForecastModel {
    pub name: String,
    pub commodity: String,
    pub forecast_horizon: usize,
    pub window: usize,
    last_values: Vec<f64>,
    is_fitted: bool,
    pub feature_columns: Vec<String>,
    pub metrics: Option<ForecastMetrics>,
}

impl PriceForecastModel {
    pub fn new(commodity: &str, forecast_horizon: usize) -> Self {
        Self {
            name: format!("PriceForecast_{}", commodity),
            commodity: commodity.to_string(),
            forecast_horizon,
            window: MOVING_AVERAGE_WINDOW,
            last_values: Vec::new(),
            is_fitted: false,
            feature_columns: Vec::new(),
            metrics: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Targets of rows carrying every feature the model reads
    /// (`price_lag_1`, `price_lag_7`, `ma_30`, `volatility_30`).
    pub fn prepare_features(records: &[ProcessedRecord]) -> Vec<f64> {
        records
            .iter()
            .filter(|r| {
                r.lag(1).is_some()
                    && r.lag(7).is_some()
                    && r.ma_30.is_some()
                    && r.volatility_30.is_some()
            })
            .filter_map(|r| r.value)
            .collect()
    }

    /// Fit on processed pipeline output.
    pub fn fit(&mut self, records: &[ProcessedRecord]) -> Result<(), DomainError> {
        let targets = Self::prepare_features(records);
        self.fit_series(&targets)?;
        self.feature_columns = ["price_lag_1", "price_lag_7", "ma_30", "volatility_30"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        Ok(())
    }

    /// Forecast `periods` steps (defaults to the model horizon).
    pub fn predict(&self, periods: Option<usize>) -> Result<Vec<ForecastPoint>, DomainError> {
        if !self.is_fitted {
            return Err(DomainError::Model(
                "Model must be fitted before making predictions".into(),
            ));
        }
        let periods = periods.unwrap_or(self.forecast_horizon);
        let values = self.predict_values(periods)?;
        let sigma = std_dev(&self.last_values, 0).unwrap_or(0.0);
        Ok(values
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                let err = Z_95 * sigma * ((i + 1) as f64).sqrt();
                ForecastPoint {
                    step: i + 1,
                    value,
                    lower: value - err,
                    upper: value + err,
                }
            })
            .collect())
    }

    /// Compare a forecast of `actual.len()` steps against held-out actuals.
    pub fn evaluate(&mut self, actual: &[f64]) -> Result<ForecastMetrics, DomainError> {
        let predicted = self.predict_values(actual.len())?;
        let metrics = forecast_metrics(self.last_observed(), &predicted, actual)?;
        self.metrics = Some(metrics);
        Ok(metrics)
    }
}

impl Forecaster for PriceForecastModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit_series(&mut self, targets: &[f64]) -> Result<(), DomainError> {
        if targets.is_empty() {
            return Err(DomainError::Model(format!(
                "{}: no complete feature rows to fit on",
                self.name
            )));
        }
        let start = targets.len().saturating_sub(self.window);
        self.last_values = targets[start..].to_vec();
        self.is_fitted = true;
        Ok(())
    }

    fn predict_values(&self, periods: usize) -> Result<Vec<f64>, DomainError> {
        if !self.is_fitted {
            return Err(DomainError::Model(
                "Model must be fitted before making predictions".into(),
            ));
        }
        let base = mean(&self.last_values).unwrap_or(0.0);
        Ok((0..periods)
            .map(|i| base + linspace_at(i, periods, TREND_SPAN))
            .collect())
    }

    fn last_observed(&self) -> Option<f64> {
        self.last_values.last().copied()
    }
}

/// Random walk with drift: last value plus the mean historical step.
#[derive(Debug, Clone, Default)]
pub struct DriftForecastModel {
    last: Option<f64>,
    drift: f64,
}

impl DriftForecastModel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Forecaster for DriftForecastModel {
    fn name(&self) -> &str {
        "DriftForecast"
    }

    fn fit_series(&mut self, targets: &[f64]) -> Result<(), DomainError> {
        let (first, last) = match (targets.first(), targets.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => return Err(DomainError::Model("DriftForecast: empty series".into())),
        };
        self.drift = if targets.len() > 1 {
            (last - first) / (targets.len() - 1) as f64
        } else {
            0.0
        };
        self.last = Some(last);
        Ok(())
    }

    fn predict_values(&self, periods: usize) -> Result<Vec<f64>, DomainError> {
        let last = self.last.ok_or_else(|| {
            DomainError::Model("Model must be fitted before making predictions".into())
        })?;
        Ok((1..=periods).map(|h| last + self.drift * h as f64).collect())
    }

    fn last_observed(&self) -> Option<f64> {
        self.last
    }
}

/// Weighted average of several forecasters.
pub struct ModelEnsemble {
    models: Vec<Box<dyn Forecaster>>,
    weights: Vec<f64>,
    is_fitted: bool,
}

impl ModelEnsemble {
    pub fn new(models: Vec<Box<dyn Forecaster>>) -> Self {
        Self {
            models,
            weights: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Fit every member. The last `validation` targets are held out to weight
    /// members by inverse RMSE; members are then refit on the full series.
    /// Falls back to equal weights when the holdout is unusable.
    pub fn fit(&mut self, targets: &[f64], validation: usize) -> Result<(), DomainError> {
        if self.models.is_empty() {
            return Err(DomainError::Model("ensemble has no members".into()));
        }
        let n = self.models.len();
        let mut weights = vec![1.0 / n as f64; n];

        if validation > 0 && targets.len() > validation {
            let (train, holdout) = targets.split_at(targets.len() - validation);
            let mut inverse = Vec::with_capacity(n);
            for model in self.models.iter_mut() {
                model.fit_series(train)?;
                let predicted = model.predict_values(holdout.len())?;
                let rmse = rmse(&predicted, holdout);
                inverse.push(if rmse > 0.0 { 1.0 / rmse } else { f64::INFINITY });
            }
            if inverse.iter().any(|w| w.is_infinite()) {
                // Perfect members share all the weight.
                let perfect = inverse.iter().filter(|w| w.is_infinite()).count() as f64;
                weights = inverse
                    .iter()
                    .map(|w| if w.is_infinite() { 1.0 / perfect } else { 0.0 })
                    .collect();
            } else {
                let total: f64 = inverse.iter().sum();
                if total > 0.0 {
                    weights = inverse.iter().map(|w| w / total).collect();
                }
            }
        }

        for model in self.models.iter_mut() {
            model.fit_series(targets)?;
        }
        self.weights = weights;
        self.is_fitted = true;
        Ok(())
    }

    pub fn predict(&self, periods: usize) -> Result<Vec<f64>, DomainError> {
        if !self.is_fitted {
            return Err(DomainError::Model(
                "Ensemble must be fitted before making predictions".into(),
            ));
        }
        let mut out = vec![0.0; periods];
        for (model, weight) in self.models.iter().zip(self.weights.iter()) {
            for (acc, v) in out.iter_mut().zip(model.predict_values(periods)?) {
                *acc += weight * v;
            }
        }
        Ok(out)
    }
}

/// `TREND_SPAN`-style linspace from 0 to `span` over `n` points, evaluated at `i`.
fn linspace_at(i: usize, n: usize, span: f64) -> f64 {
    if n <= 1 {
        0.0
    } else {
        span * i as f64 / (n - 1) as f64
    }
}

fn rmse(predicted: &[f64], actual: &[f64]) -> f64 {
    let n = predicted.len().min(actual.len());
    if n == 0 {
        return 0.0;
    }
    let se: f64 = predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a).powi(2))
        .sum();
    (se / n as f64).sqrt()
}

/// Accuracy of `predicted` against `actual`. `reference` is the last value
/// before the forecast window, used for the first directional comparison.
pub fn forecast_metrics(
    reference: Option<f64>,
    predicted: &[f64],
    actual: &[f64],
) -> Result<ForecastMetrics, DomainError> {
    if actual.is_empty() || predicted.len() != actual.len() {
        return Err(DomainError::InvalidInput(format!(
            "cannot evaluate {} predictions against {} actuals",
            predicted.len(),
            actual.len()
        )));
    }
    let n = actual.len() as f64;
    let mae = predicted.iter().zip(actual).map(|(p, a)| (p - a).abs()).sum::<f64>() / n;
    let nonzero: Vec<(f64, f64)> = predicted
        .iter()
        .zip(actual)
        .filter(|(_, a)| **a != 0.0)
        .map(|(p, a)| (*p, *a))
        .collect();
    let mape = if nonzero.is_empty() {
        0.0
    } else {
        nonzero.iter().map(|(p, a)| ((a - p) / a).abs()).sum::<f64>() / nonzero.len() as f64
            * 100.0
    };
    let actual_mean = mean(actual).unwrap_or(0.0);
    let ss_tot: f64 = actual.iter().map(|a| (a - actual_mean).powi(2)).sum();
    let ss_res: f64 = predicted.iter().zip(actual).map(|(p, a)| (a - p).powi(2)).sum();
    let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

    let mut hits = 0usize;
    let mut total = 0usize;
    let mut prev_pred = reference;
    let mut prev_actual = reference;
    for (p, a) in predicted.iter().zip(actual) {
        if let (Some(pp), Some(pa)) = (prev_pred, prev_actual) {
            total += 1;
            if (p - pp).signum() == (a - pa).signum() {
                hits += 1;
            }
        }
        prev_pred = Some(*p);
        prev_actual = Some(*a);
    }
    let directional_accuracy = if total == 0 { 0.0 } else { hits as f64 / total as f64 };

    Ok(ForecastMetrics {
        rmse: rmse(predicted, actual),
        mae,
        mape,
        r2,
        directional_accuracy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predict_before_fit_fails() {
        let model = PriceForecastModel::new("natural_gas", DEFAULT_HORIZON);
        assert!(matches!(model.predict(None), Err(DomainError::Model(_))));
    }

    #[test]
    fn test_moving_average_forecast_with_trend_and_band() {
        let mut model = PriceForecastModel::new("natural_gas", 5);
        let targets: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 2.0 } else { 4.0 }).collect();
        model.fit_series(&targets).unwrap();

        let points = model.predict(None).unwrap();
        assert_eq!(points.len(), 5);
        assert!((points[0].value - 3.0).abs() < 1e-12);
        assert!((points[4].value - 3.1).abs() < 1e-12);
        // sigma = 1 over the alternating window
        assert!((points[0].upper - points[0].value - 1.96).abs() < 1e-9);
        assert!(points[4].upper - points[4].lower > points[0].upper - points[0].lower);
    }

    #[test]
    fn test_fit_uses_only_complete_feature_rows() {
        let mut complete = ProcessedRecord {
            value: Some(10.0),
            ma_30: Some(9.0),
            volatility_30: Some(0.5),
            ..Default::default()
        };
        complete.lags.insert(1, Some(9.5));
        complete.lags.insert(7, Some(9.0));
        let partial = ProcessedRecord {
            value: Some(99.0),
            ..Default::default()
        };

        assert_eq!(
            PriceForecastModel::prepare_features(&[partial.clone(), complete.clone()]),
            vec![10.0]
        );
        let mut model = PriceForecastModel::new("crude_oil", 3);
        assert!(model.fit(&[partial]).is_err());
        model.fit(&[complete]).unwrap();
        assert_eq!(model.feature_columns.len(), 4);
    }

    #[test]
    fn test_metrics_perfect_forecast() {
        let m = forecast_metrics(Some(1.0), &[2.0, 3.0, 2.5], &[2.0, 3.0, 2.5]).unwrap();
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.mape, 0.0);
        assert_eq!(m.r2, 1.0);
        assert_eq!(m.directional_accuracy, 1.0);
        assert!(forecast_metrics(None, &[1.0], &[]).is_err());
    }

    #[test]
    fn test_ensemble_prefers_accurate_member() {
        let targets: Vec<f64> = (0..60).map(|i| 10.0 + i as f64).collect();
        let mut ensemble = ModelEnsemble::new(vec![
            Box::new(PriceForecastModel::new("x", 10)),
            Box::new(DriftForecastModel::new()),
        ]);
        assert!(ensemble.predict(3).is_err());
        ensemble.fit(&targets, 10).unwrap();
        let w = ensemble.weights();
        // Linear series: drift is exact and takes all the weight.
        assert_eq!(w, &[0.0, 1.0]);
        let out = ensemble.predict(2).unwrap();
        assert!((out[0] - 70.0).abs() < 1e-9);
        assert!((out[1] - 71.0).abs() < 1e-9);
    }
}

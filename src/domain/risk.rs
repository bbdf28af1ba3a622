//! Market risk measures over daily return series.

use super::errors::DomainError;
use super::series::{mean, quantile, std_dev};
use serde::{Deserialize, Serialize};

/// Trading days per year used for annualization.
pub const TRADING_DAYS: f64 = 252.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Daily return not exceeded with the configured confidence (negative = loss).
    pub var_95: f64,
    pub expected_shortfall: f64,
    /// Annualized.
    pub volatility: f64,
    /// Largest peak-to-trough decline as a positive fraction.
    pub max_drawdown: f64,
    /// Annualized, zero risk-free rate.
    pub sharpe_ratio: Option<f64>,
    pub beta: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct RiskAssessmentModel {
    pub name: String,
    pub confidence_level: f64,
}

impl Default for RiskAssessmentModel {
    fn default() -> Self {
        Self::new("price_volatility")
    }
}

impl RiskAssessmentModel {
    pub fn new(risk_type: &str) -> Self {
        Self {
            name: format!("RiskAssessment_{}", risk_type),
            confidence_level: 0.95,
        }
    }

    /// Historical VaR: the `(1 - confidence)` percentile of returns.
    pub fn calculate_var(&self, returns: &[f64], confidence_level: f64) -> Result<f64, DomainError> {
        if !(0.0..1.0).contains(&confidence_level) {
            return Err(DomainError::InvalidInput(format!(
                "confidence level must be in [0, 1): {}",
                confidence_level
            )));
        }
        quantile(returns, 1.0 - confidence_level)
            .ok_or_else(|| DomainError::InvalidInput("no returns to assess".into()))
    }

    /// Mean of the returns at or below VaR.
    pub fn calculate_expected_shortfall(
        &self,
        returns: &[f64],
        confidence_level: f64,
    ) -> Result<f64, DomainError> {
        let var = self.calculate_var(returns, confidence_level)?;
        let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= var).collect();
        mean(&tail).ok_or_else(|| DomainError::InvalidInput("empty loss tail".into()))
    }

    /// Risk metrics for a price series (oldest first). `benchmark` returns, when
    /// given, must align with the series' returns to produce a beta.
    pub fn assess_portfolio_risk(
        &self,
        prices: &[f64],
        benchmark: Option<&[f64]>,
    ) -> Result<RiskMetrics, DomainError> {
        let returns = simple_returns(prices);
        if returns.len() < 2 {
            return Err(DomainError::InvalidInput(
                "need at least three prices to assess risk".into(),
            ));
        }
        let var_95 = self.calculate_var(&returns, self.confidence_level)?;
        let expected_shortfall = self.calculate_expected_shortfall(&returns, self.confidence_level)?;
        let daily_std = std_dev(&returns, 1).unwrap_or(0.0);
        let daily_mean = mean(&returns).unwrap_or(0.0);
        let sharpe_ratio = if daily_std > 0.0 {
            Some(daily_mean / daily_std * TRADING_DAYS.sqrt())
        } else {
            None
        };
        let beta = benchmark.and_then(|b| beta(&returns, b));

        Ok(RiskMetrics {
            var_95,
            expected_shortfall,
            volatility: daily_std * TRADING_DAYS.sqrt(),
            max_drawdown: max_drawdown(prices),
            sharpe_ratio,
            beta,
        })
    }
}

pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

pub fn max_drawdown(prices: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0f64;
    for &p in prices {
        peak = peak.max(p);
        if peak > 0.0 {
            worst = worst.max((peak - p) / peak);
        }
    }
    worst
}

/// Covariance of asset with benchmark over benchmark variance.
pub fn beta(asset: &[f64], benchmark: &[f64]) -> Option<f64> {
    let n = asset.len().min(benchmark.len());
    if n < 2 {
        return None;
    }
    let (a, b) = (&asset[..n], &benchmark[..n]);
    let (ma, mb) = (mean(a)?, mean(b)?);
    let cov: f64 = a.iter().zip(b).map(|(x, y)| (x - ma) * (y - mb)).sum::<f64>() / (n - 1) as f64;
    let var: f64 = b.iter().map(|y| (y - mb).powi(2)).sum::<f64>() / (n - 1) as f64;
    if var > 0.0 { Some(cov / var) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_and_expected_shortfall() {
        let model = RiskAssessmentModel::default();
        let returns: Vec<f64> = (1..=100).map(|i| (i as f64 - 50.0) / 1000.0).collect();
        let var = model.calculate_var(&returns, 0.95).unwrap();
        // 5th percentile of -0.049..0.050
        assert!((var - (-0.04405)).abs() < 1e-9);
        let es = model.calculate_expected_shortfall(&returns, 0.95).unwrap();
        assert!(es < var);
        assert!(model.calculate_var(&[], 0.95).is_err());
        assert!(model.calculate_var(&returns, 1.5).is_err());
    }

    #[test]
    fn test_max_drawdown() {
        assert_eq!(max_drawdown(&[100.0, 120.0, 90.0, 130.0, 117.0]), 0.25);
        assert_eq!(max_drawdown(&[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_beta_of_scaled_series() {
        let bench = [0.01, -0.02, 0.015, 0.0, -0.005];
        let asset: Vec<f64> = bench.iter().map(|r| r * 2.0).collect();
        let b = beta(&asset, &bench).unwrap();
        assert!((b - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_assess_portfolio_risk() {
        let model = RiskAssessmentModel::default();
        let prices = [100.0, 101.0, 99.0, 102.0, 98.0, 103.0];
        let m = model.assess_portfolio_risk(&prices, None).unwrap();
        assert!(m.volatility > 0.0);
        assert!(m.var_95 < 0.0);
        assert!((m.max_drawdown - (102.0 - 98.0) / 102.0).abs() < 1e-12);
        assert!(m.beta.is_none());
        assert!(model.assess_portfolio_risk(&[1.0, 2.0], None).is_err());
    }
}

//! Energy data processing steps: cleaning, returns, indicators, seasonal and model features,
//! quality and validation reports.
//!
//! Each step works on a time-ordered series of one region.

use crate::domain::series::{
    self, AnomalyMethod, iqr_bounds, log_returns, pct_change, present, rolling_max, rolling_mean, rolling_min,
    rolling_std, rsi, shift,
};
use crate::domain::{Observation, ProcessedRecord, RollingStats};
use chrono::{Datelike, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

pub const IQR_MULTIPLIER: f64 = 1.5;
pub const FILL_WINDOW: usize = 7;
pub const RSI_PERIOD: usize = 14;
pub const LAGS: [u32; 3] = [1, 7, 30];
pub const ROLLING_WINDOWS: [u32; 3] = [7, 30, 90];
/// Key used for observations without a region.
pub const DEFAULT_REGION: &str = "all";

/// Drop IQR outliers and fill gaps from the trailing window.
///
/// Missing values are kept in place; a gap is filled with the mean of the
/// previous `FILL_WINDOW` values when all of them are present.
pub fn clean_price_data(observations: &[Observation]) -> Vec<Observation> {
    let values: Vec<f64> = observations.iter().filter_map(|o| o.value).collect();
    let bounds = iqr_bounds(&values, IQR_MULTIPLIER);

    let mut cleaned: Vec<Observation> = observations
        .iter()
        .filter(|o| match (o.value, bounds) {
            (Some(v), Some((lo, hi))) => v >= lo && v <= hi,
            _ => true,
        })
        .cloned()
        .collect();

    for i in FILL_WINDOW..cleaned.len() {
        if cleaned[i].value.is_some() {
            continue;
        }
        let window: Vec<f64> = cleaned[i - FILL_WINDOW..i]
            .iter()
            .filter_map(|o| o.value)
            .collect();
        if window.len() == FILL_WINDOW {
            cleaned[i].value = series::mean(&window);
        }
    }
    cleaned
}

fn values(records: &[ProcessedRecord]) -> Vec<Option<f64>> {
    records.iter().map(|r| r.value).collect()
}

pub fn calculate_returns(records: &mut [ProcessedRecord]) {
    let v = values(records);
    let simple = pct_change(&v);
    let logs = log_returns(&v);
    for (i, r) in records.iter_mut().enumerate() {
        r.daily_return = simple[i];
        r.log_return = logs[i];
    }
}

pub fn add_technical_indicators(records: &mut [ProcessedRecord]) {
    let v = values(records);
    let ma_7 = rolling_mean(&v, 7);
    let ma_30 = rolling_mean(&v, 30);
    let ma_90 = rolling_mean(&v, 90);
    let vol_30 = rolling_std(&v, 30);
    let rsi_14 = rsi(&v, RSI_PERIOD);
    for (i, r) in records.iter_mut().enumerate() {
        r.ma_7 = ma_7[i];
        r.ma_30 = ma_30[i];
        r.ma_90 = ma_90[i];
        r.volatility_30 = vol_30[i];
        r.rsi = rsi_14[i];
    }
}

pub fn process_seasonal_patterns(records: &mut [ProcessedRecord]) {
    for r in records.iter_mut() {
        let d = r.at.date();
        r.year = d.year();
        r.month = d.month();
        r.day_of_year = d.ordinal();
        r.week_of_year = d.iso_week().week();
        r.day_of_week = d.weekday().num_days_from_monday();
        r.is_summer = matches!(r.month, 6..=8);
        r.is_winter = matches!(r.month, 12 | 1 | 2);
        r.is_shoulder = !r.is_summer && !r.is_winter;
    }
}

/// Split by region, keeping each region's order.
pub fn aggregate_regional_data<T, F>(items: Vec<T>, region: F) -> BTreeMap<String, Vec<T>>
where
    F: Fn(&T) -> Option<&str>,
{
    let mut out: BTreeMap<String, Vec<T>> = BTreeMap::new();
    for item in items {
        let key = region(&item).unwrap_or(DEFAULT_REGION).to_string();
        out.entry(key).or_default().push(item);
    }
    out
}

pub fn create_model_features(records: &mut [ProcessedRecord]) {
    let v = values(records);
    let lagged: Vec<(u32, Vec<Option<f64>>)> =
        LAGS.iter().map(|&l| (l, shift(&v, l as usize))).collect();
    let windows: Vec<(u32, [Vec<Option<f64>>; 4])> = ROLLING_WINDOWS
        .iter()
        .map(|&w| {
            let w_us = w as usize;
            (
                w,
                [
                    rolling_mean(&v, w_us),
                    rolling_std(&v, w_us),
                    rolling_min(&v, w_us),
                    rolling_max(&v, w_us),
                ],
            )
        })
        .collect();

    for (i, r) in records.iter_mut().enumerate() {
        for (lag, shifted) in &lagged {
            r.lags.insert(*lag, shifted[i]);
        }
        for (w, [m, s, lo, hi]) in &windows {
            r.rolling.insert(
                *w,
                RollingStats {
                    mean: m[i],
                    std: s[i],
                    min: lo[i],
                    max: hi[i],
                },
            );
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierStats {
    pub outliers_count: usize,
    pub outliers_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub total_records: usize,
    pub missing_values: BTreeMap<String, usize>,
    pub duplicate_records: usize,
    pub date_range: Option<(NaiveDateTime, NaiveDateTime)>,
    pub anomalies: BTreeMap<String, OutlierStats>,
}

fn numeric_columns(r: &ProcessedRecord) -> [(&'static str, Option<f64>); 9] {
    [
        ("value", r.value),
        ("volume", r.volume),
        ("daily_return", r.daily_return),
        ("log_return", r.log_return),
        ("ma_7", r.ma_7),
        ("ma_30", r.ma_30),
        ("ma_90", r.ma_90),
        ("volatility_30", r.volatility_30),
        ("rsi", r.rsi),
    ]
}

pub fn validate_data_quality(records: &[ProcessedRecord]) -> QualityReport {
    let total = records.len();
    let mut missing: BTreeMap<String, usize> = BTreeMap::new();
    let mut columns: BTreeMap<&'static str, Vec<Option<f64>>> = BTreeMap::new();
    for r in records {
        for (name, v) in numeric_columns(r) {
            if v.is_none() {
                *missing.entry(name.to_string()).or_default() += 1;
            } else {
                missing.entry(name.to_string()).or_default();
            }
            columns.entry(name).or_default().push(v);
        }
    }

    let mut seen = HashSet::new();
    let duplicate_records = records
        .iter()
        .filter(|r| !seen.insert((r.at, r.region.clone(), r.value.map(f64::to_bits))))
        .count();

    let date_range = records
        .iter()
        .map(|r| r.at)
        .min()
        .zip(records.iter().map(|r| r.at).max());

    let anomalies = columns
        .into_iter()
        .filter_map(|(name, col)| {
            let observed = present(&col);
            let (lo, hi) = iqr_bounds(&observed, IQR_MULTIPLIER)?;
            let count = observed.iter().filter(|v| **v < lo || **v > hi).count();
            Some((
                name.to_string(),
                OutlierStats {
                    outliers_count: count,
                    outliers_percentage: count as f64 / total as f64 * 100.0,
                },
            ))
        })
        .collect();

    QualityReport {
        total_records: total,
        missing_values: missing,
        duplicate_records,
        date_range,
        anomalies,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceStatistics {
    pub mean: f64,
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    /// Points outside the IQR fences.
    pub anomalies: usize,
    pub statistics: Option<PriceStatistics>,
}

/// Sanity-check a price column. Negative prices (or no column) invalidate it.
pub fn validate_price_data(prices: &[Option<f64>]) -> ValidationReport {
    let mut report = ValidationReport {
        is_valid: true,
        issues: Vec::new(),
        warnings: Vec::new(),
        anomalies: 0,
        statistics: None,
    };
    if prices.is_empty() {
        report.is_valid = false;
        report.issues.push("No price values found".to_string());
        return report;
    }

    let missing = prices.iter().filter(|p| p.is_none()).count();
    if missing > 0 {
        report
            .warnings
            .push(format!("Found {} missing values", missing));
    }
    let observed = present(prices);
    let negative = observed.iter().filter(|p| **p < 0.0).count();
    if negative > 0 {
        report.is_valid = false;
        report
            .issues
            .push(format!("Found {} negative prices", negative));
    }
    let zero = observed.iter().filter(|p| **p == 0.0).count();
    if zero > 0 {
        report.warnings.push(format!("Found {} zero prices", zero));
    }

    report.anomalies = series::detect_anomalies(prices, AnomalyMethod::Iqr, IQR_MULTIPLIER)
        .into_iter()
        .filter(|flagged| *flagged)
        .count();
    if report.anomalies > 0 {
        report
            .warnings
            .push(format!("Found {} anomalous prices (IQR)", report.anomalies));
    }

    if let (Some(mean), Some(median)) = (series::mean(&observed), series::median(&observed)) {
        let std = series::std_dev(&observed, 1);
        if let Some(s) = std {
            let outliers = observed
                .iter()
                .filter(|p| **p > mean + 5.0 * s || **p < mean - 5.0 * s)
                .count();
            if outliers > 0 {
                report
                    .warnings
                    .push(format!("Found {} extreme outliers", outliers));
            }
        }
        report.statistics = Some(PriceStatistics {
            mean,
            std,
            min: observed.iter().copied().fold(f64::INFINITY, f64::min),
            max: observed.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            median,
        });
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn obs(day: u32, v: Option<f64>) -> Observation {
        Observation::daily(NaiveDate::from_ymd_opt(2024, 1, day).unwrap(), v)
    }

    fn records(values: &[f64]) -> Vec<ProcessedRecord> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                ProcessedRecord::from_observation(&Observation::daily(
                    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(i as u64),
                    Some(*v),
                ))
            })
            .collect()
    }

    #[test]
    fn test_clean_drops_outliers_and_fills_gap() {
        let mut input: Vec<Observation> = (1..=7).map(|d| obs(d, Some(10.0 + d as f64))).collect();
        input.push(obs(8, None));
        input.push(obs(9, Some(1000.0)));
        let cleaned = clean_price_data(&input);
        assert_eq!(cleaned.len(), 8);
        // Mean of 11..=17.
        assert_eq!(cleaned[7].value, Some(14.0));
    }

    #[test]
    fn test_clean_keeps_unfillable_gap() {
        let input = vec![obs(1, Some(1.0)), obs(2, None), obs(3, Some(1.2))];
        let cleaned = clean_price_data(&input);
        assert_eq!(cleaned.len(), 3);
        assert_eq!(cleaned[1].value, None);
    }

    #[test]
    fn test_returns() {
        let mut recs = records(&[100.0, 110.0, 99.0]);
        calculate_returns(&mut recs);
        assert_eq!(recs[0].daily_return, None);
        assert!((recs[1].daily_return.unwrap() - 0.1).abs() < 1e-12);
        assert!((recs[2].log_return.unwrap() - (99.0f64 / 110.0).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_indicators_need_full_windows() {
        let vals: Vec<f64> = (1..=30).map(f64::from).collect();
        let mut recs = records(&vals);
        add_technical_indicators(&mut recs);
        assert_eq!(recs[5].ma_7, None);
        assert_eq!(recs[6].ma_7, Some(4.0));
        assert_eq!(recs[29].ma_30, Some(15.5));
        assert!(recs.iter().all(|r| r.ma_90.is_none()));
        // Monotonic rise: no losses.
        assert_eq!(recs[29].rsi, Some(100.0));
        assert_eq!(recs[13].rsi, None);
    }

    #[test]
    fn test_seasonal_flags() {
        let mut recs = records(&[1.0]);
        recs[0].at = NaiveDate::from_ymd_opt(2024, 7, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        process_seasonal_patterns(&mut recs);
        let r = &recs[0];
        assert_eq!((r.year, r.month, r.day_of_week), (2024, 7, 0));
        assert_eq!(r.day_of_year, 197);
        assert_eq!(r.week_of_year, 29);
        assert!(r.is_summer && !r.is_winter && !r.is_shoulder);
    }

    #[test]
    fn test_model_features() {
        let vals: Vec<f64> = (1..=10).map(f64::from).collect();
        let mut recs = records(&vals);
        create_model_features(&mut recs);
        assert_eq!(recs[9].lag(1), Some(9.0));
        assert_eq!(recs[9].lag(7), Some(3.0));
        assert_eq!(recs[9].lag(30), None);
        let r7 = recs[9].rolling[&7];
        assert_eq!((r7.min, r7.max, r7.mean), (Some(4.0), Some(10.0), Some(7.0)));
        assert_eq!(recs[9].rolling[&30].mean, None);
    }

    #[test]
    fn test_regional_split() {
        let mut a = obs(1, Some(1.0));
        a.region = Some("US48".into());
        let b = obs(2, Some(2.0));
        let groups = aggregate_regional_data(vec![a, b], |o| o.region.as_deref());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["US48"].len(), 1);
        assert_eq!(groups[DEFAULT_REGION].len(), 1);
    }

    #[test]
    fn test_quality_report() {
        let mut recs = records(&[1.0, 1.1, 0.9, 1.0, 50.0]);
        recs.push(recs[0].clone());
        let report = validate_data_quality(&recs);
        assert_eq!(report.total_records, 6);
        assert_eq!(report.duplicate_records, 1);
        assert_eq!(report.missing_values["volume"], 6);
        assert_eq!(report.missing_values["value"], 0);
        assert_eq!(report.anomalies["value"].outliers_count, 1);
        let (start, end) = report.date_range.unwrap();
        assert!(start < end);
    }

    #[test]
    fn test_validate_price_data() {
        let ok = validate_price_data(&[Some(2.0), None, Some(0.0), Some(4.0)]);
        assert!(ok.is_valid);
        assert_eq!(ok.warnings.len(), 2);
        let stats = ok.statistics.unwrap();
        assert_eq!((stats.min, stats.max, stats.median), (0.0, 4.0, 2.0));

        let bad = validate_price_data(&[Some(-1.0), Some(2.0)]);
        assert!(!bad.is_valid);
        assert!(!validate_price_data(&[]).is_valid);
    }

    #[test]
    fn test_validate_counts_iqr_anomalies() {
        let spiky = validate_price_data(&[Some(1.0), Some(2.0), Some(2.0), Some(3.0), None, Some(50.0)]);
        assert!(spiky.is_valid);
        assert_eq!(spiky.anomalies, 1);
        assert!(spiky.warnings.iter().any(|w| w.contains("anomalous")));

        let calm = validate_price_data(&[Some(2.0), Some(0.0), Some(4.0)]);
        assert_eq!(calm.anomalies, 0);
    }
}

//! Numeric routines over time-ordered series with gaps.
//!
//! Missing points are `None`. Rolling windows only produce a value once the
//! window is full and contains no gaps.

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation with `ddof` delta degrees of freedom (1 = sample, 0 = population).
pub fn std_dev(values: &[f64], ddof: usize) -> Option<f64> {
    if values.len() <= ddof {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - ddof) as f64).sqrt())
}

/// Quantile with linear interpolation between closest ranks (`q` in [0, 1]).
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// `[Q1 - k*IQR, Q3 + k*IQR]`.
pub fn iqr_bounds(values: &[f64], k: f64) -> Option<(f64, f64)> {
    let q1 = quantile(values, 0.25)?;
    let q3 = quantile(values, 0.75)?;
    let iqr = q3 - q1;
    Some((q1 - k * iqr, q3 + k * iqr))
}

/// Present values only.
pub fn present(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().collect()
}

/// Apply `f` to each full, gap-free trailing window.
pub fn rolling<F>(values: &[Option<f64>], window: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    let mut out = Vec::with_capacity(values.len());
    let mut buf = Vec::with_capacity(window);
    for i in 0..values.len() {
        if window == 0 || i + 1 < window {
            out.push(None);
            continue;
        }
        buf.clear();
        buf.extend(values[i + 1 - window..=i].iter().flatten());
        out.push(if buf.len() == window { f(&buf) } else { None });
    }
    out
}

pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, mean)
}

/// Sample standard deviation per window.
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| std_dev(w, 1))
}

pub fn rolling_min(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| w.iter().copied().reduce(f64::min))
}

pub fn rolling_max(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| w.iter().copied().reduce(f64::max))
}

/// Value `lag` steps back (None for the first `lag` points).
pub fn shift(values: &[Option<f64>], lag: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| if i >= lag { values[i - lag] } else { None })
        .collect()
}

/// First difference.
pub fn diff(values: &[Option<f64>]) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| match (i.checked_sub(1).and_then(|j| values[j]), values[i]) {
            (Some(prev), Some(cur)) => Some(cur - prev),
            _ => None,
        })
        .collect()
}

/// Simple return `p_t / p_{t-1} - 1`.
pub fn pct_change(values: &[Option<f64>]) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| match (i.checked_sub(1).and_then(|j| values[j]), values[i]) {
            (Some(prev), Some(cur)) if prev != 0.0 => Some(cur / prev - 1.0),
            _ => None,
        })
        .collect()
}

/// Log return `ln(p_t / p_{t-1})`. None when either price is non-positive.
pub fn log_returns(values: &[Option<f64>]) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| match (i.checked_sub(1).and_then(|j| values[j]), values[i]) {
            (Some(prev), Some(cur)) if prev > 0.0 && cur > 0.0 => Some((cur / prev).ln()),
            _ => None,
        })
        .collect()
}

/// Relative strength index over `period` observations.
pub fn rsi(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let delta = diff(values);
    let gains: Vec<Option<f64>> = delta.iter().map(|d| d.map(|d| d.max(0.0))).collect();
    let losses: Vec<Option<f64>> = delta.iter().map(|d| d.map(|d| (-d).max(0.0))).collect();
    let avg_gain = rolling_mean(&gains, period);
    let avg_loss = rolling_mean(&losses, period);
    avg_gain
        .iter()
        .zip(avg_loss.iter())
        .map(|(g, l)| match (g, l) {
            (Some(g), Some(l)) if *l > 0.0 => Some(100.0 - 100.0 / (1.0 + g / l)),
            (Some(g), Some(_)) if *g > 0.0 => Some(100.0),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnomalyMethod {
    Iqr,
    ZScore,
}

impl std::str::FromStr for AnomalyMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "iqr" => Ok(Self::Iqr),
            "zscore" | "z-score" => Ok(Self::ZScore),
            other => Err(format!("Unknown anomaly detection method: {}", other)),
        }
    }
}

/// Flags each point as anomalous. Missing points are never flagged.
pub fn detect_anomalies(values: &[Option<f64>], method: AnomalyMethod, threshold: f64) -> Vec<bool> {
    let observed = present(values);
    match method {
        AnomalyMethod::Iqr => match iqr_bounds(&observed, threshold) {
            Some((lo, hi)) => values
                .iter()
                .map(|v| v.is_some_and(|v| v < lo || v > hi))
                .collect(),
            None => vec![false; values.len()],
        },
        AnomalyMethod::ZScore => match (mean(&observed), std_dev(&observed, 1)) {
            (Some(m), Some(s)) if s > 0.0 => values
                .iter()
                .map(|v| v.is_some_and(|v| ((v - m) / s).abs() > threshold))
                .collect(),
            _ => vec![false; values.len()],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(v: &[f64]) -> Vec<Option<f64>> {
        v.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_quantile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&v, 0.25), Some(1.75));
        assert_eq!(quantile(&v, 0.75), Some(3.25));
        assert_eq!(median(&[5.0, 1.0, 3.0]), Some(3.0));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_rolling_mean_requires_full_window() {
        let v = vec![Some(1.0), Some(2.0), None, Some(4.0), Some(5.0), Some(6.0)];
        let out = rolling_mean(&v, 2);
        assert_eq!(out, vec![None, Some(1.5), None, None, Some(4.5), Some(5.5)]);
    }

    #[test]
    fn test_rolling_std_is_sample() {
        let out = rolling_std(&some(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 8);
        let s = out[7].unwrap();
        assert!((s - 2.138089935).abs() < 1e-6);
    }

    #[test]
    fn test_returns() {
        let v = some(&[100.0, 110.0, 99.0]);
        let r = pct_change(&v);
        assert_eq!(r[0], None);
        assert!((r[1].unwrap() - 0.1).abs() < 1e-12);
        assert!((r[2].unwrap() + 0.1).abs() < 1e-12);
        let l = log_returns(&v);
        assert!((l[1].unwrap() - (1.1f64).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let v = some(&(1..=20).map(|x| x as f64).collect::<Vec<_>>());
        let out = rsi(&v, 14);
        assert_eq!(out[13], None);
        assert_eq!(out[14], Some(100.0));
    }

    #[test]
    fn test_rsi_balanced_is_50() {
        let v = some(&[1.0, 2.0, 1.0, 2.0, 1.0]);
        let out = rsi(&v, 4);
        assert_eq!(out[4], Some(50.0));
    }

    #[test]
    fn test_detect_anomalies_iqr_and_zscore() {
        let v = vec![Some(1.0), Some(2.0), Some(2.0), Some(3.0), None, Some(50.0)];
        let iqr = detect_anomalies(&v, AnomalyMethod::Iqr, 1.5);
        assert_eq!(iqr, vec![false, false, false, false, false, true]);
        let z = detect_anomalies(&v, AnomalyMethod::ZScore, 1.5);
        assert!(z[5]);
        assert!(!z[4]);
        assert!("bogus".parse::<AnomalyMethod>().is_err());
    }
}

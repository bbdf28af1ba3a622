//! EIA open-data adapter. Implements EnergySeriesPort.
//!
//! Uses the v2 `seriesid` route, which accepts legacy v1 series ids.

use crate::domain::{DomainError, SeriesPoint};
use crate::ports::EnergySeriesPort;
use crate::shared::rate_limit::RateLimiter;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

const EIA_SERIES_BASE: &str = "https://api.eia.gov/v2/seriesid";

#[derive(Debug, Deserialize)]
struct EiaEnvelope {
    response: Option<EiaResponse>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct EiaResponse {
    #[serde(default)]
    data: Vec<EiaRow>,
}

#[derive(Debug, Deserialize)]
struct EiaRow {
    period: String,
    /// Number, numeric string, or null depending on the series.
    #[serde(default)]
    value: Value,
}

pub struct EiaAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    limiter: RateLimiter,
}

impl EiaAdapter {
    pub fn new(api_key: String, requests_per_minute: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: EIA_SERIES_BASE.to_string(),
            limiter: RateLimiter::new(requests_per_minute),
        }
    }
}

#[async_trait::async_trait]
impl EnergySeriesPort for EiaAdapter {
    async fn fetch_series(
        &self,
        series_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<SeriesPoint>, DomainError> {
        self.limiter.wait_if_needed().await;

        let mut query: Vec<(&str, String)> = vec![("api_key", self.api_key.clone())];
        if let Some(s) = start {
            query.push(("start", s.format("%Y-%m-%d").to_string()));
        }
        if let Some(e) = end {
            query.push(("end", e.format("%Y-%m-%d").to_string()));
        }

        let url = format!("{}/{}", self.base_url, series_id);
        debug!(series_id, "requesting EIA series");
        let resp = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| DomainError::Eia(format!("{}: request failed: {}", series_id, e)))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| DomainError::Eia(format!("{}: read body: {}", series_id, e)))?;
        if !status.is_success() {
            return Err(DomainError::Eia(format!(
                "{}: HTTP {}: {}",
                series_id,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }
        parse_series(series_id, &body)
    }
}

fn parse_series(series_id: &str, body: &str) -> Result<Vec<SeriesPoint>, DomainError> {
    let envelope: EiaEnvelope = serde_json::from_str(body)
        .map_err(|e| DomainError::Eia(format!("{}: invalid response: {}", series_id, e)))?;
    if let Some(err) = envelope.error {
        return Err(DomainError::Eia(format!("{}: {}", series_id, err)));
    }
    let rows = envelope.response.map(|r| r.data).unwrap_or_default();
    let mut points = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(period) = parse_period(&row.period) else {
            warn!(series_id, period = %row.period, "skipping row with unparseable period");
            continue;
        };
        let value = match &row.value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        points.push(SeriesPoint { period, value });
    }
    points.sort_by_key(|p| p.period);
    Ok(points)
}

/// EIA periods: `YYYY`, `YYYY-MM`, `YYYY-MM-DD`, `YYYY-MM-DDTHH` (hourly, UTC).
pub fn parse_period(period: &str) -> Option<NaiveDateTime> {
    let p = period.trim();
    if let Some((date, hour)) = p.split_once('T') {
        let d = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
        let h: u32 = hour.get(..2).unwrap_or(hour).parse().ok()?;
        return d.and_hms_opt(h, 0, 0);
    }
    let date = match p.len() {
        4 => NaiveDate::from_ymd_opt(p.parse().ok()?, 1, 1),
        7 => NaiveDate::parse_from_str(&format!("{}-01", p), "%Y-%m-%d").ok(),
        _ => NaiveDate::parse_from_str(p, "%Y-%m-%d").ok(),
    }?;
    date.and_hms_opt(0, 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_period_formats() {
        assert_eq!(
            parse_period("2024-03-05").unwrap().to_string(),
            "2024-03-05 00:00:00"
        );
        assert_eq!(
            parse_period("2024-03-05T17").unwrap().to_string(),
            "2024-03-05 17:00:00"
        );
        assert_eq!(parse_period("2024-03").unwrap().to_string(), "2024-03-01 00:00:00");
        assert_eq!(parse_period("2023").unwrap().to_string(), "2023-01-01 00:00:00");
        assert!(parse_period("yesterday").is_none());
    }

    #[test]
    fn test_parse_series_sorts_and_reads_string_values() {
        let body = r#"{"response":{"data":[
            {"period":"2024-01-03","value":"2.71"},
            {"period":"2024-01-02","value":2.5},
            {"period":"2024-01-04","value":null}
        ]}}"#;
        let points = parse_series("NG.RNGWHHD.D", body).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].value, Some(2.5));
        assert_eq!(points[1].value, Some(2.71));
        assert_eq!(points[2].value, None);
    }

    #[test]
    fn test_parse_series_error_body() {
        let body = r#"{"error":"invalid api_key"}"#;
        assert!(matches!(parse_series("X", body), Err(DomainError::Eia(_))));
    }
}

//! Yahoo Finance chart adapter. Implements MarketDataPort.
//!
//! Uses the public v8 chart endpoint (no crumb needed): daily bars with pre/post
//! market data and dividend/split events, auto-adjusted with `adjclose / close`.

use crate::domain::{DomainError, PriceBar, TickerHistory};
use crate::ports::MarketDataPort;
use crate::shared::rate_limit::RateLimiter;
use chrono::{DateTime, NaiveDate};
use reqwest::header;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

const YAHOO_CHART_BASE: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const VALID_PERIODS: &[&str] = &[
    "1d", "5d", "1mo", "3mo", "6mo", "1y", "2y", "5y", "10y", "ytd", "max",
];

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
    #[serde(default)]
    events: Option<Events>,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    symbol: String,
    /// Exchange offset from UTC in seconds; bars are dated in exchange time.
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
    #[serde(default)]
    adjclose: Vec<AdjCloseBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseBlock {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct Events {
    #[serde(default)]
    dividends: HashMap<String, DividendEvent>,
    #[serde(default)]
    splits: HashMap<String, SplitEvent>,
}

#[derive(Debug, Deserialize)]
struct DividendEvent {
    amount: f64,
    date: i64,
}

#[derive(Debug, Deserialize)]
struct SplitEvent {
    numerator: f64,
    denominator: f64,
    date: i64,
}

/// Yahoo chart client with a per-minute request budget.
pub struct YahooChartAdapter {
    client: reqwest::Client,
    base_url: String,
    limiter: RateLimiter,
}

impl YahooChartAdapter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: YAHOO_CHART_BASE.to_string(),
            limiter: RateLimiter::new(requests_per_minute),
        }
    }

    /// Override the endpoint (e.g. a proxy or a local fixture server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait::async_trait]
impl MarketDataPort for YahooChartAdapter {
    async fn fetch_history(
        &self,
        symbol: &str,
        period: &str,
    ) -> Result<TickerHistory, DomainError> {
        if !VALID_PERIODS.contains(&period) {
            return Err(DomainError::InvalidInput(format!(
                "unsupported period '{}' (expected one of {})",
                period,
                VALID_PERIODS.join(", ")
            )));
        }
        self.limiter.wait_if_needed().await;

        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), symbol);
        debug!(symbol, period, "requesting Yahoo chart");
        let resp = self
            .client
            .get(&url)
            .header(header::USER_AGENT, USER_AGENT)
            .query(&[
                ("range", period),
                ("interval", "1d"),
                ("includePrePost", "true"),
                ("events", "div,splits"),
            ])
            .send()
            .await
            .map_err(|e| DomainError::MarketData(format!("{}: request failed: {}", symbol, e)))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| DomainError::MarketData(format!("{}: read body: {}", symbol, e)))?;

        // Yahoo answers unknown symbols with 404 and a JSON error body.
        let envelope: ChartEnvelope = match serde_json::from_str(&body) {
            Ok(env) => env,
            Err(e) if status.is_success() => {
                return Err(DomainError::MarketData(format!(
                    "{}: invalid chart response: {}",
                    symbol, e
                )));
            }
            Err(_) => {
                return Err(DomainError::MarketData(format!(
                    "{}: HTTP {}",
                    symbol, status
                )));
            }
        };
        parse_chart(symbol, envelope)
    }
}

fn parse_chart(symbol: &str, envelope: ChartEnvelope) -> Result<TickerHistory, DomainError> {
    if let Some(err) = envelope.chart.error {
        if err.code.eq_ignore_ascii_case("Not Found") {
            return Ok(TickerHistory {
                symbol: symbol.to_string(),
                bars: Vec::new(),
            });
        }
        return Err(DomainError::MarketData(format!(
            "{}: {} ({})",
            symbol, err.description, err.code
        )));
    }
    let result = envelope
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
        .ok_or_else(|| DomainError::MarketData(format!("{}: empty chart result", symbol)))?;
    Ok(TickerHistory {
        symbol: result.meta.symbol.clone(),
        bars: bars_from_chart(&result),
    })
}

fn local_date(ts: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts + gmtoffset, 0).map(|dt| dt.date_naive())
}

/// Build adjusted daily bars. Rows with no prices are dropped; a later row for
/// the same exchange date (the live bar) replaces the earlier one.
fn bars_from_chart(result: &ChartResult) -> Vec<PriceBar> {
    let offset = result.meta.gmtoffset;
    let empty = QuoteBlock::default();
    let quote = result.indicators.quote.first().unwrap_or(&empty);
    let adjclose = result.indicators.adjclose.first().map(|a| &a.adjclose);
    let at = |v: &Vec<Option<f64>>, i: usize| v.get(i).copied().flatten();

    let mut dividends: HashMap<NaiveDate, f64> = HashMap::new();
    let mut splits: HashMap<NaiveDate, f64> = HashMap::new();
    if let Some(events) = &result.events {
        for d in events.dividends.values() {
            if let Some(date) = local_date(d.date, offset) {
                *dividends.entry(date).or_insert(0.0) += d.amount;
            }
        }
        for s in events.splits.values() {
            if let Some(date) = local_date(s.date, offset) {
                if s.denominator != 0.0 {
                    splits.insert(date, s.numerator / s.denominator);
                }
            }
        }
    }

    let mut by_date: BTreeMap<NaiveDate, PriceBar> = BTreeMap::new();
    for (i, &ts) in result.timestamp.iter().enumerate() {
        let Some(date) = local_date(ts, offset) else {
            continue;
        };
        let (open, high, low, close) = (
            at(&quote.open, i),
            at(&quote.high, i),
            at(&quote.low, i),
            at(&quote.close, i),
        );
        if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
            continue;
        }
        let ratio = match (close, adjclose.and_then(|a| at(a, i))) {
            (Some(c), Some(adj)) if c != 0.0 => adj / c,
            _ => 1.0,
        };
        let adjust = |v: Option<f64>| v.map(|v| v * ratio);
        by_date.insert(
            date,
            PriceBar {
                date,
                open: adjust(open),
                high: adjust(high),
                low: adjust(low),
                close: adjust(close),
                volume: at(&quote.volume, i).map(|v| v.max(0.0).round() as u64),
                dividends: dividends.get(&date).copied().unwrap_or(0.0),
                stock_splits: splits.get(&date).copied().unwrap_or(0.0),
            },
        );
    }
    by_date.into_values().collect()
}

//! Yahoo chart API client

use super::{HistoricalSource, HistoryError, HistoryRange, Ohlcv};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

/// Chart API base URL
pub const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com";

/// Decimal places kept from upstream floats
const PRICE_DP: u32 = 4;

/// Configuration for the chart client
#[derive(Debug, Clone)]
pub struct YahooConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: YAHOO_CHART_URL.to_string(),
            timeout: Duration::from_secs(10),
            user_agent: "Mozilla/5.0 (compatible; breadboard/0.1)".to_string(),
        }
    }
}

/// Daily bars from `/v8/finance/chart/{symbol}`
pub struct YahooChartClient {
    config: YahooConfig,
    client: Client,
}

impl YahooChartClient {
    pub fn new(config: YahooConfig) -> Result<Self, HistoryError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self { config, client })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }
}

#[async_trait]
impl HistoricalSource for YahooChartClient {
    async fn fetch(&self, symbol: &str, range: &HistoryRange) -> Result<Vec<Ohlcv>, HistoryError> {
        let url = format!("{}/v8/finance/chart/{}", self.config.base_url, symbol);
        tracing::debug!(url = %url, ?range, "Fetching daily bars");

        let response = self
            .client
            .get(&url)
            .query(&query_params(range))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed = parse_chart(symbol, &body);

        // The API reports unknown symbols as 404 with a JSON error body
        if !status.is_success() {
            return match parsed {
                Err(e @ HistoryError::Api { .. }) => Err(e),
                _ => Err(HistoryError::Api {
                    symbol: symbol.to_string(),
                    message: format!("HTTP {}", status),
                }),
            };
        }
        parsed
    }
}

fn query_params(range: &HistoryRange) -> Vec<(&'static str, String)> {
    let mut params = vec![("interval", "1d".to_string())];
    match range {
        HistoryRange::Period(period) => params.push(("range", period.clone())),
        HistoryRange::Dates { start, end } => {
            params.push(("period1", day_start_secs(*start).to_string()));
            params.push(("period2", day_start_secs(*end).to_string()));
        }
    }
    params
}

fn day_start_secs(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
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
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

/// Convert a chart response into bars. Rows with any null field are
/// skipped; bar dates are in the exchange's local calendar.
fn parse_chart(symbol: &str, body: &str) -> Result<Vec<Ohlcv>, HistoryError> {
    let envelope: ChartEnvelope =
        serde_json::from_str(body).map_err(|e| HistoryError::Parse(e.to_string()))?;

    if let Some(err) = envelope.chart.error {
        return Err(HistoryError::Api {
            symbol: symbol.to_string(),
            message: format!("{}: {}", err.code, err.description),
        });
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };
    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Ok(Vec::new());
    };

    let value = |column: &[Option<f64>], i: usize| {
        column
            .get(i)
            .copied()
            .flatten()
            .and_then(Decimal::from_f64)
            .map(|d| d.round_dp(PRICE_DP))
    };

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        let row = (
            DateTime::from_timestamp(ts + result.meta.gmtoffset, 0),
            value(&quote.open, i),
            value(&quote.high, i),
            value(&quote.low, i),
            value(&quote.close, i),
            quote.volume.get(i).copied().flatten(),
        );
        let (Some(at), Some(open), Some(high), Some(low), Some(close), Some(volume)) = row else {
            tracing::debug!(symbol, ts, "Skipping incomplete bar");
            continue;
        };
        bars.push(Ohlcv {
            symbol: symbol.to_string(),
            date: at.date_naive(),
            open,
            high,
            low,
            close,
            volume,
        });
    }
    Ok(bars)
}

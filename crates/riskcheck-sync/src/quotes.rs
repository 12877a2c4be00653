//! Quote/history upstream adapter (Upstream A).
//!
//! Daily bars come from a chart-style endpoint whose payload is parallel
//! timestamp/OHLCV arrays with nullable entries; company metadata comes
//! from a summary endpoint. Rows without a close are discarded — the feed
//! emits them for halted or not-yet-settled sessions.

use serde::Deserialize;
use tracing::debug;

use riskcheck_core::{
    CalendarDate, HistoricalBar, HttpRequest, RateLimitedClient, Symbol, UpstreamError,
};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Company metadata consumed by the catalyst pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyProfile {
    pub symbol: Symbol,
    pub name: Option<String>,
    pub industry: Option<String>,
}

/// Rate-limited client for the quote/history upstream.
#[derive(Clone)]
pub struct QuotesClient {
    client: RateLimitedClient,
    base_url: String,
}

impl QuotesClient {
    pub fn new(client: RateLimitedClient) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch daily bars covering `[from, to]`, both inclusive.
    ///
    /// Non-trading days simply have no row; the returned series is sorted
    /// ascending with one bar per date.
    pub async fn fetch_daily_bars(
        &self,
        symbol: &Symbol,
        from: CalendarDate,
        to: CalendarDate,
    ) -> Result<Vec<HistoricalBar>, UpstreamError> {
        let url = format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval=1d&events=history",
            self.base_url,
            urlencoding::encode(symbol.as_str()),
            from.unix_midnight(),
            to.succ().unix_midnight(),
        );

        let response = self.client.fetch_with_retry(HttpRequest::get(url)).await?;
        let parsed: ChartResponse = serde_json::from_str(&response.body).map_err(|error| {
            UpstreamError::invalid_payload(
                self.client.provider(),
                format!("failed to parse chart response: {error}"),
            )
        })?;

        if let Some(error) = parsed.chart.error.as_deref().filter(|e| !e.is_empty()) {
            return Err(UpstreamError::invalid_payload(
                self.client.provider(),
                format!("chart API error: {error}"),
            ));
        }

        let Some(result) = parsed.chart.result.into_iter().next() else {
            debug!(symbol = %symbol, "chart response held no result set");
            return Ok(Vec::new());
        };

        let timestamps = result.timestamp.unwrap_or_default();
        let Some(quote) = result.indicators.quote.into_iter().next() else {
            return Ok(Vec::new());
        };

        let mut bars = Vec::with_capacity(timestamps.len());
        for (index, &ts) in timestamps.iter().enumerate() {
            let Some(date) = CalendarDate::from_unix_timestamp(ts) else {
                continue;
            };
            if date < from || date > to {
                continue;
            }

            // A row with no close is provisional; drop it.
            let Some(close) = quote.close.get(index).copied().flatten() else {
                continue;
            };
            let open = quote.open.get(index).copied().flatten().unwrap_or(close);
            let high = quote.high.get(index).copied().flatten().unwrap_or(close);
            let low = quote.low.get(index).copied().flatten().unwrap_or(close);
            let volume = quote
                .volume
                .get(index)
                .copied()
                .flatten()
                .and_then(|v| u64::try_from(v).ok());

            if let Ok(bar) = HistoricalBar::new(date, open, high, low, close, volume) {
                bars.push(bar);
            }
        }

        bars.sort_by_key(|bar| bar.date);
        bars.dedup_by_key(|bar| bar.date);
        Ok(bars)
    }

    /// Fetch company name and industry classification.
    pub async fn fetch_profile(&self, symbol: &Symbol) -> Result<CompanyProfile, UpstreamError> {
        let url = format!(
            "{}/v10/finance/quoteSummary/{}?modules=assetProfile,price",
            self.base_url,
            urlencoding::encode(symbol.as_str()),
        );

        let response = self.client.fetch_with_retry(HttpRequest::get(url)).await?;
        let parsed: SummaryResponse = serde_json::from_str(&response.body).map_err(|error| {
            UpstreamError::invalid_payload(
                self.client.provider(),
                format!("failed to parse summary response: {error}"),
            )
        })?;

        let result = parsed
            .quote_summary
            .result
            .into_iter()
            .next()
            .unwrap_or_default();

        Ok(CompanyProfile {
            symbol: symbol.clone(),
            name: result.price.and_then(|price| price.long_name),
            industry: result.asset_profile.and_then(|profile| profile.industry),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartData,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    result: Vec<ChartResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: SummaryData,
}

#[derive(Debug, Deserialize)]
struct SummaryData {
    #[serde(default)]
    result: Vec<SummaryResult>,
}

#[derive(Debug, Default, Deserialize)]
struct SummaryResult {
    #[serde(rename = "assetProfile", default)]
    asset_profile: Option<AssetProfile>,
    #[serde(default)]
    price: Option<PriceModule>,
}

#[derive(Debug, Deserialize)]
struct AssetProfile {
    #[serde(default)]
    industry: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceModule {
    #[serde(rename = "longName", default)]
    long_name: Option<String>,
}

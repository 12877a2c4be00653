//! Filings registry upstream adapter (Upstream B).
//!
//! Three surfaces: the bulk ticker→identifier mapping (fetched once per
//! process and memoized behind a single-flight guard), the per-issuer
//! submissions index (parallel arrays zipped into rows), and raw filing
//! documents (HTML, stripped to text before pattern matching).

use std::collections::HashMap;

use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::debug;

use riskcheck_core::{
    CalendarDate, HttpRequest, RateLimitedClient, Symbol, UpstreamError,
};

use crate::html::strip_html;

const DEFAULT_SUBMISSIONS_URL: &str = "https://data.sec.gov";
const DEFAULT_MAPPING_URL: &str = "https://www.sec.gov/files/company_tickers.json";
const DEFAULT_ARCHIVES_URL: &str = "https://www.sec.gov/Archives";

/// One row of an issuer's submissions index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filing {
    pub form: String,
    pub filing_date: CalendarDate,
    pub item_codes: Vec<String>,
    pub accession_number: Option<String>,
    pub primary_document: Option<String>,
}

/// Rate-limited client for the filings registry.
pub struct FilingsClient {
    client: RateLimitedClient,
    submissions_url: String,
    mapping_url: String,
    archives_url: String,
    /// Single-flight memo of the bulk ticker→identifier mapping: concurrent
    /// first callers share one in-flight load.
    ticker_map: OnceCell<HashMap<String, String>>,
}

impl FilingsClient {
    pub fn new(client: RateLimitedClient) -> Self {
        Self {
            client,
            submissions_url: DEFAULT_SUBMISSIONS_URL.to_owned(),
            mapping_url: DEFAULT_MAPPING_URL.to_owned(),
            archives_url: DEFAULT_ARCHIVES_URL.to_owned(),
            ticker_map: OnceCell::new(),
        }
    }

    pub fn with_base_urls(
        mut self,
        submissions_url: impl Into<String>,
        mapping_url: impl Into<String>,
        archives_url: impl Into<String>,
    ) -> Self {
        self.submissions_url = submissions_url.into();
        self.mapping_url = mapping_url.into();
        self.archives_url = archives_url.into();
        self
    }

    /// Resolve a ticker to its zero-padded registry identifier, or `None`
    /// for instruments the registry does not track.
    pub async fn registry_id(&self, symbol: &Symbol) -> Result<Option<String>, UpstreamError> {
        let map = self
            .ticker_map
            .get_or_try_init(|| self.load_ticker_map())
            .await?;
        Ok(map.get(symbol.as_str()).cloned())
    }

    async fn load_ticker_map(&self) -> Result<HashMap<String, String>, UpstreamError> {
        debug!("loading bulk ticker mapping");
        let response = self
            .client
            .fetch_with_retry(HttpRequest::get(self.mapping_url.clone()))
            .await?;

        let entries: HashMap<String, TickerEntry> = serde_json::from_str(&response.body)
            .map_err(|error| {
                UpstreamError::invalid_payload(
                    self.client.provider(),
                    format!("failed to parse ticker mapping: {error}"),
                )
            })?;

        Ok(entries
            .into_values()
            .map(|entry| (entry.ticker.to_ascii_uppercase(), format!("{:010}", entry.cik)))
            .collect())
    }

    /// Fetch the issuer's submissions index, newest filings first as the
    /// registry serves them. Rows with undecodable dates are skipped.
    pub async fn submissions(&self, registry_id: &str) -> Result<Vec<Filing>, UpstreamError> {
        let url = format!("{}/submissions/CIK{}.json", self.submissions_url, registry_id);
        let response = self.client.fetch_with_retry(HttpRequest::get(url)).await?;

        let parsed: SubmissionsResponse = serde_json::from_str(&response.body).map_err(
            |error| {
                UpstreamError::invalid_payload(
                    self.client.provider(),
                    format!("failed to parse submissions index: {error}"),
                )
            },
        )?;

        let recent = parsed.filings.recent;
        let mut filings = Vec::with_capacity(recent.form.len());
        for (index, form) in recent.form.iter().enumerate() {
            let Some(raw_date) = recent.filing_date.get(index) else {
                continue;
            };
            let Ok(filing_date) = CalendarDate::parse(raw_date) else {
                debug!(form, raw_date, "skipping filing row with undecodable date");
                continue;
            };

            let item_codes = recent
                .items
                .get(index)
                .map(|codes| {
                    codes
                        .split(',')
                        .map(str::trim)
                        .filter(|code| !code.is_empty())
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default();

            filings.push(Filing {
                form: form.clone(),
                filing_date,
                item_codes,
                accession_number: recent
                    .accession_number
                    .get(index)
                    .filter(|value| !value.is_empty())
                    .cloned(),
                primary_document: recent
                    .primary_document
                    .get(index)
                    .filter(|value| !value.is_empty())
                    .cloned(),
            });
        }

        Ok(filings)
    }

    /// Archive location of one filing's primary document.
    pub fn document_url(
        &self,
        registry_id: &str,
        accession_number: &str,
        primary_document: &str,
    ) -> String {
        format!(
            "{}/edgar/data/{}/{}/{}",
            self.archives_url,
            registry_id.trim_start_matches('0'),
            accession_number.replace('-', ""),
            primary_document,
        )
    }

    /// Fetch one filing document and strip its markup to plain text.
    pub async fn document_text(&self, url: &str) -> Result<String, UpstreamError> {
        let response = self
            .client
            .fetch_document_with_retry(HttpRequest::get(url.to_owned()))
            .await?;
        Ok(strip_html(&response.body))
    }
}

#[derive(Debug, Deserialize)]
struct TickerEntry {
    #[serde(rename = "cik_str")]
    cik: u64,
    ticker: String,
}

#[derive(Debug, Deserialize)]
struct SubmissionsResponse {
    filings: SubmissionFilings,
}

#[derive(Debug, Deserialize)]
struct SubmissionFilings {
    recent: RecentFilings,
}

/// Parallel arrays, one entry per filing.
#[derive(Debug, Deserialize)]
struct RecentFilings {
    #[serde(default)]
    form: Vec<String>,
    #[serde(rename = "filingDate", default)]
    filing_date: Vec<String>,
    #[serde(default)]
    items: Vec<String>,
    #[serde(rename = "accessionNumber", default)]
    accession_number: Vec<String>,
    #[serde(rename = "primaryDocument", default)]
    primary_document: Vec<String>,
}

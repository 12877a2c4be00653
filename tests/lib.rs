//! Shared fixtures for the behavior suites: a scripted HTTP transport and
//! upstream payload builders.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use riskcheck_core::{CalendarDate, HttpClient, HttpError, HttpRequest, HttpResponse};
use time::Weekday;

type Responder = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, HttpError> + Send + Sync>;

/// Routes requests by URL substring and records every request it sees.
/// Unrouted URLs answer 404.
pub struct MockHttpClient {
    routes: Vec<(String, Responder)>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl Default for MockHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Serve a fixed JSON body for URLs containing `fragment`.
    pub fn route_json(self, fragment: &str, body: impl Into<String>) -> Self {
        let body = body.into();
        self.route_with(fragment, move |_| Ok(HttpResponse::ok_json(body.clone())))
    }

    /// Serve a fixed status/body for URLs containing `fragment`.
    pub fn route_status(self, fragment: &str, status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        self.route_with(fragment, move |_| {
            Ok(HttpResponse::with_status(status, body.clone()))
        })
    }

    /// Serve a computed response for URLs containing `fragment`.
    pub fn route_with(
        mut self,
        fragment: &str,
        responder: impl Fn(&HttpRequest) -> Result<HttpResponse, HttpError> + Send + Sync + 'static,
    ) -> Self {
        self.routes.push((fragment.to_owned(), Box::new(responder)));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .clone()
    }

    pub fn total_calls(&self) -> usize {
        self.requests().len()
    }

    pub fn calls_matching(&self, fragment: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.url.contains(fragment))
            .count()
    }
}

impl HttpClient for MockHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .push(request.clone());

        let outcome = self
            .routes
            .iter()
            .find(|(fragment, _)| request.url.contains(fragment))
            .map(|(_, responder)| responder(&request))
            .unwrap_or_else(|| {
                Ok(HttpResponse::with_status(
                    404,
                    format!("no route for {}", request.url),
                ))
            });

        Box::pin(async move { outcome })
    }
}

/// Extract an integer query parameter from a URL.
pub fn query_param_i64(url: &str, name: &str) -> Option<i64> {
    let marker = format!("{name}=");
    let start = url.find(&marker)? + marker.len();
    let rest = &url[start..];
    let end = rest.find('&').unwrap_or(rest.len());
    rest[..end].parse().ok()
}

/// Weekdays in the inclusive range; the fake feed trades Monday–Friday.
pub fn weekdays_between(start: CalendarDate, end: CalendarDate) -> Vec<CalendarDate> {
    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        let weekday = current.into_inner().weekday();
        if weekday != Weekday::Saturday && weekday != Weekday::Sunday {
            dates.push(current);
        }
        current = current.succ();
    }
    dates
}

/// Chart payload holding one bar per given date, priced from `base`.
pub fn chart_body(dates: &[CalendarDate], base: f64) -> String {
    let timestamps: Vec<i64> = dates.iter().map(|date| date.unix_midnight()).collect();
    let closes: Vec<f64> = (0..dates.len()).map(|i| base + i as f64 * 0.5).collect();
    let opens: Vec<f64> = closes.iter().map(|c| c - 0.25).collect();
    let highs: Vec<f64> = closes.iter().map(|c| c + 1.0).collect();
    let lows: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();
    let volumes: Vec<i64> = (0..dates.len()).map(|i| 10_000 + i as i64 * 25).collect();

    serde_json::json!({
        "chart": {
            "result": [{
                "timestamp": timestamps,
                "indicators": {
                    "quote": [{
                        "open": opens,
                        "high": highs,
                        "low": lows,
                        "close": closes,
                        "volume": volumes,
                    }]
                }
            }],
            "error": null,
        }
    })
    .to_string()
}

/// Chart payload answering whatever window the URL requested, weekdays only.
pub fn chart_body_for_url(url: &str, base: f64) -> String {
    let Some(period1) = query_param_i64(url, "period1") else {
        return chart_body(&[], base);
    };
    let Some(period2) = query_param_i64(url, "period2") else {
        return chart_body(&[], base);
    };

    let start = CalendarDate::from_unix_timestamp(period1).expect("period1 in range");
    let end_exclusive = CalendarDate::from_unix_timestamp(period2).expect("period2 in range");
    let dates = weekdays_between(start, end_exclusive.pred());
    chart_body(&dates, base)
}

/// Chart payload with no trading days at all.
pub fn empty_chart_body() -> String {
    chart_body(&[], 0.0)
}

/// Bulk ticker mapping payload.
pub fn ticker_map_body(entries: &[(&str, u64)]) -> String {
    let map: serde_json::Map<String, serde_json::Value> = entries
        .iter()
        .enumerate()
        .map(|(index, (ticker, cik))| {
            (
                index.to_string(),
                serde_json::json!({
                    "cik_str": cik,
                    "ticker": ticker,
                    "title": format!("{ticker} Inc."),
                }),
            )
        })
        .collect();
    serde_json::Value::Object(map).to_string()
}

/// One submissions-index row: form, filing date, item codes, accession,
/// primary document.
pub struct FilingRow {
    pub form: &'static str,
    pub filing_date: String,
    pub items: &'static str,
    pub accession_number: &'static str,
    pub primary_document: &'static str,
}

/// Submissions index payload in the registry's parallel-array layout.
pub fn submissions_body(rows: &[FilingRow]) -> String {
    serde_json::json!({
        "filings": {
            "recent": {
                "form": rows.iter().map(|r| r.form).collect::<Vec<_>>(),
                "filingDate": rows.iter().map(|r| r.filing_date.clone()).collect::<Vec<_>>(),
                "items": rows.iter().map(|r| r.items).collect::<Vec<_>>(),
                "accessionNumber": rows.iter().map(|r| r.accession_number).collect::<Vec<_>>(),
                "primaryDocument": rows.iter().map(|r| r.primary_document).collect::<Vec<_>>(),
            }
        }
    })
    .to_string()
}

/// Trials search payload with one study per entry.
pub fn studies_body(studies: &[(&str, &str, &str, &str)]) -> String {
    // (nct_id, phase, completion_date, status)
    serde_json::json!({
        "studies": studies.iter().map(|(nct_id, phase, completion, status)| {
            serde_json::json!({
                "protocolSection": {
                    "identificationModule": {
                        "nctId": nct_id,
                        "briefTitle": format!("Study {nct_id}"),
                    },
                    "statusModule": {
                        "overallStatus": status,
                        "primaryCompletionDateStruct": {
                            "date": completion,
                            "type": "ESTIMATED",
                        }
                    },
                    "designModule": { "phases": [phase] }
                }
            })
        }).collect::<Vec<_>>()
    })
    .to_string()
}

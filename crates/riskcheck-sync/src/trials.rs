//! Trials registry upstream adapter and its incremental pipeline
//! (Upstream C).
//!
//! The registry has no filing-date axis to high-water-mark against, so the
//! incremental bound is calendar-day freshness: one successful sync per
//! symbol per day, cache served in between. Failure semantics match the
//! filings pipeline — any upstream error returns the prior state unchanged.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use riskcheck_core::{
    cache, CacheStore, CalendarDate, CatalystCacheRecord, CatalystEvent, CatalystEventType,
    EventSource, HttpRequest, RateLimitedClient, Symbol, UpstreamError, TTL_FOREVER,
};

use crate::catalyst::{catalysts_key, CatalystSyncOutcome};
use crate::dates::parse_registry_date;

const DEFAULT_BASE_URL: &str = "https://clinicaltrials.gov/api/v2";
const PAGE_SIZE: usize = 50;

/// Completion dates further out than this are too remote to be catalysts.
const HORIZON_DAYS: u32 = 730;

/// One study record, already reduced to the fields the pipeline consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Study {
    pub nct_id: String,
    pub title: String,
    pub phases: Vec<String>,
    pub overall_status: Option<String>,
    pub primary_completion: Option<String>,
    pub completion_is_anticipated: bool,
}

/// Rate-limited client for the trials registry.
#[derive(Clone)]
pub struct TrialsClient {
    client: RateLimitedClient,
    base_url: String,
}

impl TrialsClient {
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

    /// Search interventional studies by sponsor name.
    pub async fn search_studies(&self, sponsor: &str) -> Result<Vec<Study>, UpstreamError> {
        let url = format!(
            "{}/studies?query.spons={}&pageSize={}",
            self.base_url,
            urlencoding::encode(sponsor),
            PAGE_SIZE,
        );

        let response = self.client.fetch_with_retry(HttpRequest::get(url)).await?;
        let parsed: StudiesResponse = serde_json::from_str(&response.body).map_err(|error| {
            UpstreamError::invalid_payload(
                self.client.provider(),
                format!("failed to parse studies response: {error}"),
            )
        })?;

        Ok(parsed
            .studies
            .into_iter()
            .filter_map(|record| {
                let protocol = record.protocol_section?;
                let identification = protocol.identification_module?;
                let status = protocol.status_module.unwrap_or_default();
                let completion = status.primary_completion_date_struct.unwrap_or_default();

                Some(Study {
                    nct_id: identification.nct_id?,
                    title: identification.brief_title.unwrap_or_default(),
                    phases: protocol
                        .design_module
                        .and_then(|design| design.phases)
                        .unwrap_or_default(),
                    overall_status: status.overall_status,
                    primary_completion: completion.date,
                    completion_is_anticipated: completion
                        .date_type
                        .map(|t| t.eq_ignore_ascii_case("estimated") || t.eq_ignore_ascii_case("anticipated"))
                        .unwrap_or(false),
                })
            })
            .collect())
    }
}

/// Incremental trial-completion synchronizer.
pub struct TrialsSynchronizer {
    trials: TrialsClient,
    store: Arc<dyn CacheStore>,
}

impl TrialsSynchronizer {
    pub fn new(trials: TrialsClient, store: Arc<dyn CacheStore>) -> Self {
        Self { trials, store }
    }

    /// Best-effort sync; on any upstream failure the previously cached
    /// state is returned unchanged.
    pub async fn get_trial_events(
        &self,
        symbol: &Symbol,
        company_name: &str,
    ) -> CatalystSyncOutcome {
        let key = catalysts_key(symbol);
        let prior: CatalystCacheRecord = cache::get_json(self.store.as_ref(), &key)
            .await
            .unwrap_or_else(|| CatalystCacheRecord::empty(symbol.clone()));

        let today = CalendarDate::today_utc();
        if prior.trials_last_fetched == Some(today) {
            debug!(symbol = %symbol, "trials already synced today, serving cache");
            return CatalystSyncOutcome {
                events: prior.events_for(EventSource::Trials),
                last_fetched_date: prior.trials_last_fetched,
            };
        }

        match self.sync(symbol, company_name, &prior, today).await {
            Ok(updated) => {
                if let Err(error) =
                    cache::set_json(self.store.as_ref(), &key, &updated, TTL_FOREVER).await
                {
                    warn!(symbol = %symbol, %error, "failed to persist trials state");
                }
                CatalystSyncOutcome {
                    events: updated.events_for(EventSource::Trials),
                    last_fetched_date: updated.trials_last_fetched,
                }
            }
            Err(error) => {
                warn!(symbol = %symbol, %error, "trials sync failed, serving cached state");
                CatalystSyncOutcome {
                    events: prior.events_for(EventSource::Trials),
                    last_fetched_date: prior.trials_last_fetched,
                }
            }
        }
    }

    async fn sync(
        &self,
        symbol: &Symbol,
        company_name: &str,
        prior: &CatalystCacheRecord,
        today: CalendarDate,
    ) -> Result<CatalystCacheRecord, UpstreamError> {
        let horizon = today.days_after(HORIZON_DAYS);
        let mut events = prior.events_for(EventSource::Trials);
        let mut seen: std::collections::HashSet<String> =
            events.iter().map(|event| event.id.clone()).collect();

        let studies = self.trials.search_studies(company_name).await?;
        for study in &studies {
            if !is_relevant(study) {
                continue;
            }
            let Some(parsed) = study
                .primary_completion
                .as_deref()
                .and_then(parse_registry_date)
            else {
                continue;
            };
            if parsed.date < today || parsed.date > horizon {
                continue;
            }

            let id = CatalystEvent::id_for(
                EventSource::Trials,
                CatalystEventType::TrialCompletion,
                symbol,
                parsed.date,
                Some(&study.nct_id),
            );
            if !seen.insert(id.clone()) {
                continue;
            }

            events.push(CatalystEvent {
                id,
                symbol: symbol.clone(),
                event_type: CatalystEventType::TrialCompletion,
                date: parsed.date,
                is_estimate: parsed.approximate || study.completion_is_anticipated,
                title: completion_title(&study.phases),
                description: study.title.clone(),
                source: EventSource::Trials,
                source_url: Some(format!(
                    "https://clinicaltrials.gov/study/{}",
                    study.nct_id
                )),
            });
        }

        let mut merged = prior.events_excluding(EventSource::Trials);
        merged.extend(events);

        Ok(CatalystCacheRecord {
            symbol: symbol.clone(),
            filings_last_fetched: prior.filings_last_fetched,
            trials_last_fetched: Some(
                prior
                    .trials_last_fetched
                    .map_or(today, |previous| previous.max(today)),
            ),
            events: merged,
        })
    }
}

fn is_relevant(study: &Study) -> bool {
    let late_stage = study
        .phases
        .iter()
        .any(|phase| matches!(phase.as_str(), "PHASE2" | "PHASE3"));
    let live = !matches!(
        study.overall_status.as_deref(),
        Some("WITHDRAWN") | Some("TERMINATED") | Some("SUSPENDED")
    );
    late_stage && live
}

fn completion_title(phases: &[String]) -> String {
    if phases.iter().any(|phase| phase == "PHASE3") {
        "Phase 3 trial primary completion".to_owned()
    } else {
        "Phase 2 trial primary completion".to_owned()
    }
}

#[derive(Debug, Deserialize)]
struct StudiesResponse {
    #[serde(default)]
    studies: Vec<StudyRecord>,
}

#[derive(Debug, Deserialize)]
struct StudyRecord {
    #[serde(rename = "protocolSection")]
    protocol_section: Option<ProtocolSection>,
}

#[derive(Debug, Deserialize)]
struct ProtocolSection {
    #[serde(rename = "identificationModule")]
    identification_module: Option<IdentificationModule>,
    #[serde(rename = "statusModule")]
    status_module: Option<StatusModule>,
    #[serde(rename = "designModule")]
    design_module: Option<DesignModule>,
}

#[derive(Debug, Deserialize)]
struct IdentificationModule {
    #[serde(rename = "nctId")]
    nct_id: Option<String>,
    #[serde(rename = "briefTitle")]
    brief_title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusModule {
    #[serde(rename = "overallStatus")]
    overall_status: Option<String>,
    #[serde(rename = "primaryCompletionDateStruct")]
    primary_completion_date_struct: Option<CompletionDateStruct>,
}

#[derive(Debug, Default, Deserialize)]
struct CompletionDateStruct {
    date: Option<String>,
    #[serde(rename = "type")]
    date_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DesignModule {
    phases: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn study(phases: &[&str], status: Option<&str>) -> Study {
        Study {
            nct_id: "NCT01234567".to_owned(),
            title: "A pivotal study".to_owned(),
            phases: phases.iter().map(|p| p.to_string()).collect(),
            overall_status: status.map(str::to_owned),
            primary_completion: Some("2026-06".to_owned()),
            completion_is_anticipated: true,
        }
    }

    #[test]
    fn late_stage_live_studies_are_relevant() {
        assert!(is_relevant(&study(&["PHASE3"], Some("RECRUITING"))));
        assert!(is_relevant(&study(&["PHASE2"], None)));
        assert!(!is_relevant(&study(&["PHASE1"], Some("RECRUITING"))));
        assert!(!is_relevant(&study(&["PHASE3"], Some("TERMINATED"))));
    }

    #[test]
    fn titles_prefer_the_latest_phase() {
        assert_eq!(
            completion_title(&["PHASE2".to_owned(), "PHASE3".to_owned()]),
            "Phase 3 trial primary completion"
        );
        assert_eq!(
            completion_title(&["PHASE2".to_owned()]),
            "Phase 2 trial primary completion"
        );
    }
}

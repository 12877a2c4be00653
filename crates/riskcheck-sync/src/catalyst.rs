//! Per-symbol high-water-mark filing scanner.
//!
//! Only filings dated after the stored high-water mark (and within the
//! lookback bound) are processed. Known 8-K item codes map straight to
//! events; biotech issuers with regulatory-flavored codes additionally get
//! their filing documents mined by the extraction engine; shelf
//! registrations become a single at-the-market event. Every candidate id is
//! deterministic and deduplicated against both this run and the seeded
//! prior cache. Any upstream failure returns the prior state unchanged —
//! the mark never regresses and known events are never dropped.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use riskcheck_core::{
    cache, CacheStore, CalendarDate, CatalystCacheRecord, CatalystEvent, CatalystEventType,
    EventSource, Symbol, UpstreamError, TTL_FOREVER,
};

use crate::extract::PatternExtractionEngine;
use crate::filings::{Filing, FilingsClient};
use crate::item_codes;

pub fn catalysts_key(symbol: &Symbol) -> String {
    format!("catalysts:{symbol}")
}

const DEFAULT_LOOKBACK_DAYS: u32 = 365;

/// Industry labels whose filings are worth mining for regulatory text.
const LIFE_SCIENCE_MARKERS: [&str; 5] =
    ["biotech", "pharma", "drug", "therapeutic", "life science"];

/// Result of one catalyst sync: this source's events plus its high-water mark.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalystSyncOutcome {
    pub events: Vec<CatalystEvent>,
    pub last_fetched_date: Option<CalendarDate>,
}

/// Incremental filing-catalyst synchronizer.
pub struct CatalystSynchronizer {
    filings: FilingsClient,
    store: Arc<dyn CacheStore>,
    engine: PatternExtractionEngine,
    lookback_days: u32,
}

impl CatalystSynchronizer {
    pub fn new(filings: FilingsClient, store: Arc<dyn CacheStore>) -> Self {
        Self {
            filings,
            store,
            engine: PatternExtractionEngine::new(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }

    pub fn with_lookback_days(mut self, lookback_days: u32) -> Self {
        self.lookback_days = lookback_days;
        self
    }

    /// Best-effort sync; on any upstream failure the previously cached
    /// state is returned unchanged.
    pub async fn get_catalyst_events(
        &self,
        symbol: &Symbol,
        industry: Option<&str>,
    ) -> CatalystSyncOutcome {
        let key = catalysts_key(symbol);
        let prior: CatalystCacheRecord = cache::get_json(self.store.as_ref(), &key)
            .await
            .unwrap_or_else(|| CatalystCacheRecord::empty(symbol.clone()));

        match self.sync_filings(symbol, industry, &prior).await {
            Ok(updated) => {
                if let Err(error) =
                    cache::set_json(self.store.as_ref(), &key, &updated, TTL_FOREVER).await
                {
                    warn!(symbol = %symbol, %error, "failed to persist catalyst state");
                }
                CatalystSyncOutcome {
                    events: updated.events_for(EventSource::Filings),
                    last_fetched_date: updated.filings_last_fetched,
                }
            }
            Err(error) => {
                warn!(symbol = %symbol, %error, "catalyst sync failed, serving cached state");
                CatalystSyncOutcome {
                    events: prior.events_for(EventSource::Filings),
                    last_fetched_date: prior.filings_last_fetched,
                }
            }
        }
    }

    async fn sync_filings(
        &self,
        symbol: &Symbol,
        industry: Option<&str>,
        prior: &CatalystCacheRecord,
    ) -> Result<CatalystCacheRecord, UpstreamError> {
        let today = CalendarDate::today_utc();
        let lookback_floor = today.days_before(self.lookback_days);
        let last_fetched = prior.filings_last_fetched;

        let mut events = prior.events_for(EventSource::Filings);
        let mut seen: HashSet<String> = events.iter().map(|event| event.id.clone()).collect();
        let mut candidate = last_fetched;

        let Some(registry_id) = self.filings.registry_id(symbol).await? else {
            debug!(symbol = %symbol, "symbol not present in filings registry");
            return Ok(prior.clone());
        };

        let filings = self.filings.submissions(&registry_id).await?;
        let mine_documents = is_life_science(industry);

        for filing in &filings {
            if let Some(mark) = last_fetched {
                if filing.filing_date <= mark {
                    continue;
                }
            }
            if filing.filing_date < lookback_floor {
                continue;
            }
            candidate = Some(candidate.map_or(filing.filing_date, |c| c.max(filing.filing_date)));

            if is_current_report(&filing.form) {
                self.collect_item_code_events(symbol, filing, &mut seen, &mut events);

                if mine_documents && item_codes::has_regulatory_code(&filing.item_codes) {
                    self.mine_document(symbol, &registry_id, filing, &mut seen, &mut events)
                        .await?;
                }
            } else if is_shelf_registration(&filing.form) {
                let id = CatalystEvent::id_for(
                    EventSource::Filings,
                    CatalystEventType::AtmOffering,
                    symbol,
                    filing.filing_date,
                    None,
                );
                if seen.insert(id.clone()) {
                    events.push(CatalystEvent {
                        id,
                        symbol: symbol.clone(),
                        event_type: CatalystEventType::AtmOffering,
                        date: filing.filing_date,
                        is_estimate: false,
                        title: "At-the-market offering program".to_owned(),
                        description: format!("Shelf registration ({})", filing.form),
                        source: EventSource::Filings,
                        source_url: None,
                    });
                }
            }
        }

        let mut merged = prior.events_excluding(EventSource::Filings);
        merged.extend(events);

        Ok(CatalystCacheRecord {
            symbol: symbol.clone(),
            filings_last_fetched: match (last_fetched, candidate) {
                (Some(previous), Some(new)) => Some(previous.max(new)),
                (previous, new) => new.or(previous),
            },
            trials_last_fetched: prior.trials_last_fetched,
            events: merged,
        })
    }

    fn collect_item_code_events(
        &self,
        symbol: &Symbol,
        filing: &Filing,
        seen: &mut HashSet<String>,
        events: &mut Vec<CatalystEvent>,
    ) {
        for code in &filing.item_codes {
            let Some(entry) = item_codes::lookup(code) else {
                continue;
            };
            let id = CatalystEvent::id_for(
                EventSource::Filings,
                entry.event_type,
                symbol,
                filing.filing_date,
                Some(code.trim()),
            );
            if !seen.insert(id.clone()) {
                continue;
            }
            events.push(CatalystEvent {
                id,
                symbol: symbol.clone(),
                event_type: entry.event_type,
                date: filing.filing_date,
                is_estimate: false,
                title: entry.title.to_owned(),
                description: format!("Form {} item {}", filing.form, code.trim()),
                source: EventSource::Filings,
                source_url: None,
            });
        }
    }

    async fn mine_document(
        &self,
        symbol: &Symbol,
        registry_id: &str,
        filing: &Filing,
        seen: &mut HashSet<String>,
        events: &mut Vec<CatalystEvent>,
    ) -> Result<(), UpstreamError> {
        let (Some(accession), Some(document)) =
            (&filing.accession_number, &filing.primary_document)
        else {
            return Ok(());
        };

        let url = self.filings.document_url(registry_id, accession, document);
        let text = self.filings.document_text(&url).await?;

        for extracted in self.engine.extract(&text, filing.filing_date) {
            let date = extracted.date.unwrap_or(filing.filing_date);
            let id = CatalystEvent::id_for(
                EventSource::Filings,
                extracted.event_type,
                symbol,
                date,
                None,
            );
            if !seen.insert(id.clone()) {
                continue;
            }
            events.push(CatalystEvent {
                id,
                symbol: symbol.clone(),
                event_type: extracted.event_type,
                date,
                is_estimate: extracted.is_estimate,
                title: extracted.title,
                description: extracted.description,
                source: EventSource::Filings,
                source_url: Some(url.clone()),
            });
        }
        Ok(())
    }
}

fn is_current_report(form: &str) -> bool {
    matches!(form, "8-K" | "8-K/A")
}

fn is_shelf_registration(form: &str) -> bool {
    form == "S-3" || form.starts_with("S-3/")
}

fn is_life_science(industry: Option<&str>) -> bool {
    let Some(industry) = industry else {
        return false;
    };
    let lower = industry.to_ascii_lowercase();
    LIFE_SCIENCE_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

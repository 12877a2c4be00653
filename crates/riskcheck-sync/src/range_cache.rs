//! Per-symbol historical-bar store with range-gap fetching.
//!
//! A request for `lookback_days` of history is reconciled against the
//! cached coverage window: at most two sub-ranges (before and after the
//! covered span) are fetched, merged date-by-date with newest-wins
//! semantics, and persisted with an unbounded TTL. Coverage only ever
//! expands, so a window of weekends fetched once is never fetched again.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use riskcheck_core::{
    cache, CacheStore, CachedRangeRecord, CalendarDate, HistoricalBar, Symbol, TTL_FOREVER,
};

use crate::quotes::QuotesClient;

pub fn historical_key(symbol: &Symbol) -> String {
    format!("historical:{symbol}")
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DateRange {
    start: CalendarDate,
    end: CalendarDate,
}

/// The sub-ranges missing from a cached record relative to one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GapPlan {
    before: Option<DateRange>,
    after: Option<DateRange>,
}

impl GapPlan {
    const fn is_cache_hit(&self) -> bool {
        self.before.is_none() && self.after.is_none()
    }
}

fn plan_gaps(
    record: Option<&CachedRangeRecord>,
    requested_start: CalendarDate,
    window_end: CalendarDate,
) -> GapPlan {
    if requested_start > window_end {
        return GapPlan {
            before: None,
            after: None,
        };
    }

    match record {
        None => GapPlan {
            before: Some(DateRange {
                start: requested_start,
                end: window_end,
            }),
            after: None,
        },
        Some(record) => GapPlan {
            before: (requested_start < record.fetched_from_date).then_some(DateRange {
                start: requested_start,
                end: record.fetched_from_date,
            }),
            after: (record.latest_date < window_end).then_some(DateRange {
                start: record.latest_date,
                end: window_end,
            }),
        },
    }
}

/// Merge cached and freshly fetched bars: one bar per date, newest wins,
/// ascending order, prices rounded to persisted precision.
fn merge_bars(existing: &[HistoricalBar], incoming: Vec<HistoricalBar>) -> Vec<HistoricalBar> {
    let mut by_date: BTreeMap<CalendarDate, HistoricalBar> = existing
        .iter()
        .map(|bar| (bar.date, bar.clone()))
        .collect();
    for bar in incoming {
        by_date.insert(bar.date, bar);
    }
    by_date.into_values().map(|bar| bar.rounded()).collect()
}

/// Incremental historical-bar cache over the quotes upstream.
pub struct RangeCache {
    quotes: QuotesClient,
    store: Arc<dyn CacheStore>,
}

impl RangeCache {
    pub fn new(quotes: QuotesClient, store: Arc<dyn CacheStore>) -> Self {
        Self { quotes, store }
    }

    /// Bars for the trailing `lookback_days` window ending yesterday.
    ///
    /// Best-effort: a failed gap fetch degrades to whatever merged, down to
    /// an empty list. Today's still-forming bar is never included.
    pub async fn get_historical_data(
        &self,
        symbol: &Symbol,
        lookback_days: u32,
    ) -> Vec<HistoricalBar> {
        let today = CalendarDate::today_utc();
        let requested_start = today.days_before(lookback_days);
        let window_end = today.pred();

        self.sync_window(symbol, requested_start, window_end).await
    }

    async fn sync_window(
        &self,
        symbol: &Symbol,
        requested_start: CalendarDate,
        window_end: CalendarDate,
    ) -> Vec<HistoricalBar> {
        let key = historical_key(symbol);
        let record: Option<CachedRangeRecord> =
            cache::get_json(self.store.as_ref(), &key).await;

        let plan = plan_gaps(record.as_ref(), requested_start, window_end);
        if plan.is_cache_hit() {
            debug!(symbol = %symbol, "historical window served from cache");
            return clip_window(record.map(|r| r.bars).unwrap_or_default(), requested_start);
        }

        let mut fetched: Vec<HistoricalBar> = Vec::new();
        let mut before_ok = false;
        let mut after_ok = false;

        if let Some(gap) = plan.before {
            if let Some(bars) = self.fetch_gap(symbol, gap, window_end).await {
                fetched.extend(bars);
                before_ok = true;
            }
        }
        if let Some(gap) = plan.after {
            if let Some(bars) = self.fetch_gap(symbol, gap, window_end).await {
                fetched.extend(bars);
                after_ok = true;
            }
        }

        let existing = record.as_ref().map(|r| r.bars.as_slice()).unwrap_or(&[]);
        let merged = merge_bars(existing, fetched);

        if before_ok || after_ok {
            let fetched_from = match (&record, before_ok) {
                (Some(record), true) => record.fetched_from_date.min(requested_start),
                (Some(record), false) => record.fetched_from_date,
                (None, _) => requested_start,
            };
            let latest = match &record {
                // The "before" gap on a fresh record spans the whole window.
                None => window_end,
                Some(record) if after_ok => record.latest_date.max(window_end),
                Some(record) => record.latest_date,
            };

            let updated = CachedRangeRecord::from_bars(
                symbol.clone(),
                merged.clone(),
                fetched_from,
                latest,
            );
            if let Err(error) =
                cache::set_json(self.store.as_ref(), &key, &updated, TTL_FOREVER).await
            {
                warn!(symbol = %symbol, %error, "failed to persist historical record");
            }
        }

        clip_window(merged, requested_start)
    }

    /// Fetch one gap; failures are logged and collapsed into `None` so the
    /// caller can merge whatever else succeeded.
    async fn fetch_gap(
        &self,
        symbol: &Symbol,
        gap: DateRange,
        window_end: CalendarDate,
    ) -> Option<Vec<HistoricalBar>> {
        match self.quotes.fetch_daily_bars(symbol, gap.start, gap.end).await {
            Ok(bars) => Some(
                bars.into_iter()
                    .filter(|bar| bar.date <= window_end)
                    .collect(),
            ),
            Err(error) => {
                warn!(
                    symbol = %symbol,
                    from = %gap.start,
                    to = %gap.end,
                    %error,
                    "gap fetch failed, continuing with cached coverage"
                );
                None
            }
        }
    }
}

fn clip_window(bars: Vec<HistoricalBar>, requested_start: CalendarDate) -> Vec<HistoricalBar> {
    bars.into_iter()
        .filter(|bar| bar.date >= requested_start)
        .collect()
}

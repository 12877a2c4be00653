//! Behavior-driven tests for the historical range cache.
//!
//! These tests verify HOW the cache reconciles requested windows against
//! cached coverage: gap-only fetching, idempotence, holiday stability, and
//! graceful partial failure.

use std::sync::Arc;
use std::time::Duration;

use riskcheck_core::{
    cache, BackoffPolicy, CacheStore, CachedRangeRecord, CalendarDate, HistoricalBar,
    MemoryStore, ProviderId, RateLimitedClient, Symbol, TTL_FOREVER,
};
use riskcheck_sync::{historical_key, QuotesClient, RangeCache};
use riskcheck_tests::{
    chart_body_for_url, empty_chart_body, query_param_i64, weekdays_between, MockHttpClient,
};

const CHART_PATH: &str = "/v8/finance/chart/";

fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        multiplier: 2.0,
        max_retries: 1,
        jitter: false,
    }
}

fn range_cache(http: Arc<MockHttpClient>, store: Arc<MemoryStore>) -> RangeCache {
    let client = RateLimitedClient::new(
        ProviderId::QuoteFeed,
        Duration::ZERO,
        http,
        fast_backoff(),
    );
    RangeCache::new(QuotesClient::new(client), store as Arc<dyn CacheStore>)
}

fn symbol() -> Symbol {
    Symbol::parse("XYZ").expect("valid symbol")
}

fn weekday_bars(from: CalendarDate, to: CalendarDate) -> Vec<HistoricalBar> {
    weekdays_between(from, to)
        .into_iter()
        .map(|date| {
            HistoricalBar::new(date, 20.0, 21.0, 19.0, 20.5, Some(5_000)).expect("valid bar")
        })
        .collect()
}

// =============================================================================
// Range Cache: Idempotence
// =============================================================================

#[tokio::test]
async fn when_window_is_requested_twice_second_call_is_a_pure_cache_hit() {
    // Given: a cold cache and a healthy upstream
    let http = Arc::new(
        MockHttpClient::new().route_with(CHART_PATH, |request| {
            Ok(riskcheck_core::HttpResponse::ok_json(chart_body_for_url(
                &request.url,
                25.0,
            )))
        }),
    );
    let store = Arc::new(MemoryStore::new());
    let cache = range_cache(http.clone(), store);

    // When: the same window is requested twice
    let first = cache.get_historical_data(&symbol(), 30).await;
    let second = cache.get_historical_data(&symbol(), 30).await;

    // Then: results match and the second call issued no network fetch
    assert!(!first.is_empty(), "a 30-day window should hold trading days");
    assert_eq!(first, second);
    assert_eq!(http.calls_matching(CHART_PATH), 1);
}

#[tokio::test]
async fn when_a_narrower_window_follows_a_wide_one_it_is_served_from_cache() {
    // Given: 90 days already synced
    let http = Arc::new(
        MockHttpClient::new().route_with(CHART_PATH, |request| {
            Ok(riskcheck_core::HttpResponse::ok_json(chart_body_for_url(
                &request.url,
                25.0,
            )))
        }),
    );
    let store = Arc::new(MemoryStore::new());
    let cache = range_cache(http.clone(), store);

    let wide = cache.get_historical_data(&symbol(), 90).await;

    // When: the last 30 days are requested
    let narrow = cache.get_historical_data(&symbol(), 30).await;

    // Then: the narrow window is the tail of the wide one, with no new fetch
    let start = CalendarDate::today_utc().days_before(30);
    let expected_tail: Vec<_> = wide
        .iter()
        .filter(|bar| bar.date >= start)
        .cloned()
        .collect();
    assert_eq!(narrow, expected_tail);
    assert_eq!(http.calls_matching(CHART_PATH), 1);
}

// =============================================================================
// Range Cache: Gap correctness
// =============================================================================

#[tokio::test]
async fn when_an_earlier_window_is_requested_only_the_before_gap_is_fetched() {
    // Given: cached coverage for the trailing 10 days
    let http = Arc::new(
        MockHttpClient::new().route_with(CHART_PATH, |request| {
            Ok(riskcheck_core::HttpResponse::ok_json(chart_body_for_url(
                &request.url,
                25.0,
            )))
        }),
    );
    let store = Arc::new(MemoryStore::new());

    let today = CalendarDate::today_utc();
    let yesterday = today.pred();
    let covered_from = today.days_before(10);
    let record = CachedRangeRecord::from_bars(
        symbol(),
        weekday_bars(covered_from, yesterday),
        covered_from,
        yesterday,
    );
    cache::set_json(
        store.as_ref(),
        &historical_key(&symbol()),
        &record,
        TTL_FOREVER,
    )
    .await
    .expect("record encodes");

    let cache = range_cache(http.clone(), store);

    // When: a wider 20-day window is requested
    let bars = cache.get_historical_data(&symbol(), 20).await;

    // Then: exactly one fetch, covering only [start, fetched_from_date]
    assert_eq!(http.calls_matching(CHART_PATH), 1);
    let request = &http.requests()[0];
    assert_eq!(
        query_param_i64(&request.url, "period1"),
        Some(today.days_before(20).unix_midnight()),
    );
    assert_eq!(
        query_param_i64(&request.url, "period2"),
        Some(covered_from.succ().unix_midnight()),
        "the before-gap fetch must stop at the covered boundary"
    );
    assert!(bars.iter().any(|bar| bar.date < covered_from));
}

// =============================================================================
// Range Cache: Holiday stability
// =============================================================================

#[tokio::test]
async fn when_a_window_has_no_trading_days_coverage_still_advances() {
    // Given: an upstream with no bars for any requested window
    let http = Arc::new(MockHttpClient::new().route_json(CHART_PATH, empty_chart_body()));
    let store = Arc::new(MemoryStore::new());
    let cache = range_cache(http.clone(), store);

    // When: the same empty window is requested twice
    let first = cache.get_historical_data(&symbol(), 5).await;
    let second = cache.get_historical_data(&symbol(), 5).await;

    // Then: both calls are empty and the second triggered no new fetch
    assert!(first.is_empty());
    assert!(second.is_empty());
    assert_eq!(http.calls_matching(CHART_PATH), 1);
}

// =============================================================================
// Range Cache: Partial failure
// =============================================================================

#[tokio::test]
async fn when_one_gap_fetch_fails_the_other_still_merges_and_persists() {
    // Given: cached coverage for a middle window, an upstream that serves
    // the before-gap but errors on the after-gap
    let today = CalendarDate::today_utc();
    let covered_from = today.days_before(10);
    let covered_to = today.days_before(5);
    let before_start = today.days_before(20);

    let before_period1 = before_start.unix_midnight();
    let http = Arc::new(MockHttpClient::new().route_with(CHART_PATH, move |request| {
        if query_param_i64(&request.url, "period1") == Some(before_period1) {
            Ok(riskcheck_core::HttpResponse::ok_json(chart_body_for_url(
                &request.url,
                25.0,
            )))
        } else {
            Ok(riskcheck_core::HttpResponse::with_status(500, "flaky"))
        }
    }));
    let store = Arc::new(MemoryStore::new());

    let record = CachedRangeRecord::from_bars(
        symbol(),
        weekday_bars(covered_from, covered_to),
        covered_from,
        covered_to,
    );
    cache::set_json(
        store.as_ref(),
        &historical_key(&symbol()),
        &record,
        TTL_FOREVER,
    )
    .await
    .expect("record encodes");

    let cache = range_cache(http.clone(), store.clone());

    // When: a window needing both gaps is requested
    let bars = cache.get_historical_data(&symbol(), 20).await;

    // Then: the before-gap data arrived, the after-gap did not, and the
    // call degraded instead of failing
    assert!(bars.iter().any(|bar| bar.date < covered_from));
    assert!(bars.iter().all(|bar| bar.date <= covered_to));

    // And: the persisted record now covers the earlier start, so a later
    // retry fetches only the still-missing after-gap
    let retry_http = Arc::new(
        MockHttpClient::new().route_with(CHART_PATH, |request| {
            Ok(riskcheck_core::HttpResponse::ok_json(chart_body_for_url(
                &request.url,
                25.0,
            )))
        }),
    );
    let cache = range_cache(retry_http.clone(), store);
    cache.get_historical_data(&symbol(), 20).await;

    assert_eq!(retry_http.calls_matching(CHART_PATH), 1);
    let request = &retry_http.requests()[0];
    assert_eq!(
        query_param_i64(&request.url, "period1"),
        Some(covered_to.unix_midnight()),
        "only the after-gap remains to fetch"
    );
}

// =============================================================================
// Range Cache: Total failure
// =============================================================================

#[tokio::test]
async fn when_the_upstream_is_down_cached_bars_are_still_served() {
    // Given: a populated cache and a hard-down upstream
    let http = Arc::new(MockHttpClient::new().route_status(CHART_PATH, 503, "down"));
    let store = Arc::new(MemoryStore::new());

    let today = CalendarDate::today_utc();
    let covered_from = today.days_before(10);
    let covered_to = today.days_before(5);
    let seeded = weekday_bars(covered_from, covered_to);
    let record =
        CachedRangeRecord::from_bars(symbol(), seeded.clone(), covered_from, covered_to);
    cache::set_json(
        store.as_ref(),
        &historical_key(&symbol()),
        &record,
        TTL_FOREVER,
    )
    .await
    .expect("record encodes");

    let cache = range_cache(http, store);

    // When: a wider window is requested and every fetch fails
    let bars = cache.get_historical_data(&symbol(), 20).await;

    // Then: the cached bars come back instead of an error
    assert_eq!(bars, seeded);
}

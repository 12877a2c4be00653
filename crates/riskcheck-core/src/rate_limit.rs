//! Per-upstream request pacing and classified retry.
//!
//! One `RateLimitedClient` exists per upstream. The pacing state is a single
//! limiter per upstream, not per symbol: concurrent syncs against the same
//! registry queue behind one counter, which is what the upstream's published
//! limits are counted against.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use tracing::warn;

use crate::backoff::BackoffPolicy;
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};
use crate::upstream::{check_response, check_status, ProviderId, UpstreamError, UpstreamErrorKind};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Minimum spacing between requests, per upstream.
const FILINGS_MIN_INTERVAL: Duration = Duration::from_millis(150);
const QUOTE_MIN_INTERVAL: Duration = Duration::from_millis(500);
const TRIALS_MIN_INTERVAL: Duration = Duration::from_millis(300);

/// Throttled, retrying HTTP client for one upstream.
#[derive(Clone)]
pub struct RateLimitedClient {
    provider: ProviderId,
    limiter: Arc<DirectRateLimiter>,
    http: Arc<dyn HttpClient>,
    backoff: BackoffPolicy,
}

impl RateLimitedClient {
    pub fn new(
        provider: ProviderId,
        min_interval: Duration,
        http: Arc<dyn HttpClient>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            provider,
            limiter: Arc::new(RateLimiter::direct(quota_from_interval(min_interval))),
            http,
            backoff,
        }
    }

    pub fn quote_feed(http: Arc<dyn HttpClient>) -> Self {
        Self::new(
            ProviderId::QuoteFeed,
            QUOTE_MIN_INTERVAL,
            http,
            BackoffPolicy::upstream_default(),
        )
    }

    pub fn filings_registry(http: Arc<dyn HttpClient>) -> Self {
        Self::new(
            ProviderId::FilingsRegistry,
            FILINGS_MIN_INTERVAL,
            http,
            BackoffPolicy::upstream_default(),
        )
    }

    pub fn trials_registry(http: Arc<dyn HttpClient>) -> Self {
        Self::new(
            ProviderId::TrialsRegistry,
            TRIALS_MIN_INTERVAL,
            http,
            BackoffPolicy::upstream_default(),
        )
    }

    pub const fn provider(&self) -> ProviderId {
        self.provider
    }

    /// One paced transport call, no status classification.
    pub async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, UpstreamError> {
        self.limiter.until_ready().await;
        self.http
            .execute(request)
            .await
            .map_err(|error| UpstreamError::from_transport(self.provider, error))
    }

    /// One paced call, returning only classified-successful responses.
    pub async fn fetch_checked(
        &self,
        request: HttpRequest,
    ) -> Result<HttpResponse, UpstreamError> {
        let response = self.fetch(request).await?;
        check_response(self.provider, &response)?;
        Ok(response)
    }

    /// Like [`fetch_checked`](Self::fetch_checked) but without the
    /// HTML-body sniff, for endpoints that legitimately serve HTML.
    pub async fn fetch_document(
        &self,
        request: HttpRequest,
    ) -> Result<HttpResponse, UpstreamError> {
        let response = self.fetch(request).await?;
        check_status(self.provider, &response)?;
        Ok(response)
    }

    /// Paced call with the full retry schedule.
    ///
    /// Rate-limit and server-error failures retry with exponentially
    /// doubling delay; anything else propagates immediately. Exhausting the
    /// schedule on a rate limit yields the distinguished signal carrying the
    /// provider and a suggested delay; otherwise the last error is re-raised.
    pub async fn fetch_with_retry(
        &self,
        request: HttpRequest,
    ) -> Result<HttpResponse, UpstreamError> {
        self.retry_loop(request, false).await
    }

    /// Retrying document fetch; status classification only.
    pub async fn fetch_document_with_retry(
        &self,
        request: HttpRequest,
    ) -> Result<HttpResponse, UpstreamError> {
        self.retry_loop(request, true).await
    }

    async fn retry_loop(
        &self,
        request: HttpRequest,
        document: bool,
    ) -> Result<HttpResponse, UpstreamError> {
        let mut attempt: u32 = 0;
        loop {
            let outcome = if document {
                self.fetch_document(request.clone()).await
            } else {
                self.fetch_checked(request.clone()).await
            };
            match outcome {
                Ok(response) => return Ok(response),
                Err(error) => {
                    if !error.retryable() {
                        return Err(error);
                    }
                    if attempt >= self.backoff.max_retries {
                        if error.kind() == UpstreamErrorKind::RateLimited {
                            return Err(UpstreamError::rate_limit_exhausted(
                                self.provider,
                                self.backoff.suggested_delay(),
                            ));
                        }
                        return Err(error);
                    }

                    let delay = self.backoff.delay_for_attempt(attempt);
                    warn!(
                        provider = %self.provider,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "upstream call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn quota_from_interval(min_interval: Duration) -> Quota {
    let period = if min_interval.is_zero() {
        Duration::from_millis(1)
    } else {
        min_interval
    };

    Quota::with_period(period)
        .expect("period is always greater than zero")
        .allow_burst(NonZeroU32::new(1).expect("burst of one is non-zero"))
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    use super::*;
    use crate::http_client::HttpError;

    /// Serves a scripted sequence of responses and counts calls.
    struct ScriptedHttpClient {
        responses: Mutex<Vec<Result<HttpResponse, HttpError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedHttpClient {
        fn new(mut responses: Vec<Result<HttpResponse, HttpError>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl HttpClient for ScriptedHttpClient {
        fn execute<'a>(
            &'a self,
            _request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .responses
                .lock()
                .expect("script lock is not poisoned")
                .pop()
                .unwrap_or_else(|| Ok(HttpResponse::ok_json("{}")));
            Box::pin(async move { next })
        }
    }

    fn fast_backoff() -> BackoffPolicy {
        BackoffPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            multiplier: 2.0,
            max_retries: 2,
            jitter: false,
        }
    }

    fn client_with(
        script: Vec<Result<HttpResponse, HttpError>>,
        min_interval: Duration,
    ) -> (RateLimitedClient, Arc<ScriptedHttpClient>) {
        let http = Arc::new(ScriptedHttpClient::new(script));
        let client = RateLimitedClient::new(
            ProviderId::QuoteFeed,
            min_interval,
            http.clone(),
            fast_backoff(),
        );
        (client, http)
    }

    #[tokio::test]
    async fn consecutive_fetches_respect_min_interval() {
        let (client, _http) = client_with(
            vec![Ok(HttpResponse::ok_json("{}")), Ok(HttpResponse::ok_json("{}"))],
            Duration::from_millis(50),
        );

        let started = Instant::now();
        client
            .fetch(HttpRequest::get("https://example.test/a"))
            .await
            .expect("first call succeeds");
        client
            .fetch(HttpRequest::get("https://example.test/b"))
            .await
            .expect("second call succeeds");

        assert!(
            started.elapsed() >= Duration::from_millis(45),
            "second call must wait out the interval, took {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn server_errors_retry_until_success() {
        let (client, http) = client_with(
            vec![
                Ok(HttpResponse::with_status(503, "unavailable")),
                Ok(HttpResponse::with_status(502, "bad gateway")),
                Ok(HttpResponse::ok_json("{\"ok\":true}")),
            ],
            Duration::ZERO,
        );

        let response = client
            .fetch_with_retry(HttpRequest::get("https://example.test/bars"))
            .await
            .expect("third attempt succeeds");

        assert!(response.body.contains("ok"));
        assert_eq!(http.calls(), 3);
    }

    #[tokio::test]
    async fn fatal_errors_do_not_retry() {
        let (client, http) = client_with(
            vec![Ok(HttpResponse::with_status(404, "no such symbol"))],
            Duration::ZERO,
        );

        let err = client
            .fetch_with_retry(HttpRequest::get("https://example.test/bars"))
            .await
            .expect_err("must fail");

        assert_eq!(err.kind(), UpstreamErrorKind::Fatal);
        assert_eq!(http.calls(), 1);
    }

    #[tokio::test]
    async fn exhausted_rate_limit_raises_distinguished_signal() {
        let (client, http) = client_with(
            vec![
                Ok(HttpResponse::with_status(429, "too many requests")),
                Ok(HttpResponse::with_status(429, "too many requests")),
                Ok(HttpResponse::with_status(429, "too many requests")),
            ],
            Duration::ZERO,
        );

        let err = client
            .fetch_with_retry(HttpRequest::get("https://example.test/bars"))
            .await
            .expect_err("must exhaust");

        assert_eq!(err.kind(), UpstreamErrorKind::RateLimited);
        assert_eq!(err.provider(), ProviderId::QuoteFeed);
        assert!(err.suggested_delay().is_some());
        assert_eq!(http.calls(), 3, "initial attempt plus two retries");
    }
}

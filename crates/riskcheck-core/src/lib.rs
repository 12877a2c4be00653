//! Core contracts for riskcheck.
//!
//! This crate contains:
//! - Canonical domain models and validation (bars, catalyst events, cached
//!   range/catalyst records)
//! - Upstream identifiers and the shared error taxonomy
//! - The HTTP transport abstraction and the per-upstream rate-limited,
//!   retrying client
//! - The generic key/value cache contract with an in-memory implementation

pub mod backoff;
pub mod cache;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod rate_limit;
pub mod upstream;

pub use backoff::BackoffPolicy;
pub use cache::{get_json, set_json, CacheStore, MemoryStore, TTL_FOREVER};
pub use domain::{
    CachedRangeRecord, CalendarDate, CatalystCacheRecord, CatalystEvent, CatalystEventType,
    EventSource, ExtractedCatalyst, HistoricalBar, Symbol,
};
pub use error::{CoreError, ValidationError};
pub use http_client::{
    HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, NoopHttpClient,
    ReqwestHttpClient,
};
pub use rate_limit::RateLimitedClient;
pub use upstream::{
    body_excerpt, check_response, check_status, ProviderId, UpstreamError, UpstreamErrorKind,
};

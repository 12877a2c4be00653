//! Upstream identifiers and the error taxonomy shared by every adapter.
//!
//! Failures fall into four kinds:
//!
//! | Kind | Trigger | Retried |
//! |------|---------|---------|
//! | `RateLimited` | 429, "too many requests", "blocked" bodies | yes |
//! | `ServerError` | 5xx, HTML error page on a JSON endpoint | yes |
//! | `InvalidPayload` | malformed or unparseable response body | no |
//! | `Fatal` | other 4xx, transport errors marked non-retryable | no |

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::http_client::{HttpError, HttpResponse};
use crate::ValidationError;

/// Canonical upstream identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    QuoteFeed,
    FilingsRegistry,
    TrialsRegistry,
}

impl ProviderId {
    pub const ALL: [Self; 3] = [Self::QuoteFeed, Self::FilingsRegistry, Self::TrialsRegistry];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QuoteFeed => "quote_feed",
            Self::FilingsRegistry => "filings_registry",
            Self::TrialsRegistry => "trials_registry",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "quote_feed" => Ok(Self::QuoteFeed),
            "filings_registry" => Ok(Self::FilingsRegistry),
            "trials_registry" => Ok(Self::TrialsRegistry),
            other => Err(ValidationError::InvalidProvider {
                value: other.to_owned(),
            }),
        }
    }
}

/// Upstream error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    RateLimited,
    ServerError,
    InvalidPayload,
    Fatal,
}

/// Structured upstream error used by the retry loop and sync boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamError {
    kind: UpstreamErrorKind,
    provider: ProviderId,
    message: String,
    suggested_delay: Option<Duration>,
}

impl UpstreamError {
    pub fn rate_limited(provider: ProviderId, message: impl Into<String>) -> Self {
        Self {
            kind: UpstreamErrorKind::RateLimited,
            provider,
            message: message.into(),
            suggested_delay: None,
        }
    }

    pub fn server_error(provider: ProviderId, message: impl Into<String>) -> Self {
        Self {
            kind: UpstreamErrorKind::ServerError,
            provider,
            message: message.into(),
            suggested_delay: None,
        }
    }

    pub fn invalid_payload(provider: ProviderId, message: impl Into<String>) -> Self {
        Self {
            kind: UpstreamErrorKind::InvalidPayload,
            provider,
            message: message.into(),
            suggested_delay: None,
        }
    }

    pub fn fatal(provider: ProviderId, message: impl Into<String>) -> Self {
        Self {
            kind: UpstreamErrorKind::Fatal,
            provider,
            message: message.into(),
            suggested_delay: None,
        }
    }

    /// Distinguished signal raised when rate-limit retries are exhausted.
    pub fn rate_limit_exhausted(provider: ProviderId, suggested_delay: Duration) -> Self {
        Self {
            kind: UpstreamErrorKind::RateLimited,
            provider,
            message: format!(
                "{provider} rate limit persisted after retries; retry after {}s",
                suggested_delay.as_secs()
            ),
            suggested_delay: Some(suggested_delay),
        }
    }

    pub fn from_transport(provider: ProviderId, error: HttpError) -> Self {
        if error.retryable() {
            Self::server_error(provider, format!("transport error: {}", error.message()))
        } else {
            Self::fatal(provider, format!("transport error: {}", error.message()))
        }
    }

    pub const fn kind(&self) -> UpstreamErrorKind {
        self.kind
    }

    pub const fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn suggested_delay(&self) -> Option<Duration> {
        self.suggested_delay
    }

    pub const fn retryable(&self) -> bool {
        matches!(
            self.kind,
            UpstreamErrorKind::RateLimited | UpstreamErrorKind::ServerError
        )
    }
}

impl Display for UpstreamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.provider, self.message)
    }
}

impl std::error::Error for UpstreamError {}

const EXCERPT_LEN: usize = 200;

/// Truncate a response body for inclusion in error messages and logs.
/// Upstreams answer some errors with whole HTML pages.
pub fn body_excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(EXCERPT_LEN) {
        Some((index, _)) => format!("{}…", &trimmed[..index]),
        None => trimmed.to_owned(),
    }
}

fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start();
    head.starts_with("<!DOCTYPE") || head.starts_with("<html") || head.starts_with("<HTML")
}

fn looks_rate_limited(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("too many requests") || lower.contains("blocked")
}

/// Classify a completed HTTP exchange against a JSON endpoint.
///
/// On top of [`check_status`], a 2xx response whose body is an HTML page is
/// treated as a server error: some upstreams answer overload with a styled
/// error page and a 200.
pub fn check_response(
    provider: ProviderId,
    response: &HttpResponse,
) -> Result<(), UpstreamError> {
    if response.is_success() && looks_like_html(&response.body) {
        return Err(UpstreamError::server_error(
            provider,
            format!(
                "expected JSON, got HTML error page: {}",
                body_excerpt(&response.body)
            ),
        ));
    }
    check_status(provider, response)
}

/// Classify a completed HTTP exchange by status alone. Used for endpoints
/// that legitimately serve HTML (filing documents).
pub fn check_status(provider: ProviderId, response: &HttpResponse) -> Result<(), UpstreamError> {
    if response.is_success() {
        return Ok(());
    }

    if response.status == 429 || looks_rate_limited(&response.body) {
        return Err(UpstreamError::rate_limited(
            provider,
            format!("status {}: {}", response.status, body_excerpt(&response.body)),
        ));
    }

    if response.status >= 500 {
        return Err(UpstreamError::server_error(
            provider,
            format!("status {}: {}", response.status, body_excerpt(&response.body)),
        ));
    }

    Err(UpstreamError::fatal(
        provider,
        format!("status {}: {}", response.status, body_excerpt(&response.body)),
    ))
}

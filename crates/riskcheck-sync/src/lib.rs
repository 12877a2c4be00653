//! Incremental upstream synchronization and cache reconciliation.
//!
//! This crate holds the engine proper:
//! - [`range_cache`] — per-symbol historical-bar store with range-gap
//!   fetching and newest-wins merge
//! - [`catalyst`] — high-water-mark filing scanner producing deduplicated
//!   catalyst events
//! - [`extract`] — stateless pattern mining over filing text
//! - [`quotes`], [`filings`], [`trials`] — the three upstream adapters
//!
//! Calling services construct the synchronizers with a shared
//! [`riskcheck_core::CacheStore`] and per-upstream rate-limited clients and
//! invoke them per symbol; both sync entry points are best-effort and
//! degrade to cached state instead of failing.

pub mod catalyst;
pub mod dates;
pub mod extract;
pub mod filings;
pub mod html;
pub mod item_codes;
pub mod quotes;
pub mod range_cache;
pub mod trials;

pub use catalyst::{catalysts_key, CatalystSyncOutcome, CatalystSynchronizer};
pub use extract::PatternExtractionEngine;
pub use filings::{Filing, FilingsClient};
pub use html::strip_html;
pub use quotes::{CompanyProfile, QuotesClient};
pub use range_cache::{historical_key, RangeCache};
pub use trials::{Study, TrialsClient, TrialsSynchronizer};

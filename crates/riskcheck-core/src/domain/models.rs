use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{CalendarDate, Symbol, ValidationError};

/// Daily OHLCV bar for one symbol.
///
/// One bar per calendar date; series are kept sorted ascending by date and
/// today's (still forming) bar is never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalBar {
    pub date: CalendarDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<u64>,
}

impl HistoricalBar {
    pub fn new(
        date: CalendarDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: Option<u64>,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;

        if high < low {
            return Err(ValidationError::InvalidBarRange);
        }

        if open < low || open > high || close < low || close > high {
            return Err(ValidationError::InvalidBarBounds);
        }

        Ok(Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// Copy with each price rounded to 3 decimal places, the precision
    /// persisted to the cache.
    pub fn rounded(&self) -> Self {
        Self {
            date: self.date,
            open: round3(self.open),
            high: round3(self.high),
            low: round3(self.low),
            close: round3(self.close),
            volume: self.volume,
        }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Durable per-symbol bar cache entry.
///
/// `fetched_from_date` is the earliest date ever *requested*, and
/// `latest_date` the most recent date covered by a completed forward fetch.
/// Neither is necessarily a date holding a bar: weekends and holidays have
/// no bar but stay covered, so the same empty sub-range is never re-queried.
/// Invariant when bars exist: `fetched_from_date <= earliest_date <= latest_date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRangeRecord {
    pub symbol: Symbol,
    pub bars: Vec<HistoricalBar>,
    pub earliest_date: Option<CalendarDate>,
    pub latest_date: CalendarDate,
    pub fetched_from_date: CalendarDate,
}

impl CachedRangeRecord {
    /// Build a record from merged bars and the covered request window.
    pub fn from_bars(
        symbol: Symbol,
        bars: Vec<HistoricalBar>,
        fetched_from_date: CalendarDate,
        latest_date: CalendarDate,
    ) -> Self {
        let earliest_date = bars.first().map(|bar| bar.date);
        let latest_bar = bars.last().map(|bar| bar.date);
        Self {
            symbol,
            bars,
            earliest_date,
            latest_date: latest_bar
                .map(|d| d.max(latest_date))
                .unwrap_or(latest_date),
            fetched_from_date,
        }
    }
}

/// Where a catalyst event was mined from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Filings,
    Trials,
}

impl EventSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Filings => "filings",
            Self::Trials => "trials",
        }
    }
}

impl Display for EventSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical catalyst categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalystEventType {
    PdufaDate,
    AdcomMeeting,
    ExpeditedDesignation,
    RegulatoryApproval,
    RegulatoryRejection,
    DataReadout,
    TrialMilestone,
    ApplicationSubmission,
    EarningsRelease,
    MaterialAgreement,
    LeadershipChange,
    AtmOffering,
    TrialCompletion,
    OtherDisclosure,
}

impl CatalystEventType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PdufaDate => "pdufa_date",
            Self::AdcomMeeting => "adcom_meeting",
            Self::ExpeditedDesignation => "expedited_designation",
            Self::RegulatoryApproval => "regulatory_approval",
            Self::RegulatoryRejection => "regulatory_rejection",
            Self::DataReadout => "data_readout",
            Self::TrialMilestone => "trial_milestone",
            Self::ApplicationSubmission => "application_submission",
            Self::EarningsRelease => "earnings_release",
            Self::MaterialAgreement => "material_agreement",
            Self::LeadershipChange => "leadership_change",
            Self::AtmOffering => "atm_offering",
            Self::TrialCompletion => "trial_completion",
            Self::OtherDisclosure => "other_disclosure",
        }
    }
}

impl Display for CatalystEventType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dated, materially price-relevant event tied to one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalystEvent {
    pub id: String,
    pub symbol: Symbol,
    pub event_type: CatalystEventType,
    pub date: CalendarDate,
    pub is_estimate: bool,
    pub title: String,
    pub description: String,
    pub source: EventSource,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_url: Option<String>,
}

impl CatalystEvent {
    /// Deterministic id: stable across re-runs, used as the dedup key.
    pub fn id_for(
        source: EventSource,
        event_type: CatalystEventType,
        symbol: &Symbol,
        date: CalendarDate,
        code: Option<&str>,
    ) -> String {
        match code {
            Some(code) => format!("{source}:{event_type}:{symbol}:{date}:{code}"),
            None => format!("{source}:{event_type}:{symbol}:{date}"),
        }
    }
}

/// Engine output before id assignment and cache merge.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedCatalyst {
    pub event_type: CatalystEventType,
    pub title: String,
    pub description: String,
    pub date: Option<CalendarDate>,
    pub is_estimate: bool,
}

/// Durable per-symbol catalyst state.
///
/// Events from every source live together in one record; each synchronizer
/// replaces only its own source's slice and leaves the rest untouched. The
/// high-water marks are monotonically non-decreasing, including across
/// partial failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalystCacheRecord {
    pub symbol: Symbol,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub filings_last_fetched: Option<CalendarDate>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub trials_last_fetched: Option<CalendarDate>,
    pub events: Vec<CatalystEvent>,
}

impl CatalystCacheRecord {
    pub fn empty(symbol: Symbol) -> Self {
        Self {
            symbol,
            filings_last_fetched: None,
            trials_last_fetched: None,
            events: Vec::new(),
        }
    }

    /// Events belonging to one source, in stored order.
    pub fn events_for(&self, source: EventSource) -> Vec<CatalystEvent> {
        self.events
            .iter()
            .filter(|event| event.source == source)
            .cloned()
            .collect()
    }

    /// Events belonging to every source except one.
    pub fn events_excluding(&self, source: EventSource) -> Vec<CatalystEvent> {
        self.events
            .iter()
            .filter(|event| event.source != source)
            .cloned()
            .collect()
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

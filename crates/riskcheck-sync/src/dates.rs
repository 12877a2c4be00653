//! Multi-format date parsing for filing text and registry payloads.

use riskcheck_core::CalendarDate;
use time::{Date, Month};

/// A parsed date plus whether the source wording was only approximate
/// (quarter or month precision).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDate {
    pub date: CalendarDate,
    pub approximate: bool,
}

impl ParsedDate {
    fn exact(date: Date) -> Self {
        Self {
            date: CalendarDate::from_date(date),
            approximate: false,
        }
    }

    fn approximate(date: Date) -> Self {
        Self {
            date: CalendarDate::from_date(date),
            approximate: true,
        }
    }
}

/// Parse a date fragment captured from filing prose.
///
/// Accepted forms: `Month D, YYYY` (long or abbreviated month names),
/// `MM/DD/YYYY`, `YYYY-MM-DD`, and `Qn YYYY` (mapped to the quarter's last
/// calendar day and flagged approximate). Anything else yields `None`;
/// unparseable fragments are dropped silently by callers.
pub fn parse_date_fragment(fragment: &str) -> Option<ParsedDate> {
    let trimmed = fragment.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return None;
    }

    if let Some(parsed) = parse_quarter(trimmed) {
        return Some(parsed);
    }
    if trimmed.contains('/') {
        return parse_slash_numeric(trimmed);
    }
    if let Some(parsed) = parse_iso(trimmed) {
        return Some(parsed);
    }
    parse_month_name(trimmed)
}

/// Parse a trials-registry completion date: `YYYY-MM-DD`, or `YYYY-MM`
/// mapped to the month's last day and flagged approximate.
pub fn parse_registry_date(value: &str) -> Option<ParsedDate> {
    let trimmed = value.trim();
    if let Some(parsed) = parse_iso(trimmed) {
        return Some(parsed);
    }

    let (year, month) = trimmed.split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;
    let last = time::util::days_in_year_month(year, month);
    Date::from_calendar_date(year, month, last)
        .ok()
        .map(ParsedDate::approximate)
}

fn parse_quarter(input: &str) -> Option<ParsedDate> {
    let rest = input.strip_prefix(['Q', 'q'])?;
    let (quarter, year) = rest.split_once(char::is_whitespace)?;
    let quarter: u8 = quarter.parse().ok()?;
    let year: i32 = year.trim().parse().ok()?;

    let (month, day) = match quarter {
        1 => (Month::March, 31),
        2 => (Month::June, 30),
        3 => (Month::September, 30),
        4 => (Month::December, 31),
        _ => return None,
    };
    Date::from_calendar_date(year, month, day)
        .ok()
        .map(ParsedDate::approximate)
}

fn parse_slash_numeric(input: &str) -> Option<ParsedDate> {
    let mut parts = input.splitn(3, '/');
    let month = Month::try_from(parts.next()?.trim().parse::<u8>().ok()?).ok()?;
    let day: u8 = parts.next()?.trim().parse().ok()?;
    let year: i32 = parts.next()?.trim().parse().ok()?;
    Date::from_calendar_date(year, month, day)
        .ok()
        .map(ParsedDate::exact)
}

fn parse_iso(input: &str) -> Option<ParsedDate> {
    let mut parts = input.splitn(3, '-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month = Month::try_from(parts.next()?.parse::<u8>().ok()?).ok()?;
    let day: u8 = parts.next()?.parse().ok()?;
    Date::from_calendar_date(year, month, day)
        .ok()
        .map(ParsedDate::exact)
}

fn parse_month_name(input: &str) -> Option<ParsedDate> {
    let mut parts = input.split_whitespace();
    let month = month_from_name(parts.next()?)?;
    let day: u8 = parts.next()?.trim_end_matches(',').parse().ok()?;
    let year: i32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Date::from_calendar_date(year, month, day)
        .ok()
        .map(ParsedDate::exact)
}

fn month_from_name(name: &str) -> Option<Month> {
    let normalized = name.trim_end_matches('.').to_ascii_lowercase();
    let month = match normalized.as_str() {
        "january" | "jan" => Month::January,
        "february" | "feb" => Month::February,
        "march" | "mar" => Month::March,
        "april" | "apr" => Month::April,
        "may" => Month::May,
        "june" | "jun" => Month::June,
        "july" | "jul" => Month::July,
        "august" | "aug" => Month::August,
        "september" | "sept" | "sep" => Month::September,
        "october" | "oct" => Month::October,
        "november" | "nov" => Month::November,
        "december" | "dec" => Month::December,
        _ => return None,
    };
    Some(month)
}

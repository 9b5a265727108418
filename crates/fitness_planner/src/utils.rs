//! Date helpers shared by the planner and its surfaces.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

/// Parse a strict `YYYY-MM-DD` calendar date with a year in 1900..=2100.
pub fn parse_local_date(s: &str) -> Option<NaiveDate> {
    let mut parts = s.split('-');
    let (y, m, d) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let year: i32 = y.parse().ok()?;
    let month: u32 = m.parse().ok()?;
    let day: u32 = d.parse().ok()?;
    if !(1900..=2100).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Normalize an event date to `YYYY-MM-DD`.
///
/// Accepts:
/// - YYYY-MM-DD
/// - RFC3339 datetime (the local date part is kept)
/// - Naive datetime YYYY-MM-DDTHH:MM:SS
pub fn normalize_event_date(s: &str) -> Option<String> {
    if let Some(d) = parse_local_date(s) {
        return Some(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local().format("%Y-%m-%d").to_string());
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(ndt.format("%Y-%m-%d").to_string());
    }
    None
}

/// Short display form, e.g. `Jun 15`. Unparseable input is returned as is.
pub fn format_date(s: &str) -> String {
    match parse_local_date(s) {
        Some(d) => format!("{} {}", d.format("%b"), d.day()),
        None => s.to_string(),
    }
}

/// Calendar grid facts for the month containing `date`: weekday of the 1st
/// (0 = Sunday) and the number of days.
pub fn days_in_month(date: NaiveDate) -> (u32, u32) {
    let first = date.with_day(1).unwrap_or(date);
    let next_first = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    let days = next_first
        .map(|n| (n - first).num_days() as u32)
        .unwrap_or(31);
    (first.weekday().num_days_from_sunday(), days)
}

/// Whole days from `today` to `date`; negative once the date has passed.
pub fn days_until(date: &str, today: NaiveDate) -> Option<i64> {
    parse_local_date(date).map(|d| (d - today).num_days())
}

pub fn format_countdown(days: i64) -> String {
    match days {
        d if d < 0 => "Past".to_string(),
        0 => "Today!".to_string(),
        1 => "Tomorrow!".to_string(),
        d if d < 7 => format!("{d} days"),
        d if d < 30 => format!("{} weeks", d / 7),
        d => format!("{} months", d / 30),
    }
}

/// Inclusive range check. Malformed bounds never contain anything.
pub fn is_date_in_range(check: NaiveDate, start: &str, end: &str) -> bool {
    match (parse_local_date(start), parse_local_date(end)) {
        (Some(s), Some(e)) => s <= check && check <= e,
        _ => false,
    }
}

static UNSAFE_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9.-]").expect("static regex"));

/// Storage-safe file name prefixed with a timestamp.
pub fn safe_file_name(name: &str, timestamp_millis: i64) -> String {
    format!(
        "{}_{}",
        timestamp_millis,
        UNSAFE_FILE_CHARS.replace_all(name, "_")
    )
}

//! Business-timezone helpers and timestamp normalization.
//!
//! Storage and comparison always happen in UTC. Calendar logic ("today",
//! archive dates, retention ages) always happens in the business timezone.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Business timezone used for calendar decisions (UTC+8, no DST)
pub const BUSINESS_TZ: Tz = chrono_tz::Asia::Shanghai;

/// How far in the future a clock-only time may be before it is attributed to yesterday
const CLOCK_SKEW_MINUTES: i64 = 5;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Zone a naive (offset-less) timestamp is assumed to be expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssumedZone {
    Utc,
    Business,
}

pub fn now_business() -> DateTime<Tz> {
    Utc::now().with_timezone(&BUSINESS_TZ)
}

pub fn today_business() -> NaiveDate {
    now_business().date_naive()
}

/// Calendar date of a UTC instant in the business timezone.
pub fn business_date_of(ts: DateTime<Utc>) -> NaiveDate {
    ts.with_timezone(&BUSINESS_TZ).date_naive()
}

pub fn from_unix_seconds(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

/// Localize a naive timestamp in the given zone and convert it to UTC.
pub fn localize(naive: NaiveDateTime, zone: AssumedZone) -> Option<DateTime<Utc>> {
    match zone {
        AssumedZone::Utc => Some(Utc.from_utc_datetime(&naive)),
        AssumedZone::Business => BUSINESS_TZ
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc)),
    }
}

/// Parse any timestamp representation seen in the wild into UTC.
///
/// Accepts Unix seconds/milliseconds, RFC 3339, RFC 2822 and a handful of
/// naive layouts. Returns `None` rather than guessing when nothing matches.
pub fn parse_timestamp(text: &str, zone: AssumedZone) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if text.bytes().all(|b| b.is_ascii_digit()) {
        let value: i64 = text.parse().ok()?;
        // Millisecond epochs are 13 digits
        return if value > 100_000_000_000 {
            DateTime::from_timestamp_millis(value)
        } else {
            from_unix_seconds(value)
        };
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .and_then(|naive| localize(naive, zone))
}

/// Extract the first `H:MM` or `H:MM:SS` clock reading from free text.
pub fn parse_clock(text: &str) -> Option<NaiveTime> {
    text.split(|c: char| !(c.is_ascii_digit() || c == ':'))
        .filter(|run| run.contains(':'))
        .find_map(|run| {
            let parts: Vec<&str> = run.split(':').collect();
            let nums: Option<Vec<u32>> = parts
                .iter()
                .map(|p| if p.is_empty() || p.len() > 2 { None } else { p.parse().ok() })
                .collect();
            match nums?.as_slice() {
                [h, m] => NaiveTime::from_hms_opt(*h, *m, 0),
                [h, m, s] => NaiveTime::from_hms_opt(*h, *m, *s),
                _ => None,
            }
        })
}

/// Resolve a clock-only reading (as shown on live tickers) to a UTC instant.
///
/// The reading is placed on `now`'s business date; a result that would lie in
/// the future belongs to the previous day.
pub fn clock_time_on_business_day(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let clock = parse_clock(text)?;
    let today = business_date_of(now);
    let candidate = localize(today.and_time(clock), AssumedZone::Business)?;
    if candidate > now + Duration::minutes(CLOCK_SKEW_MINUTES) {
        Some(candidate - Duration::days(1))
    } else {
        Some(candidate)
    }
}

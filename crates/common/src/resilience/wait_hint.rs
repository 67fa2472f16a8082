//! `Retry-After` parsing
//!
//! Accepts delta-seconds (`"120"`) or an HTTP-date in any of the three
//! formats RFC 9110 allows (IMF-fixdate, RFC 850, asctime). Anything else is
//! treated as absent.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse a wait hint into milliseconds relative to `now`.
///
/// Dates in the past yield `Some(0)`.
pub fn parse_wait_hint(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if value.bytes().all(|b| b.is_ascii_digit()) {
        return value.parse::<u64>().ok().map(|secs| secs.saturating_mul(1_000));
    }

    let at = parse_http_date(value)?;
    let millis = (at - now).num_milliseconds();
    Some(u64::try_from(millis).unwrap_or(0))
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    // RFC 850: Sunday, 06-Nov-94 08:49:37 GMT
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%A, %d-%b-%y %H:%M:%S GMT") {
        return Some(naive.and_utc());
    }

    // asctime: Sun Nov  6 08:49:37 1994
    NaiveDateTime::parse_from_str(value, "%a %b %e %H:%M:%S %Y").ok().map(|naive| naive.and_utc())
}

//! Relative-time expressions
//!
//! The query language stores the right-hand side of `cdate>yesterday` or
//! `mdate<"2 weeks ago"` verbatim. Drivers that need a concrete instant call
//! [`resolve`] with their notion of "now".
//!
//! # Accepted forms
//!
//! ```text
//! now | today | yesterday | tomorrow
//! 2 days ago | an hour ago
//! in 3 weeks
//! +1 month | -90 minutes
//! now-7d | -7d | +3h
//! next week | last year
//! 2024-01-15T00:00:00Z
//! ```

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::query::error::{QueryError, QueryResult};

static AGO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+|an?)\s*([a-z]+)\s+ago$").unwrap());

static IN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^in\s+(\d+|an?)\s*([a-z]+)$").unwrap());

static OFFSET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:now\s*)?([+-])\s*(\d+)\s*([a-z]+)$").unwrap());

static NEXT_LAST_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(next|last)\s+([a-z]+)$").unwrap());

/// Resolve a relative-time expression against `now`
pub fn resolve(expression: &str, now: DateTime<Utc>) -> QueryResult<DateTime<Utc>> {
    let normalized = expression
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let invalid = || QueryError::RelativeTime(expression.to_string());

    match normalized.as_str() {
        "now" => return Ok(now),
        "today" => return start_of_day(now, 0).ok_or_else(invalid),
        "yesterday" => return start_of_day(now, -1).ok_or_else(invalid),
        "tomorrow" => return start_of_day(now, 1).ok_or_else(invalid),
        _ => {}
    }

    if let Some(caps) = AGO_RE.captures(&normalized) {
        let delta = offset(&caps[1], &caps[2]).ok_or_else(invalid)?;
        return now.checked_sub_signed(delta).ok_or_else(invalid);
    }

    if let Some(caps) = IN_RE.captures(&normalized) {
        let delta = offset(&caps[1], &caps[2]).ok_or_else(invalid)?;
        return now.checked_add_signed(delta).ok_or_else(invalid);
    }

    if let Some(caps) = OFFSET_RE.captures(&normalized) {
        let delta = offset(&caps[2], &caps[3]).ok_or_else(invalid)?;
        return match &caps[1] {
            "-" => now.checked_sub_signed(delta),
            _ => now.checked_add_signed(delta),
        }
        .ok_or_else(invalid);
    }

    if let Some(caps) = NEXT_LAST_RE.captures(&normalized) {
        let delta = offset("1", &caps[2]).ok_or_else(invalid)?;
        return match &caps[1] {
            "last" => now.checked_sub_signed(delta),
            _ => now.checked_add_signed(delta),
        }
        .ok_or_else(invalid);
    }

    DateTime::parse_from_rfc3339(expression.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| invalid())
}

/// Midnight UTC of the day `days` away from `now`
fn start_of_day(now: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    let midnight = now.date_naive().and_hms_opt(0, 0, 0)?.and_utc();
    midnight.checked_add_signed(Duration::try_days(days)?)
}

/// Duration of `amount` units
fn offset(amount: &str, unit: &str) -> Option<Duration> {
    let amount: i64 = match amount {
        "a" | "an" => 1,
        n => n.parse().ok()?,
    };

    let seconds_per_unit: i64 = match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
        "d" | "day" | "days" => 24 * 3600,
        "w" | "wk" | "wks" | "week" | "weeks" => 7 * 24 * 3600,
        // Months and years are approximate
        "mo" | "mon" | "month" | "months" => 30 * 24 * 3600,
        "y" | "yr" | "yrs" | "year" | "years" => 365 * 24 * 3600,
        _ => return None,
    };

    Duration::try_seconds(amount.checked_mul(seconds_per_unit)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        // 2024-01-15 14:35:42 UTC
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 35, 42).unwrap()
    }

    #[test]
    fn test_keywords() {
        assert_eq!(resolve("now", now()).unwrap(), now());
        assert_eq!(
            resolve("today", now()).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
        );
        assert_eq!(
            resolve("Yesterday", now()).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 14, 0, 0, 0).unwrap()
        );
        assert_eq!(
            resolve("tomorrow", now()).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 16, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_ago() {
        assert_eq!(
            resolve("2 days ago", now()).unwrap(),
            now() - Duration::days(2)
        );
        assert_eq!(
            resolve("an hour ago", now()).unwrap(),
            now() - Duration::hours(1)
        );
        assert_eq!(
            resolve("3  weeks   ago", now()).unwrap(),
            now() - Duration::weeks(3)
        );
    }

    #[test]
    fn test_in_and_signed_offsets() {
        assert_eq!(resolve("in 3 hours", now()).unwrap(), now() + Duration::hours(3));
        assert_eq!(resolve("+1 month", now()).unwrap(), now() + Duration::days(30));
        assert_eq!(
            resolve("-90 minutes", now()).unwrap(),
            now() - Duration::minutes(90)
        );
    }

    #[test]
    fn test_compact_offsets() {
        assert_eq!(resolve("now-7d", now()).unwrap(), now() - Duration::days(7));
        assert_eq!(resolve("-7d", now()).unwrap(), now() - Duration::days(7));
        assert_eq!(resolve("+3h", now()).unwrap(), now() + Duration::hours(3));
    }

    #[test]
    fn test_next_last() {
        assert_eq!(resolve("next week", now()).unwrap(), now() + Duration::weeks(1));
        assert_eq!(resolve("last year", now()).unwrap(), now() - Duration::days(365));
    }

    #[test]
    fn test_rfc3339() {
        assert_eq!(
            resolve("2024-01-01T00:00:00Z", now()).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_invalid_expressions() {
        assert!(matches!(
            resolve("sometime", now()),
            Err(QueryError::RelativeTime(_))
        ));
        assert!(resolve("2 fortnights ago", now()).is_err());
        assert!(resolve("99999999999999999999 days ago", now()).is_err());
    }
}

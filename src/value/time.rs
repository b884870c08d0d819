//! Date values: ISO-8601 timestamps and relative offsets like `-7d`

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use super::{CoercionError, TypedValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl TimeUnit {
    /// Parse a unit name (e.g., "days", "hours", "d", "h")
    fn parse(unit: &str) -> Option<Self> {
        match unit {
            "seconds" | "second" | "secs" | "sec" | "s" => Some(TimeUnit::Seconds),
            "minutes" | "minute" | "mins" | "min" | "m" => Some(TimeUnit::Minutes),
            "hours" | "hour" | "hrs" | "hr" | "h" => Some(TimeUnit::Hours),
            "days" | "day" | "d" => Some(TimeUnit::Days),
            "weeks" | "week" | "w" => Some(TimeUnit::Weeks),
            _ => None,
        }
    }

    fn ms(&self) -> i64 {
        match self {
            TimeUnit::Seconds => 1_000,
            TimeUnit::Minutes => 60_000,
            TimeUnit::Hours => 3_600_000,
            TimeUnit::Days => 86_400_000,
            TimeUnit::Weeks => 604_800_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sign {
    /// `-`: that long ago
    Past,
    /// `+`: that far ahead
    Future,
}

/// Signed offset from the moment the query is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelativeDate {
    pub sign: Sign,
    pub amount: i64,
    pub unit: TimeUnit,
    /// Signed offset in milliseconds; negative for `Sign::Past`
    pub offset_ms: i64,
}

impl RelativeDate {
    pub fn offset(&self) -> Duration {
        Duration::milliseconds(self.offset_ms)
    }

    /// The instant this offset designates relative to `now`
    pub fn resolve(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        now.checked_add_signed(self.offset())
    }
}

/// Absolute timestamp; times without an offset are taken as UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IsoDate {
    pub date_time: DateTime<FixedOffset>,
    /// Written as a bare `YYYY-MM-DD`
    pub date_only: bool,
    /// Written with `Z` or an explicit `+hh:mm` offset
    pub has_offset: bool,
}

/// Parse `[+-]<int><unit>` (e.g., "-7d", "+3hours")
pub fn parse_relative_date(text: &str) -> Result<RelativeDate, CoercionError> {
    let invalid = |detail: &str| CoercionError::InvalidRelativeDate {
        text: text.to_string(),
        detail: detail.to_string(),
    };

    let (sign, rest) = if let Some(rest) = text.strip_prefix('-') {
        (Sign::Past, rest)
    } else if let Some(rest) = text.strip_prefix('+') {
        (Sign::Future, rest)
    } else {
        return Err(invalid("must start with - or +"));
    };

    let digit_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let (num_str, unit_str) = rest.split_at(digit_end);

    if num_str.is_empty() {
        return Err(invalid("missing number"));
    }
    if unit_str.is_empty() {
        return Err(invalid("missing time unit"));
    }

    let amount = num_str
        .parse::<i64>()
        .map_err(|_| invalid("number out of range"))?;
    let unit = TimeUnit::parse(&unit_str.to_ascii_lowercase())
        .ok_or_else(|| invalid(&format!("unknown unit: {}", unit_str)))?;

    let magnitude = amount
        .checked_mul(unit.ms())
        .ok_or_else(|| invalid("offset out of range"))?;
    let offset_ms = match sign {
        Sign::Past => -magnitude,
        Sign::Future => magnitude,
    };

    Ok(RelativeDate {
        sign,
        amount,
        unit,
        offset_ms,
    })
}

/// Parse an ISO-8601 date or date-time
///
/// Supports:
/// - Dates: "2024-12-31"
/// - RFC3339: "2024-12-31T23:59:59Z", "2024-12-31T23:59:59.123+05:30"
/// - Without offset: "2024-12-31T23:59:59", "2024-12-31T23:59:59.250", "2024-12-31T23:59"
pub fn parse_iso_date(text: &str) -> Result<IsoDate, CoercionError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(IsoDate {
            date_time: dt,
            date_only: false,
            has_offset: true,
        });
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(IsoDate {
                date_time: naive.and_utc().fixed_offset(),
                date_only: false,
                has_offset: false,
            });
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(IsoDate {
                date_time: midnight.and_utc().fixed_offset(),
                date_only: true,
                has_offset: false,
            });
        }
    }

    Err(CoercionError::InvalidDate(text.to_string()))
}

/// Parse a date filter value: relative when signed, absolute otherwise
pub fn parse_date(text: &str) -> Result<TypedValue, CoercionError> {
    let looks_relative = text.starts_with(['-', '+'])
        && text[1..].starts_with(|c: char| c.is_ascii_digit());

    if looks_relative {
        parse_relative_date(text).map(TypedValue::RelativeDate)
    } else {
        parse_iso_date(text).map(TypedValue::Iso8601Date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_relative_units() {
        let cases = [
            ("-5s", -5_000),
            ("-10seconds", -10_000),
            ("-5m", -300_000),
            ("-1min", -60_000),
            ("-3h", -10_800_000),
            ("-2hours", -7_200_000),
            ("-7d", -604_800_000),
            ("-1day", -86_400_000),
            ("-2w", -1_209_600_000),
            ("-1week", -604_800_000),
        ];
        for (text, offset_ms) in cases {
            let rel = parse_relative_date(text).unwrap();
            assert_eq!(rel.offset_ms, offset_ms, "for {}", text);
            assert_eq!(rel.sign, Sign::Past);
        }
    }

    #[test]
    fn test_relative_future() {
        let rel = parse_relative_date("+3d").unwrap();
        assert_eq!(rel.sign, Sign::Future);
        assert_eq!(rel.amount, 3);
        assert_eq!(rel.unit, TimeUnit::Days);
        assert_eq!(rel.offset(), Duration::days(3));
    }

    #[test]
    fn test_relative_resolve() {
        let rel = parse_relative_date("-7d").unwrap();
        let resolved = rel.resolve(now()).unwrap();
        assert_eq!(resolved, Utc.with_ymd_and_hms(2024, 6, 8, 12, 0, 0).unwrap());

        let rel = parse_relative_date("+2h").unwrap();
        assert_eq!(rel.resolve(now()).unwrap().hour(), 14);
    }

    #[test]
    fn test_relative_errors() {
        assert!(parse_relative_date("7d").is_err());
        assert!(parse_relative_date("-d").is_err());
        assert!(parse_relative_date("-5").is_err());

        let err = parse_relative_date("-5xyz").unwrap_err();
        assert!(err.to_string().contains("unknown unit"));

        let err = parse_relative_date("-99999999999999999w").unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_zero_offset() {
        let rel = parse_relative_date("-0d").unwrap();
        assert_eq!(rel.offset_ms, 0);
        assert_eq!(rel.resolve(now()).unwrap(), now());
    }

    #[test]
    fn test_absolute_date_simple() {
        let date = parse_iso_date("2024-12-31").unwrap();
        assert!(date.date_only);
        assert_eq!(date.date_time.year(), 2024);
        assert_eq!(date.date_time.month(), 12);
        assert_eq!(date.date_time.day(), 31);
        assert_eq!(date.date_time.hour(), 0);
    }

    #[test]
    fn test_absolute_date_edge_cases() {
        assert!(parse_iso_date("2024-02-29").is_ok());
        assert!(parse_iso_date("2023-02-29").is_err());
        assert!(parse_iso_date("2024-13-01").is_err());
        assert!(parse_iso_date("2024-04-31").is_err());
    }

    #[test]
    fn test_iso8601_with_offset() {
        let date = parse_iso_date("2024-12-31T23:59:59Z").unwrap();
        assert!(date.has_offset);
        assert_eq!(date.date_time.naive_utc().hour(), 23);

        let date = parse_iso_date("2024-12-31T23:59:59+05:30").unwrap();
        assert_eq!(date.date_time.naive_utc().hour(), 18);
        assert_eq!(date.date_time.naive_utc().minute(), 29);

        assert!(parse_iso_date("2024-12-31T23:59:59.999Z").is_ok());
    }

    #[test]
    fn test_iso8601_without_offset_is_utc() {
        let date = parse_iso_date("2024-12-31T23:59:59").unwrap();
        assert!(!date.has_offset);
        assert!(!date.date_only);
        assert_eq!(date.date_time.offset().local_minus_utc(), 0);
        assert_eq!(date.date_time.second(), 59);

        assert!(parse_iso_date("2024-12-31T23:59:59.250").is_ok());
        assert!(parse_iso_date("2024-12-31T23:59").is_ok());
    }

    #[test]
    fn test_invalid_formats() {
        assert!(parse_iso_date("2024/01/01").is_err());
        assert!(parse_iso_date("01-01-2024").is_err());
        assert!(parse_iso_date("12:00:00").is_err());
        assert!(parse_iso_date("yesterday").is_err());

        let err = parse_iso_date("not-a-date").unwrap_err();
        assert!(err.to_string().contains("ISO-8601"));
    }

    #[test]
    fn test_parse_date_dispatch() {
        assert!(matches!(
            parse_date("-24h").unwrap(),
            TypedValue::RelativeDate(_)
        ));
        assert!(matches!(
            parse_date("2024-01-01").unwrap(),
            TypedValue::Iso8601Date(_)
        ));
        // a leading dash without digits is not an offset
        assert!(matches!(
            parse_date("-yesterday"),
            Err(CoercionError::InvalidDate(_))
        ));
    }
}

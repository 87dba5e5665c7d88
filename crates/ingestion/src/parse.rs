//! Field coercion for raw string cells.

use chrono::{NaiveDate, NaiveDateTime};
use rebid_core::DispatchPeriod;

/// Outcome of coercing one numeric cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced {
    /// A finite number.
    Present(f64),
    /// Empty cell.
    Empty,
    /// Unparseable or non-finite text.
    Malformed,
}

impl Coerced {
    /// Value as an optional band entry; malformed cells become missing.
    pub fn value(self) -> Option<f64> {
        match self {
            Coerced::Present(v) => Some(v),
            Coerced::Empty | Coerced::Malformed => None,
        }
    }
}

/// Coerce a numeric cell. `NaN` and infinities are treated as malformed.
pub fn coerce_number(raw: &str) -> Coerced {
    let trimmed = raw.trim().trim_matches('"');
    if trimmed.is_empty() {
        return Coerced::Empty;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Coerced::Present(v),
        _ => Coerced::Malformed,
    }
}

const DATETIME_FORMATS: [&str; 7] = [
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y/%m/%d", "%Y-%m-%d"];

/// Parse an offer or settlement timestamp. Date-only values map to midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim().trim_matches('"');
    if trimmed.is_empty() {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parse a market day from a date or a midnight timestamp.
pub fn parse_market_day(raw: &str) -> Option<NaiveDate> {
    parse_timestamp(raw).map(|ts| ts.date())
}

/// Parse a dispatch period index (`12` or `12.0`).
pub fn parse_period(raw: &str) -> Option<DispatchPeriod> {
    let trimmed = raw.trim().trim_matches('"');
    if let Ok(p) = trimmed.parse::<DispatchPeriod>() {
        return Some(p);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v >= 0.0 && v <= DispatchPeriod::MAX as f64 => {
            Some(v as DispatchPeriod)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce_number("12.5"), Coerced::Present(12.5));
        assert_eq!(coerce_number(" -1000 "), Coerced::Present(-1000.0));
        assert_eq!(coerce_number(""), Coerced::Empty);
        assert_eq!(coerce_number("abc"), Coerced::Malformed);
        assert_eq!(coerce_number("NaN"), Coerced::Malformed);
        assert_eq!(coerce_number("inf"), Coerced::Malformed);
        assert_eq!(coerce_number("abc").value(), None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let a = parse_timestamp("2025/10/01 09:05:00").unwrap();
        let b = parse_timestamp("2025-10-01 09:05:00").unwrap();
        let c = parse_timestamp("2025-10-01T09:05:00").unwrap();
        let d = parse_timestamp("\"2025/10/01 09:05:00.250\"").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(d.minute(), 5);
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_parse_market_day() {
        let day = parse_market_day("2025/10/01").unwrap();
        assert_eq!(day, NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
        assert_eq!(parse_market_day("2025/10/01 00:00:00"), Some(day));
    }

    #[test]
    fn test_parse_period() {
        assert_eq!(parse_period("288"), Some(288));
        assert_eq!(parse_period("12.0"), Some(12));
        assert_eq!(parse_period("1.5"), None);
        assert_eq!(parse_period("-1"), None);
        assert_eq!(parse_period("x"), None);
    }
}

//! UTC ISO-8601 timestamps as they appear in the ledger.
//!
//! Ledger timestamps are naive UTC with microsecond precision
//! (`2024-05-01T10:00:00.123456`). They are stored and hashed as strings, so
//! the exact rendering matters: never re-format a stored timestamp.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::error::TypeError;

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
const ISO_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Render a UTC instant in ledger format.
pub fn format_iso(at: DateTime<Utc>) -> String {
    at.format(ISO_FORMAT).to_string()
}

/// Current UTC time in ledger format.
pub fn now_iso() -> String {
    format_iso(Utc::now())
}

/// Parse a client- or ledger-supplied timestamp.
///
/// Accepts RFC 3339 with an explicit offset (`Z`, `+02:00`) and naive
/// ISO-8601, which is taken to be UTC. Fractional seconds are optional.
pub fn parse_iso(s: &str) -> Result<DateTime<Utc>, TypeError> {
    let trimmed = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, ISO_PARSE_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| TypeError::InvalidTimestamp(format!("{s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn format_has_microseconds_and_no_offset() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(format_iso(at), "2024-05-01T10:00:00.000000");
    }

    #[test]
    fn parses_own_format() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap() + Duration::microseconds(42);
        assert_eq!(parse_iso(&format_iso(at)).unwrap(), at);
    }

    #[test]
    fn parses_without_fraction() {
        let parsed = parse_iso("2024-05-01T10:00:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn parses_rfc3339_with_offset() {
        let parsed = parse_iso("2024-05-01T12:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_iso("yesterday"),
            Err(TypeError::InvalidTimestamp(_))
        ));
    }
}

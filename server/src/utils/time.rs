//! Time utility functions

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;

/// Format an instant as ISO 8601 UTC with millisecond precision (`Z` suffix).
pub fn to_iso(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Convert milliseconds since Unix epoch to DateTime<Utc>
pub fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Parse ISO 8601 / RFC 3339 timestamp string to DateTime<Utc>
pub fn parse_iso_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Parse a loosely-typed timestamp from an event payload.
///
/// Accepts RFC 3339 strings (any offset), numeric strings and numbers holding
/// epoch milliseconds. Returns `None` for anything else.
pub fn parse_timestamp_value(value: &JsonValue) -> Option<DateTime<Utc>> {
    match value {
        JsonValue::String(s) => parse_iso_timestamp(s)
            .or_else(|| s.trim().parse::<i64>().ok().and_then(millis_to_datetime)),
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .and_then(millis_to_datetime),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[test]
    fn test_to_iso_uses_millis_and_z() {
        let dt = millis_to_datetime(1_704_067_200_123).unwrap();
        assert_eq!(to_iso(&dt), "2024-01-01T00:00:00.123Z");
    }

    #[test]
    fn test_millis_to_datetime_epoch() {
        let dt = millis_to_datetime(0).unwrap();
        assert_eq!(dt.year(), 1970);
        assert_eq!(dt.month(), 1);
        assert_eq!(dt.day(), 1);
    }

    #[test]
    fn test_parse_iso_timestamp_with_offset() {
        let dt = parse_iso_timestamp("2024-01-15T10:30:00+05:00").unwrap();
        assert_eq!(dt.hour(), 5);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn test_parse_iso_timestamp_invalid() {
        assert!(parse_iso_timestamp("not-a-timestamp").is_none());
    }

    #[test]
    fn test_parse_timestamp_value_shapes() {
        let expected = parse_iso_timestamp("2024-01-01T00:00:00Z").unwrap();
        assert_eq!(
            parse_timestamp_value(&json!("2024-01-01T00:00:00Z")),
            Some(expected)
        );
        assert_eq!(
            parse_timestamp_value(&json!(1_704_067_200_000_i64)),
            Some(expected)
        );
        assert_eq!(
            parse_timestamp_value(&json!("1704067200000")),
            Some(expected)
        );
        assert_eq!(
            parse_timestamp_value(&json!(1_704_067_200_000.0)),
            Some(expected)
        );
    }

    #[test]
    fn test_parse_timestamp_value_rejects_garbage() {
        assert!(parse_timestamp_value(&json!("yesterday")).is_none());
        assert!(parse_timestamp_value(&json!(true)).is_none());
        assert!(parse_timestamp_value(&json!({"ts": 1})).is_none());
    }
}

//! Timestamp parsing for raw records.

use chrono::{DateTime, Utc};
use roadmap_core::{ComputationError, Time};

/// Parse a backend timestamp into UTC.
///
/// Accepts RFC 3339 and the `+0000` offset form Jira emits
/// (`2024-01-15T10:30:00.000+0000`).
pub fn parse_timestamp(subject: &str, value: &str) -> Result<Time, ComputationError> {
    let trimmed = value.trim();
    DateTime::parse_from_rfc3339(trimmed)
        .or_else(|_| DateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ComputationError::MalformedTimestamp {
            subject: subject.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_rfc3339() {
        let ts = parse_timestamp("x", "2024-05-01T10:00:00Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_jira_offset_form() {
        let ts = parse_timestamp("x", "2024-05-01T12:00:00.000+0200").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_malformed_timestamp_names_subject() {
        let err = parse_timestamp("jira:PAY-1", "yesterday").unwrap_err();
        assert_eq!(
            err,
            ComputationError::MalformedTimestamp {
                subject: "jira:PAY-1".into(),
                value: "yesterday".into()
            }
        );
    }
}

//! Timestamp parsing for user-supplied query bounds.

use crate::error::{CoreError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse an RFC 3339 timestamp, or a zone-less `YYYY-MM-DD HH:MM:SS`
/// interpreted as UTC.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            CoreError::InvalidParameter(format!(
                "invalid timestamp '{input}' (expected RFC 3339 or 'YYYY-MM-DD HH:MM:SS')"
            ))
        })
}

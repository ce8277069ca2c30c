//! RFC 7231 HTTP date handling (`Wed, 15 Nov 2023 12:45:26 GMT`). The
//! format is RFC 2822 with the obsolete `GMT` zone, which chrono's parser
//! accepts.

use chrono::{DateTime, Utc};

/// Parses an HTTP date header into epoch seconds.
#[must_use]
pub fn parse_http_date(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|parsed| parsed.timestamp())
}

/// Formats epoch seconds as an HTTP date for conditional request headers.
#[must_use]
pub fn format_http_date(timestamp: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|at| at.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}

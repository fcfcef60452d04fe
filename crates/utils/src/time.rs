//! Timestamp helpers shared across clients, store, and reconciler.

use chrono::{DateTime, Utc};

/// Current UTC timestamp, the single call site every component should use
/// so that tests can substitute a fixed clock by constructing values
/// directly instead of calling this function.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse an ISO-8601 timestamp, tolerating a trailing `Z` the way the
/// original Python service's `parse_iso_timestamp` did.
pub fn parse_iso(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let normalized = value.replace('Z', "+00:00");
    DateTime::parse_from_rfc3339(&normalized).map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_zulu_suffixed_timestamp() {
        let ts = parse_iso("2026-01-02T03:04:05Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-01-02T03:04:05+00:00");
    }
}

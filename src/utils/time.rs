//! Time helpers
//!
//! All persisted timestamps are unix milliseconds (i64).

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in milliseconds
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Current unix time in seconds (webhook signature tolerance checks)
pub fn now_secs() -> i64 {
    now_millis() / 1000
}

/// Format a millisecond timestamp as a human-readable date (for emails)
pub fn format_date(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis_is_positive() {
        assert!(now_millis() > 0);
    }

    #[test]
    fn test_format_date() {
        // 2025-01-15 10:30:00 UTC
        let millis = 1736937000000;
        assert_eq!(format_date(millis), "15/01/2025 10:30");
    }

    #[test]
    fn test_format_date_invalid() {
        assert_eq!(format_date(i64::MAX), "-");
    }
}

// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::error::Result;
use crate::models::TransportConfig;

/// Fallback wait when a 429 carries no usable hint.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &TransportConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Read a `Retry-After` header given in whole or fractional seconds.
///
/// HTTP-date values are not supported and yield `None`.
pub fn retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    parse_seconds(raw)
}

/// Parse a non-negative seconds value.
pub fn parse_seconds(raw: &str) -> Option<Duration> {
    seconds(raw.trim().parse().ok()?)
}

/// Convert a server-supplied wait; values past `Duration::MAX` saturate.
pub fn seconds(secs: f64) -> Option<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_header(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(retry_after_header(&headers), Some(Duration::from_secs(12)));

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after_header(&headers), None);
    }

    #[test]
    fn test_parse_seconds_rejects_negative() {
        assert_eq!(parse_seconds("1.5"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_seconds("-3"), None);
        assert_eq!(parse_seconds("soon"), None);
    }

    #[test]
    fn test_huge_wait_saturates() {
        assert_eq!(parse_seconds("1e30"), Some(Duration::MAX));
        assert_eq!(seconds(1e300), Some(Duration::MAX));
        assert_eq!(seconds(f64::INFINITY), None);
        assert_eq!(seconds(f64::NAN), None);
    }

    #[test]
    fn test_create_client() {
        assert!(create_async_client(&TransportConfig::default()).is_ok());
    }
}

//! HTTP failure classification shared by the GQL and Helix clients.

use crate::domain::FetchError;
use reqwest::StatusCode;

/// Statuses worth retrying: rate limited and gateway/server hiccups.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// Classify a non-success response.
pub fn classify_status(status: StatusCode, body: &str) -> FetchError {
    let snippet: String = body.chars().take(200).collect();
    let msg = format!("HTTP {}: {}", status, snippet);
    if is_retryable_status(status) {
        FetchError::Transient(msg)
    } else {
        FetchError::Fatal(msg)
    }
}

/// Classify a transport-level reqwest error.
///
/// Connect, timeout, request and body errors are transient; decode, redirect
/// and builder errors are not.
pub fn classify_reqwest_error(e: &reqwest::Error) -> FetchError {
    if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
        FetchError::Transient(e.to_string())
    } else {
        FetchError::Fatal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_gateway_errors_are_transient() {
        for code in [429u16, 500, 502, 503, 504] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(classify_status(status, "").is_transient(), "{}", code);
        }
    }

    #[test]
    fn client_errors_are_fatal() {
        for code in [400u16, 401, 403, 404, 501] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(
                matches!(classify_status(status, "nope"), FetchError::Fatal(_)),
                "{}",
                code
            );
        }
    }

    #[test]
    fn long_bodies_are_truncated_in_message() {
        let body = "x".repeat(1_000);
        let FetchError::Fatal(msg) = classify_status(StatusCode::BAD_REQUEST, &body) else {
            panic!("expected fatal");
        };
        assert!(msg.len() < 260);
    }
}

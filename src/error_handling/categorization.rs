//! Transport error categorization.

use super::types::TransportErrorKind;

/// Categorizes a `reqwest::Error` into a [`TransportErrorKind`].
///
/// Timeouts are checked before connect errors: a connect that hit the request
/// deadline reports as both, and the deadline is the more useful diagnosis.
pub fn categorize_reqwest_error(error: &reqwest::Error) -> TransportErrorKind {
    if error.is_builder() {
        TransportErrorKind::Builder
    } else if error.is_redirect() {
        TransportErrorKind::Redirect
    } else if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_connect() {
        TransportErrorKind::Connect
    } else if error.is_request() {
        TransportErrorKind::Request
    } else if error.is_body() {
        TransportErrorKind::Body
    } else if error.is_decode() {
        TransportErrorKind::Decode
    } else {
        TransportErrorKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_categorize_connect_error() {
        // Port 1 on loopback is closed on any sane test host
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build client");
        let error = client
            .get("http://127.0.0.1:1/")
            .send()
            .await
            .expect_err("connection should be refused");

        assert_eq!(categorize_reqwest_error(&error), TransportErrorKind::Connect);
    }

    #[test]
    fn test_categorize_builder_error() {
        let error = reqwest::Client::new()
            .get("not a url")
            .build()
            .expect_err("invalid url should fail to build");

        assert_eq!(categorize_reqwest_error(&error), TransportErrorKind::Builder);
    }
}

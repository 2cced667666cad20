//! Error handling.
//!
//! This module provides:
//! - Error type definitions for initialization and request failures
//! - Transport error categorization from `reqwest` errors
//!
//! Failures fall into:
//! - **Transport failures**: surfaced to the caller, never retried
//! - **Authentication failures** from delegated flows: request aborted before send
//! - **Policy warnings**: not errors at all, reported through [`crate::WarningSink`]

mod categorization;
mod types;

// Re-export public API
pub use categorization::categorize_reqwest_error;
pub use types::{InitializationError, RequestError, TransportErrorKind};

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_transport_kinds_have_distinct_labels() {
        let labels: std::collections::HashSet<&str> =
            TransportErrorKind::iter().map(|k| k.as_str()).collect();
        assert_eq!(labels.len(), TransportErrorKind::iter().count());
    }

    #[test]
    fn test_non_transport_errors_have_no_kind() {
        let error = RequestError::Authentication("sign-in rejected".to_string());
        assert_eq!(error.transport_kind(), None);
        assert_eq!(error.to_string(), "Authentication failed: sign-in rejected");
    }
}

//! Error type definitions.
//!
//! This module defines the error types surfaced by the engine and the
//! categories used to describe transport failures.

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error creating the engine-managed data directory or cookie file.
    #[error("Cookie store initialization error: {0}")]
    CookieStoreError(#[from] std::io::Error),
}

/// Failure outcome of a request.
///
/// Cancellation is not an error; see [`crate::SendOutcome::Cancelled`].
#[derive(Error, Debug)]
pub enum RequestError {
    /// The transport failed (connect, DNS, TLS, timeout, body read, ...).
    #[error("{kind}: {source}")]
    Transport {
        /// Category of the failure
        kind: TransportErrorKind,
        /// Underlying transport error
        #[source]
        source: ReqwestError,
    },

    /// A delegated authentication flow was rejected or failed.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The descriptor could not be turned into a request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Local I/O failure (cookie jar file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ReqwestError> for RequestError {
    fn from(source: ReqwestError) -> Self {
        RequestError::Transport {
            kind: super::categorize_reqwest_error(&source),
            source,
        }
    }
}

impl RequestError {
    /// Returns the transport category if this is a transport failure.
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            RequestError::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Categories of transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum TransportErrorKind {
    Builder,
    Redirect,
    Timeout,
    Connect,
    Request,
    Body,
    Decode,
    Other,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::Builder => "HTTP request builder error",
            TransportErrorKind::Redirect => "HTTP request redirect error",
            TransportErrorKind::Timeout => "HTTP request timeout error",
            TransportErrorKind::Connect => "HTTP request connect error",
            TransportErrorKind::Request => "HTTP request error",
            TransportErrorKind::Body => "HTTP request body error",
            TransportErrorKind::Decode => "HTTP request decode error",
            TransportErrorKind::Other => "HTTP request other error",
        }
    }
}

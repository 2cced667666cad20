//! rest_engine library: HTTP request execution for plain-text request files
//!
//! Turns a fully-resolved [`RequestDescriptor`] into an outbound HTTP call and
//! a structured, measured [`HttpResponseRecord`], applying authentication
//! (`Basic`, `Digest`, `AWS` SigV4, `Cognito`), per-host TLS client
//! certificates, proxy exclusion rules and a persistent cookie jar along the
//! way.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rest_engine::{CookieStore, HttpClient, RequestDescriptor, RequestSettings};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cookies = Arc::new(CookieStore::open_default()?);
//! let client = HttpClient::new(cookies);
//!
//! let request = RequestDescriptor::new(reqwest::Method::GET, "https://httpbin.org/get")
//!     .header("Accept", "application/json");
//! let response = client.send(&request, &RequestSettings::default()).await?;
//! println!("{} {}", response.status_code, response.status_message);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime.

pub mod auth;
pub mod config;
pub mod cookies;
pub mod descriptor;
mod error_handling;
pub mod executor;
pub mod headers;
pub mod hooks;
pub mod initialization;
mod models;
pub mod options;
pub mod proxy;
pub mod tls;
pub mod warnings;

// Re-export public API
pub use config::{LogFormat, LogLevel, RequestSettings};
pub use cookies::CookieStore;
pub use descriptor::parse_request_text;
pub use error_handling::{
    categorize_reqwest_error, InitializationError, RequestError, TransportErrorKind,
};
pub use executor::{HttpClient, ProgressCounters, RequestHandle, SendOutcome};
pub use headers::HeaderMapping;
pub use models::{
    HttpResponseRecord, RequestBody, RequestDescriptor, RequestEcho, TimingPhases,
};
pub use warnings::{CollectingWarningSink, LogWarningSink, WarningSink};

//! Data structures shared across the request pipeline.
//!
//! A [`RequestDescriptor`] goes in, an [`HttpResponseRecord`] comes out.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Method;

use crate::headers::{set_header, HeaderMapping};

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Text(String),
    Bytes(Vec<u8>),
}

impl RequestBody {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            RequestBody::Text(text) => text.as_bytes(),
            RequestBody::Bytes(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// A fully-resolved request, as handed to the engine.
///
/// The engine never mutates a descriptor; header stripping and additions
/// happen on a copy inside the transport options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Header names keep the casing the author wrote
    pub headers: HeaderMapping,
    pub body: Option<RequestBody>,
    /// Source text the request was read from, for diagnostics
    pub raw_body: Option<String>,
    /// Display name (`# @name`), if any
    pub name: Option<String>,
    /// File that declared the request; anchors file-relative certificate paths
    pub source_path: Option<PathBuf>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMapping::new(),
            body: None,
            raw_body: None,
            name: None,
            source_path: None,
        }
    }

    /// Sets a header, replacing any existing header with the same name
    /// (case-insensitive).
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        set_header(&mut self.headers, name, value);
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }
}

/// Time spent in each phase of a request.
///
/// `dns` is measured by the engine's resolver; `tcp` and `tls` are not
/// reported by the transport and stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimingPhases {
    pub dns: Option<Duration>,
    pub tcp: Option<Duration>,
    pub tls: Option<Duration>,
    /// From send until response headers arrived
    pub first_byte: Duration,
    /// From response headers until the body was fully read
    pub download: Duration,
    pub total: Duration,
}

/// The request as it actually went out, for display and history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEcho {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMapping,
    pub body: Option<RequestBody>,
    pub raw_body: Option<String>,
    pub name: Option<String>,
}

/// Structured, measured response.
#[derive(Debug, Clone)]
pub struct HttpResponseRecord {
    pub status_code: u16,
    pub status_message: String,
    /// `HTTP/1.1`, `HTTP/2.0`, ...
    pub http_version: String,
    /// The transport lower-cases names on receipt, so these carry the
    /// conventional spelling (`ETag`, `Content-Type`) rather than the exact
    /// bytes the server sent.
    pub headers: HeaderMapping,
    pub body: String,
    pub body_bytes: Vec<u8>,
    pub body_size_in_bytes: u64,
    pub headers_size_in_bytes: u64,
    pub timing_phases: TimingPhases,
    pub request: RequestEcho,
}

impl HttpResponseRecord {
    /// Looks up a response header by name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        crate::headers::get_header(&self.headers, name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

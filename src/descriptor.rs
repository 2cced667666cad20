//! Reader for plain-text request files.
//!
//! Reads the first request block of an already-resolved file:
//!
//! ```text
//! # @name create-item
//! POST https://api.example.com/items HTTP/1.1
//! Content-Type: application/json
//!
//! {"name": "widget"}
//! ```
//!
//! Lines starting with `#` or `//` before the request line are comments;
//! `# @name <name>` names the request. The request line is `METHOD URL
//! [HTTP/version]` or a bare URL (GET). Lines starting with `?` or `&` right
//! after it continue the query string. Headers follow until the first blank
//! line; everything after that up to a `###` separator is the body. No
//! variable substitution happens here.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Method;

use crate::error_handling::RequestError;
use crate::models::{RequestBody, RequestDescriptor};

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:#|//)\s*@name\s+(\S+)").expect("valid regex"));
static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+HTTP/\d(?:\.\d)?\s*$").expect("valid regex"));

const BLOCK_SEPARATOR: &str = "###";

fn is_comment(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with('#') || line.starts_with("//")
}

/// Parses the first request in `text`.
///
/// # Errors
///
/// Returns `RequestError::InvalidRequest` when no request line is found or a
/// header line has no `:`.
pub fn parse_request_text(
    text: &str,
    source_path: Option<&Path>,
) -> Result<RequestDescriptor, RequestError> {
    let mut lines = text.lines().peekable();
    let mut name = None;

    let request_line = loop {
        let Some(line) = lines.next() else {
            return Err(RequestError::InvalidRequest(
                "no request line found".to_string(),
            ));
        };
        if let Some(captures) = NAME_RE.captures(line) {
            name = Some(captures[1].to_string());
            continue;
        }
        if line.trim().is_empty() || is_comment(line) {
            continue;
        }
        break line.trim();
    };

    let request_line = VERSION_RE.replace(request_line, "");
    let (method, mut url) = match request_line.split_once(char::is_whitespace) {
        Some((method, url)) => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .map_err(|e| RequestError::InvalidRequest(format!("invalid method: {}", e)))?;
            (method, url.trim().to_string())
        }
        None => (Method::GET, request_line.to_string()),
    };

    while let Some(line) = lines.peek() {
        let trimmed = line.trim();
        if !(trimmed.starts_with('?') || trimmed.starts_with('&')) {
            break;
        }
        url.push_str(trimmed);
        lines.next();
    }

    let mut descriptor = RequestDescriptor::new(method, url);
    descriptor.name = name;
    descriptor.raw_body = Some(text.to_string());
    descriptor.source_path = source_path.map(PathBuf::from);

    for line in lines.by_ref() {
        if line.trim().is_empty() {
            break;
        }
        if is_comment(line) {
            continue;
        }
        let (header, value) = line.split_once(':').ok_or_else(|| {
            RequestError::InvalidRequest(format!("invalid header line {:?}", line))
        })?;
        descriptor = descriptor.header(header.trim(), value.trim());
    }

    let body_lines: Vec<&str> = lines
        .take_while(|line| !line.trim_start().starts_with(BLOCK_SEPARATOR))
        .collect();
    let body = body_lines.join("\n");
    let body = body.trim_end();
    if !body.is_empty() {
        descriptor = descriptor.body(RequestBody::Text(body.to_string()));
    }

    Ok(descriptor)
}

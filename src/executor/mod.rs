//! Request execution.
//!
//! [`HttpClient`] is the engine's entry point. For each request it:
//! 1. builds the transport options (auth, certificate, proxy, cookies)
//! 2. builds a client for those options and materializes the request
//! 3. runs before-send hooks, sends, runs after-response hooks
//! 4. streams the body while counting bytes, then decodes it
//! 5. restores header casing on the echoed request and the response
//!
//! Requests are never retried. A request started with [`HttpClient::start`]
//! can be cancelled through its [`RequestHandle`].

mod decode;
mod resolver;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder, Request};
use tokio_util::sync::CancellationToken;

use crate::auth::{CognitoIdpClient, CognitoSignIn};
use crate::config::{RequestSettings, MAX_REDIRECTS};
use crate::cookies::CookieStore;
use crate::error_handling::RequestError;
use crate::headers::{
    get_header, header_map_to_mapping, measure_header_bytes, normalize_header_names,
    raw_response_header_names, HeaderMapping,
};
use crate::models::{HttpResponseRecord, RequestDescriptor, RequestEcho, TimingPhases};
use crate::options::{build_options, TransportOptions};
use crate::tls::build_identity;
use crate::warnings::{LogWarningSink, WarningSink};

pub use decode::{charset_from_content_type, decode_body, decode_escaped_unicode};
pub use resolver::{DnsTiming, TimingResolver};

/// Live byte counters of an in-flight request.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    headers_bytes: AtomicU64,
    body_bytes: AtomicU64,
}

impl ProgressCounters {
    pub fn headers_bytes(&self) -> u64 {
        self.headers_bytes.load(Ordering::Relaxed)
    }

    pub fn body_bytes(&self) -> u64 {
        self.body_bytes.load(Ordering::Relaxed)
    }

    fn add_headers(&self, bytes: u64) {
        self.headers_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn add_body(&self, bytes: u64) {
        self.body_bytes.fetch_add(bytes, Ordering::Relaxed);
    }
}

/// Control over a request started with [`HttpClient::start`].
#[derive(Debug, Clone, Default)]
pub struct RequestHandle {
    cancel: CancellationToken,
    progress: Arc<ProgressCounters>,
}

impl RequestHandle {
    /// Aborts the request. The pending future resolves to
    /// [`SendOutcome::Cancelled`] unless it already finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn progress(&self) -> &ProgressCounters {
        &self.progress
    }
}

/// How a started request ended, when it did not fail.
#[derive(Debug)]
pub enum SendOutcome {
    Completed(HttpResponseRecord),
    Cancelled,
}

impl SendOutcome {
    pub fn into_record(self) -> Option<HttpResponseRecord> {
        match self {
            SendOutcome::Completed(record) => Some(record),
            SendOutcome::Cancelled => None,
        }
    }
}

/// The request engine.
///
/// Cheap to clone; clones share the cookie store, warning sink and Cognito
/// collaborator.
#[derive(Clone)]
pub struct HttpClient {
    cookies: Arc<CookieStore>,
    warnings: Arc<dyn WarningSink>,
    cognito: Arc<dyn CognitoSignIn>,
}

impl HttpClient {
    /// Engine with warnings sent to the log and the default Cognito client.
    pub fn new(cookies: Arc<CookieStore>) -> Self {
        Self {
            cookies,
            warnings: Arc::new(LogWarningSink),
            cognito: Arc::new(CognitoIdpClient::new()),
        }
    }

    pub fn with_warning_sink(mut self, warnings: Arc<dyn WarningSink>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn with_cognito(mut self, cognito: Arc<dyn CognitoSignIn>) -> Self {
        self.cognito = cognito;
        self
    }

    pub fn cookie_store(&self) -> &Arc<CookieStore> {
        &self.cookies
    }

    /// Sends a request and waits for the full response.
    ///
    /// # Errors
    ///
    /// Returns `RequestError` if authentication, request construction or
    /// the transport fails. Policy problems are warnings, not errors.
    pub async fn send(
        &self,
        descriptor: &RequestDescriptor,
        settings: &RequestSettings,
    ) -> Result<HttpResponseRecord, RequestError> {
        self.execute(descriptor, settings, &ProgressCounters::default())
            .await
    }

    /// Starts a request and returns a handle to observe or cancel it,
    /// together with the future driving it.
    pub fn start(
        &self,
        descriptor: RequestDescriptor,
        settings: RequestSettings,
    ) -> (
        RequestHandle,
        BoxFuture<'static, Result<SendOutcome, RequestError>>,
    ) {
        let handle = RequestHandle::default();
        let token = handle.cancel.clone();
        let progress = Arc::clone(&handle.progress);
        let engine = self.clone();

        let future = async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    log::info!("Cancelled {} {}", descriptor.method, descriptor.url);
                    Ok(SendOutcome::Cancelled)
                }
                result = engine.execute(&descriptor, &settings, &progress) => {
                    result.map(SendOutcome::Completed)
                }
            }
        }
        .boxed();

        (handle, future)
    }

    /// Deletes the cookie file and starts over with an empty jar.
    pub async fn clear_cookies(&self) -> Result<(), RequestError> {
        self.cookies.clear().await?;
        Ok(())
    }

    async fn execute(
        &self,
        descriptor: &RequestDescriptor,
        settings: &RequestSettings,
        progress: &ProgressCounters,
    ) -> Result<HttpResponseRecord, RequestError> {
        let options = build_options(
            descriptor,
            settings,
            &self.cookies,
            self.cognito.as_ref(),
            self.warnings.as_ref(),
        )
        .await?;

        let dns = DnsTiming::default();
        let client = build_client(&options, dns.clone(), self.warnings.as_ref())?;
        let mut request = build_request(&client, &options)?;
        for hook in &options.before_send {
            hook.before_send(&mut request)?;
        }

        let echo = RequestEcho {
            method: request.method().clone(),
            url: request.url().to_string(),
            headers: echo_headers(&options.headers, request.headers()),
            body: options.body.clone(),
            raw_body: descriptor.raw_body.clone(),
            name: descriptor.name.clone(),
        };
        let replay = if options.after_response.is_empty() {
            None
        } else {
            request.try_clone()
        };

        log::info!("{} {}", echo.method, echo.url);
        let started = Instant::now();
        let mut response = client.execute(request).await?;
        match &replay {
            Some(sent) => {
                for hook in &options.after_response {
                    response = hook.after_response(&client, sent, response).await?;
                }
            }
            None if !options.after_response.is_empty() => {
                log::debug!("Request body cannot be replayed; skipping after-response hooks");
            }
            None => {}
        }
        let first_byte = started.elapsed();

        let headers_size = measure_header_bytes(response.headers());
        progress.add_headers(headers_size);
        let status = response.status();
        let http_version = format!("{:?}", response.version());
        let headers = normalize_header_names(
            &header_map_to_mapping(response.headers()),
            &raw_response_header_names(response.headers()),
        );

        let mut body_bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            progress.add_body(chunk.len() as u64);
            body_bytes.extend_from_slice(&chunk);
        }
        let total = started.elapsed();

        let mut body = decode_body(&body_bytes, get_header(&headers, "content-type"));
        if settings.decode_escaped_unicode_characters {
            body = decode_escaped_unicode(&body);
        }

        log::info!(
            "{} {} -> {} ({} bytes in {:?})",
            echo.method,
            echo.url,
            status.as_u16(),
            body_bytes.len(),
            total
        );

        Ok(HttpResponseRecord {
            status_code: status.as_u16(),
            status_message: status.canonical_reason().unwrap_or_default().to_string(),
            http_version,
            headers,
            body,
            body_size_in_bytes: body_bytes.len() as u64,
            body_bytes,
            headers_size_in_bytes: headers_size,
            timing_phases: TimingPhases {
                dns: dns.elapsed(),
                tcp: None,
                tls: None,
                first_byte,
                download: total.saturating_sub(first_byte),
                total,
            },
            request: echo,
        })
    }
}

/// Builds the client for one request's options.
fn build_client(
    options: &TransportOptions,
    dns: DnsTiming,
    warnings: &dyn WarningSink,
) -> Result<Client, RequestError> {
    let redirect = if options.follow_redirect {
        Policy::limited(MAX_REDIRECTS)
    } else {
        Policy::none()
    };

    let mut builder = ClientBuilder::new()
        .redirect(redirect)
        .danger_accept_invalid_certs(options.tls.accept_invalid_certs)
        .dns_resolver(Arc::new(TimingResolver::new(dns)));

    if !options.decompress {
        builder = builder.no_gzip().no_brotli().no_deflate();
    }
    if let Some(timeout) = options.timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(jar) = &options.cookie_jar {
        builder = builder.cookie_provider(Arc::clone(jar));
    }
    builder = match &options.proxy {
        Some(proxy) => builder.proxy(proxy.to_reqwest()?),
        None => builder.no_proxy(),
    };
    if let Some(identity) = options
        .tls
        .material
        .as_ref()
        .and_then(|material| build_identity(material, warnings))
    {
        builder = builder.identity(identity);
    }

    Ok(builder.build()?)
}

/// Materializes the outgoing request.
fn build_request(client: &Client, options: &TransportOptions) -> Result<Request, RequestError> {
    let mut headers = HeaderMap::with_capacity(options.headers.len());
    for (raw_name, raw_value) in &options.headers {
        let name = HeaderName::from_bytes(raw_name.as_bytes()).map_err(|e| {
            RequestError::InvalidRequest(format!("invalid header name {:?}: {}", raw_name, e))
        })?;
        let value = HeaderValue::from_str(raw_value).map_err(|e| {
            RequestError::InvalidRequest(format!("invalid value for header {}: {}", raw_name, e))
        })?;
        headers.insert(name, value);
    }

    let mut builder = client
        .request(options.method.clone(), options.url.clone())
        .headers(headers);
    if let Some(body) = &options.body {
        builder = builder.body(body.as_bytes().to_vec());
    }
    if let Some(credentials) = &options.basic_auth {
        builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
    }

    Ok(builder.build()?)
}

/// Headers of the request as sent, named the way the descriptor wrote them.
/// Headers added by the engine (auth, signing) get canonical casing.
fn echo_headers(descriptor_headers: &HeaderMapping, sent: &HeaderMap) -> HeaderMapping {
    let raw_names: Vec<String> = descriptor_headers
        .keys()
        .cloned()
        .chain(raw_response_header_names(sent))
        .collect();
    normalize_header_names(&header_map_to_mapping(sent), &raw_names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestBody;
    use reqwest::Method;

    #[test]
    fn test_progress_counters_accumulate() {
        let counters = ProgressCounters::default();
        counters.add_body(10);
        counters.add_body(5);
        counters.add_headers(42);

        assert_eq!(counters.body_bytes(), 15);
        assert_eq!(counters.headers_bytes(), 42);
    }

    #[test]
    fn test_handle_cancel() {
        let handle = RequestHandle::default();
        let observer = handle.clone();
        assert!(!observer.is_cancelled());

        handle.cancel();

        assert!(observer.is_cancelled());
    }

    #[test]
    fn test_cancelled_outcome_has_no_record() {
        assert!(SendOutcome::Cancelled.into_record().is_none());
    }

    #[test]
    fn test_build_request_with_basic_auth_and_body() {
        let descriptor = RequestDescriptor::new(Method::PUT, "http://example.com/items/1")
            .header("X-Request-Id", "abc")
            .body(RequestBody::Text("payload".to_string()));
        let mut options = TransportOptions::from_descriptor(&descriptor).unwrap();
        options.basic_auth = Some(crate::auth::BasicCredentials {
            username: "alice".to_string(),
            password: "secret".to_string(),
        });

        let request = build_request(&Client::new(), &options).unwrap();

        assert_eq!(request.method(), &Method::PUT);
        assert_eq!(request.headers()["x-request-id"], "abc");
        assert_eq!(
            request.headers()["authorization"],
            "Basic YWxpY2U6c2VjcmV0"
        );
        assert_eq!(
            request.body().and_then(|b| b.as_bytes()),
            Some(&b"payload"[..])
        );
    }

    #[test]
    fn test_build_request_rejects_bad_header_value() {
        let descriptor = RequestDescriptor::new(Method::GET, "http://example.com/")
            .header("X-Bad", "line\nbreak");
        let options = TransportOptions::from_descriptor(&descriptor).unwrap();

        let result = build_request(&Client::new(), &options);

        assert!(matches!(result, Err(RequestError::InvalidRequest(_))));
    }

    #[test]
    fn test_echo_headers_keep_descriptor_casing() {
        let mut descriptor_headers = HeaderMapping::new();
        descriptor_headers.insert("x-API-key".to_string(), "k".to_string());
        let mut sent = HeaderMap::new();
        sent.insert("x-api-key", HeaderValue::from_static("k"));
        sent.insert("authorization", HeaderValue::from_static("Bearer t"));

        let echoed = echo_headers(&descriptor_headers, &sent);

        assert_eq!(echoed.get("x-API-key").map(String::as_str), Some("k"));
        assert_eq!(
            echoed.get("Authorization").map(String::as_str),
            Some("Bearer t")
        );
    }

    #[test]
    fn test_build_client_without_proxy_or_identity() {
        let descriptor = RequestDescriptor::new(Method::GET, "https://example.com/");
        let mut options = TransportOptions::from_descriptor(&descriptor).unwrap();
        options.follow_redirect = false;
        options.timeout = Some(std::time::Duration::from_millis(250));

        let sink = crate::warnings::CollectingWarningSink::new();
        assert!(build_client(&options, DnsTiming::default(), &sink).is_ok());
        assert!(sink.messages().is_empty());
    }
}

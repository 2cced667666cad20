//! Transport options construction.
//!
//! Turns a [`RequestDescriptor`] plus the effective [`RequestSettings`] into
//! [`TransportOptions`]: everything the executor needs to build the client
//! and the request, with authentication, client certificates, proxy and
//! cookie jar already decided.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use url::Url;

use crate::auth::{self, BasicCredentials, CognitoSignIn};
use crate::config::{RequestSettings, RETRY_LIMIT};
use crate::cookies::{CookieStore, PersistentCookieJar};
use crate::error_handling::RequestError;
use crate::headers::HeaderMapping;
use crate::hooks::{AfterResponseHooks, BeforeSendHooks};
use crate::models::{RequestBody, RequestDescriptor};
use crate::proxy::{select_proxy, ProxyAgent};
use crate::tls::{request_certificate, CertificateContext, CertificateMaterial};
use crate::warnings::WarningSink;

/// TLS settings for one request.
#[derive(Debug, Clone)]
pub struct TlsOptions {
    /// Client certificate material configured for the target host
    pub material: Option<CertificateMaterial>,
    /// Server certificates are not verified
    pub accept_invalid_certs: bool,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            material: None,
            accept_invalid_certs: true,
        }
    }
}

/// Everything the executor needs to send one request.
pub struct TransportOptions {
    pub method: Method,
    pub url: Url,
    /// Copy of the descriptor's headers; authentication may remove entries
    pub headers: HeaderMapping,
    pub body: Option<RequestBody>,
    pub decompress: bool,
    pub follow_redirect: bool,
    /// Bounds the request from send until the body is fully read
    pub timeout: Option<Duration>,
    pub retry_limit: u32,
    pub tls: TlsOptions,
    pub proxy: Option<ProxyAgent>,
    pub cookie_jar: Option<Arc<PersistentCookieJar>>,
    pub basic_auth: Option<BasicCredentials>,
    pub before_send: BeforeSendHooks,
    pub after_response: AfterResponseHooks,
}

impl std::fmt::Debug for TransportOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportOptions")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("follow_redirect", &self.follow_redirect)
            .field("timeout", &self.timeout)
            .field("proxy", &self.proxy)
            .field("cookies", &self.cookie_jar.is_some())
            .field("basic_auth", &self.basic_auth.as_ref().map(|c| &c.username))
            .field("before_send", &self.before_send.len())
            .field("after_response", &self.after_response.len())
            .finish()
    }
}

impl TransportOptions {
    /// Options carrying only the descriptor itself: no timeout, redirects
    /// followed, no proxy, no cookies, no hooks.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::InvalidRequest` if the URL does not parse.
    pub fn from_descriptor(descriptor: &RequestDescriptor) -> Result<Self, RequestError> {
        let url = Url::parse(&descriptor.url).map_err(|e| {
            RequestError::InvalidRequest(format!("invalid URL {:?}: {}", descriptor.url, e))
        })?;

        Ok(Self {
            method: descriptor.method.clone(),
            url,
            headers: descriptor.headers.clone(),
            body: descriptor.body.clone(),
            decompress: true,
            follow_redirect: true,
            timeout: None,
            retry_limit: RETRY_LIMIT,
            tls: TlsOptions::default(),
            proxy: None,
            cookie_jar: None,
            basic_auth: None,
            before_send: Vec::new(),
            after_response: Vec::new(),
        })
    }
}

/// Builds the transport options for a request.
///
/// Authentication runs first (a failed Cognito sign-in aborts here, before
/// anything is sent), then the host certificate and proxy are looked up.
pub async fn build_options(
    descriptor: &RequestDescriptor,
    settings: &RequestSettings,
    cookie_store: &CookieStore,
    cognito: &dyn CognitoSignIn,
    warnings: &dyn WarningSink,
) -> Result<TransportOptions, RequestError> {
    let mut options = TransportOptions::from_descriptor(descriptor)?;
    options.follow_redirect = settings.follow_redirect;
    options.timeout = settings.timeout();

    if settings.remember_cookies_for_subsequent_requests {
        options.cookie_jar = Some(cookie_store.jar().await);
    }

    auth::dispatch(&mut options, cognito, warnings).await?;

    let context = CertificateContext {
        workspace_root: settings.workspace_root.as_deref(),
        source_path: descriptor.source_path.as_deref(),
    };
    options.tls.material = request_certificate(&options.url, &settings.certificates, context, warnings)
        .filter(|material| !material.is_empty());

    options.proxy = select_proxy(&options.url, &descriptor.url, settings);

    log::debug!("Transport options: {:?}", options);
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CognitoCredentials, CognitoTokens};
    use crate::headers::get_header;
    use crate::warnings::CollectingWarningSink;
    use async_trait::async_trait;

    struct NoSignIn;

    #[async_trait]
    impl CognitoSignIn for NoSignIn {
        async fn sign_in(
            &self,
            _credentials: &CognitoCredentials,
        ) -> Result<CognitoTokens, RequestError> {
            Err(RequestError::Authentication("unexpected sign-in".to_string()))
        }
    }

    fn store(dir: &tempfile::TempDir) -> CookieStore {
        CookieStore::new(dir.path().join("cookie.json")).unwrap()
    }

    #[tokio::test]
    async fn test_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = RequestDescriptor::new(Method::POST, "http://example.com/items")
            .header("Content-Type", "application/json")
            .body(RequestBody::Text("{}".to_string()));

        let options = build_options(
            &descriptor,
            &RequestSettings::default(),
            &store(&dir),
            &NoSignIn,
            &CollectingWarningSink::new(),
        )
        .await
        .unwrap();

        assert_eq!(options.method, Method::POST);
        assert!(options.decompress);
        assert!(options.follow_redirect);
        assert_eq!(options.timeout, None);
        assert_eq!(options.retry_limit, 0);
        assert!(options.tls.accept_invalid_certs);
        assert!(options.tls.material.is_none());
        assert!(options.proxy.is_none());
        assert!(options.cookie_jar.is_some());
        assert_eq!(
            get_header(&options.headers, "content-type"),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn test_settings_applied() {
        let dir = tempfile::tempdir().unwrap();
        let settings = RequestSettings {
            timeout_in_milliseconds: 1500,
            follow_redirect: false,
            remember_cookies_for_subsequent_requests: false,
            proxy: Some("http://proxy.local:3128".to_string()),
            ..Default::default()
        };
        let descriptor = RequestDescriptor::new(Method::GET, "https://api.example.com/");

        let options = build_options(
            &descriptor,
            &settings,
            &store(&dir),
            &NoSignIn,
            &CollectingWarningSink::new(),
        )
        .await
        .unwrap();

        assert_eq!(options.timeout, Some(Duration::from_millis(1500)));
        assert!(!options.follow_redirect);
        assert!(options.cookie_jar.is_none());
        assert_eq!(
            options.proxy,
            Some(ProxyAgent::Https("http://proxy.local:3128".to_string()))
        );
    }

    #[tokio::test]
    async fn test_written_default_port_excluded_from_proxy() {
        let dir = tempfile::tempdir().unwrap();
        let settings = RequestSettings {
            proxy: Some("http://proxy.local:3128".to_string()),
            exclude_hosts_for_proxy: vec!["localhost:80".to_string()],
            ..Default::default()
        };
        let descriptor = RequestDescriptor::new(Method::GET, "http://localhost:80/health");

        let options = build_options(
            &descriptor,
            &settings,
            &store(&dir),
            &NoSignIn,
            &CollectingWarningSink::new(),
        )
        .await
        .unwrap();

        assert_eq!(options.url.as_str(), "http://localhost/health");
        assert!(options.proxy.is_none());
    }

    #[tokio::test]
    async fn test_descriptor_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = RequestDescriptor::new(Method::GET, "http://example.com/")
            .header("Authorization", "Basic alice secret");

        let options = build_options(
            &descriptor,
            &RequestSettings::default(),
            &store(&dir),
            &NoSignIn,
            &CollectingWarningSink::new(),
        )
        .await
        .unwrap();

        assert!(get_header(&options.headers, "Authorization").is_none());
        assert_eq!(
            get_header(&descriptor.headers, "Authorization"),
            Some("Basic alice secret")
        );
    }

    #[tokio::test]
    async fn test_certificate_loaded_for_host() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("client.pfx"), b"pfx-bytes").unwrap();
        let mut settings = RequestSettings {
            workspace_root: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        settings.certificates.insert(
            "secure.example.com".to_string(),
            crate::config::CertificateSpec {
                pfx: Some("client.pfx".to_string()),
                passphrase: Some("pw".to_string()),
                ..Default::default()
            },
        );
        let descriptor = RequestDescriptor::new(Method::GET, "https://secure.example.com/");

        let options = build_options(
            &descriptor,
            &settings,
            &store(&dir),
            &NoSignIn,
            &CollectingWarningSink::new(),
        )
        .await
        .unwrap();

        let material = options.tls.material.unwrap();
        assert_eq!(material.pfx.as_deref(), Some(&b"pfx-bytes"[..]));
        assert_eq!(material.passphrase.as_deref(), Some("pw"));
    }

    #[test]
    fn test_invalid_url() {
        let descriptor = RequestDescriptor::new(Method::GET, "not a url");
        assert!(matches!(
            TransportOptions::from_descriptor(&descriptor),
            Err(RequestError::InvalidRequest(_))
        ));
    }
}

//! Configuration types.
//!
//! This module defines the request settings handed to the engine, the
//! command-line options of the `rest_engine` binary and the enums used for
//! logging options.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::config::constants::DEFAULT_TIMEOUT_MS;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// TLS client certificate material configured for one host.
///
/// Paths may be absolute, relative to the workspace root, or relative to the
/// directory of the file that declared the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSpec {
    /// PEM certificate path
    #[serde(default)]
    pub cert: Option<String>,
    /// PEM (PKCS#8) private key path
    #[serde(default)]
    pub key: Option<String>,
    /// PKCS#12 archive path
    #[serde(default)]
    pub pfx: Option<String>,
    /// Passphrase for the PKCS#12 archive, passed through uninterpreted
    #[serde(default)]
    pub passphrase: Option<String>,
}

/// Effective settings for one request, already merged with defaults.
///
/// Field names follow the settings file keys (camelCase) so an existing
/// settings JSON can be loaded with [`RequestSettings::from_file`].
///
/// # Examples
///
/// ```
/// use rest_engine::RequestSettings;
///
/// let settings = RequestSettings {
///     timeout_in_milliseconds: 5_000,
///     follow_redirect: false,
///     ..Default::default()
/// };
/// assert!(settings.timeout().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestSettings {
    /// Whole-request timeout in milliseconds, 0 = unbounded
    #[serde(alias = "timeoutinmilliseconds")]
    pub timeout_in_milliseconds: u64,

    /// Follow 3xx redirects
    #[serde(alias = "followredirect")]
    pub follow_redirect: bool,

    /// Unescape `\uXXXX` sequences in decoded response bodies
    pub decode_escaped_unicode_characters: bool,

    /// Attach the persistent cookie jar to requests
    pub remember_cookies_for_subsequent_requests: bool,

    /// Proxy URL applied to non-excluded hosts
    pub proxy: Option<String>,

    /// Hosts (`host` or `host:port`) that bypass the proxy
    pub exclude_hosts_for_proxy: Vec<String>,

    /// Per-host client certificates, keyed by `host` or `host:port`
    #[serde(alias = "hostCertificates")]
    pub certificates: HashMap<String, CertificateSpec>,

    /// Workspace root used to resolve relative certificate paths
    pub workspace_root: Option<PathBuf>,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            timeout_in_milliseconds: DEFAULT_TIMEOUT_MS,
            follow_redirect: true,
            decode_escaped_unicode_characters: false,
            remember_cookies_for_subsequent_requests: true,
            proxy: None,
            exclude_hosts_for_proxy: Vec::new(),
            certificates: HashMap::new(),
            workspace_root: None,
        }
    }
}

impl RequestSettings {
    /// Loads settings from a JSON file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))
    }

    /// The request timeout, or `None` when unbounded.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_in_milliseconds > 0)
            .then(|| Duration::from_millis(self.timeout_in_milliseconds))
    }
}

/// Command-line options for the `rest_engine` binary.
///
/// Settings come from `--settings` (JSON) when given, otherwise from the
/// defaults; the remaining flags override individual values.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "rest_engine",
    version,
    about = "Send an HTTP request described in a plain-text file"
)]
pub struct Cli {
    /// Request file (one request; `###` ends it)
    pub file: PathBuf,

    /// JSON settings file
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Workspace root for relative certificate paths
    #[arg(long)]
    pub workspace_root: Option<PathBuf>,

    /// Cookie jar file (defaults to ~/.rest-engine/cookie.json)
    #[arg(long)]
    pub cookie_file: Option<PathBuf>,

    /// Delete saved cookies before sending
    #[arg(long)]
    pub clear_cookies: bool,

    /// Request timeout in milliseconds (0 = unbounded)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Do not follow redirects
    #[arg(long)]
    pub no_follow_redirect: bool,

    /// Unescape `\uXXXX` sequences in the response body
    #[arg(long)]
    pub decode_unicode: bool,

    /// Proxy URL
    #[arg(long)]
    pub proxy: Option<String>,

    /// Print request and response headers
    #[arg(short, long)]
    pub verbose: bool,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Log format: plain or json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Effective request settings: settings file (or defaults) with the
    /// command-line overrides applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file cannot be read or parsed.
    pub fn request_settings(&self) -> Result<RequestSettings> {
        let mut settings = match &self.settings {
            Some(path) => RequestSettings::from_file(path)?,
            None => RequestSettings::default(),
        };
        if let Some(timeout) = self.timeout_ms {
            settings.timeout_in_milliseconds = timeout;
        }
        if self.no_follow_redirect {
            settings.follow_redirect = false;
        }
        if self.decode_unicode {
            settings.decode_escaped_unicode_characters = true;
        }
        if let Some(proxy) = &self.proxy {
            settings.proxy = Some(proxy.clone());
        }
        if let Some(root) = &self.workspace_root {
            settings.workspace_root = Some(root.clone());
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(
            log::LevelFilter::from(LogLevel::Error),
            log::LevelFilter::Error
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Warn),
            log::LevelFilter::Warn
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Info),
            log::LevelFilter::Info
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Debug),
            log::LevelFilter::Debug
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Trace),
            log::LevelFilter::Trace
        );
    }

    #[test]
    fn test_log_format_debug() {
        assert_eq!(format!("{:?}", LogFormat::Plain), "Plain");
        assert_eq!(format!("{:?}", LogFormat::Json), "Json");
    }

    #[test]
    fn test_settings_default() {
        let settings = RequestSettings::default();
        assert_eq!(settings.timeout_in_milliseconds, 0);
        assert!(settings.follow_redirect);
        assert!(settings.remember_cookies_for_subsequent_requests);
        assert!(!settings.decode_escaped_unicode_characters);
        assert!(settings.proxy.is_none());
        assert!(settings.exclude_hosts_for_proxy.is_empty());
        assert!(settings.certificates.is_empty());
    }

    #[test]
    fn test_timeout_only_applied_when_positive() {
        let mut settings = RequestSettings::default();
        assert_eq!(settings.timeout(), None);

        settings.timeout_in_milliseconds = 1500;
        assert_eq!(settings.timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_settings_deserialize_partial_json() {
        let json = r#"{
            "timeoutinmilliseconds": 2500,
            "followRedirect": false,
            "excludeHostsForProxy": ["localhost", "internal:8080"],
            "certificates": {
                "localhost:8081": { "cert": "certs/client.crt", "key": "certs/client.key" },
                "example.com": { "pfx": "/abs/client.p12", "passphrase": "secret" }
            }
        }"#;
        let settings: RequestSettings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.timeout_in_milliseconds, 2500);
        assert!(!settings.follow_redirect);
        // Unspecified keys keep their defaults
        assert!(settings.remember_cookies_for_subsequent_requests);
        assert_eq!(settings.exclude_hosts_for_proxy.len(), 2);

        let local = &settings.certificates["localhost:8081"];
        assert_eq!(local.cert.as_deref(), Some("certs/client.crt"));
        assert_eq!(local.pfx, None);
        let remote = &settings.certificates["example.com"];
        assert_eq!(remote.passphrase.as_deref(), Some("secret"));
    }

    #[test]
    fn test_settings_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"proxy": "http://127.0.0.1:3128"}"#).unwrap();

        let settings = RequestSettings::from_file(&path).unwrap();
        assert_eq!(settings.proxy.as_deref(), Some("http://127.0.0.1:3128"));
    }

    #[test]
    fn test_settings_from_missing_file_is_error() {
        let result = RequestSettings::from_file(Path::new("/nonexistent/settings.json"));
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("Failed to read settings file"));
    }
}

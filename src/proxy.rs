//! Proxy policy: which requests go through the configured proxy.

use std::collections::HashSet;

use url::Url;

use crate::config::RequestSettings;

/// Proxy to install on a request, chosen by the target URL's scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyAgent {
    /// Plain HTTP proxying for `http:` targets
    Http(String),
    /// Tunnelled proxying for TLS targets
    Https(String),
}

impl ProxyAgent {
    pub fn proxy_url(&self) -> &str {
        match self {
            ProxyAgent::Http(url) | ProxyAgent::Https(url) => url,
        }
    }

    /// Converts to the transport's proxy, scoped to the matching target scheme.
    pub fn to_reqwest(&self) -> reqwest::Result<reqwest::Proxy> {
        match self {
            ProxyAgent::Http(url) => reqwest::Proxy::http(url.as_str()),
            ProxyAgent::Https(url) => reqwest::Proxy::https(url.as_str()),
        }
    }
}

/// Port named in the URL text.
///
/// `Url` normalizes a scheme-default port away, so `http://h:80/` parses with
/// no port. The raw text the URL was parsed from tells the two apart.
pub fn explicit_port(url: &Url, raw_url: &str) -> Option<u16> {
    url.port().or_else(|| {
        if authority_has_port(raw_url) {
            url.port_or_known_default()
        } else {
            None
        }
    })
}

fn authority_has_port(raw_url: &str) -> bool {
    let raw_url = raw_url.trim();
    let rest = raw_url
        .split_once("://")
        .map_or(raw_url, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host_port)| host_port);
    let port = match host_port.rfind(']') {
        Some(end) => host_port[end + 1..].strip_prefix(':'),
        None => host_port.rsplit_once(':').map(|(_, port)| port),
    };
    port.is_some_and(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}

/// Returns `true` when the exclusion list says this URL must not be proxied.
///
/// `raw_url` is the text `url` was parsed from. Entries are `host` or
/// `host:port`, compared case-insensitively:
/// - a URL without an explicit port is excluded only by a bare `host` entry;
/// - a URL with a port is excluded by a bare `host` entry or by `host:port`
///   with the same port. A default port written out (`http://h:80/`) counts.
pub fn should_bypass_proxy(url: &Url, raw_url: &str, exclude_hosts: &[String]) -> bool {
    if exclude_hosts.is_empty() {
        return false;
    }

    let host = match url.host_str() {
        Some(host) => host.to_ascii_lowercase(),
        None => return false,
    };
    let port = explicit_port(url, raw_url).map(|p| p.to_string());

    let mut seen = HashSet::new();
    let entries = exclude_hosts
        .iter()
        .map(|entry| entry.to_ascii_lowercase())
        .filter(|entry| seen.insert(entry.clone()));

    for entry in entries {
        let mut parts = entry.split(':');
        let entry_host = parts.next().unwrap_or_default();
        let entry_port = parts.next();

        match &port {
            None => {
                if entry_port.is_none() && entry_host == host {
                    return true;
                }
            }
            Some(port) => {
                if entry_host == host && entry_port.map_or(true, |p| p == port) {
                    return true;
                }
            }
        }
    }

    false
}

/// Picks the proxy for a request, or `None` when unproxied or excluded.
pub fn select_proxy(url: &Url, raw_url: &str, settings: &RequestSettings) -> Option<ProxyAgent> {
    let proxy = settings.proxy.as_deref().filter(|p| !p.trim().is_empty())?;

    if should_bypass_proxy(url, raw_url, &settings.exclude_hosts_for_proxy) {
        log::debug!("Proxy bypassed for {}", url);
        return None;
    }

    let agent = if url.scheme() == "http" {
        ProxyAgent::Http(proxy.to_string())
    } else {
        ProxyAgent::Https(proxy.to_string())
    };
    log::debug!("Using proxy {} for {}", agent.proxy_url(), url);
    Some(agent)
}

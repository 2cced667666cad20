//! HTTP Digest authentication (RFC 7616, RFC 2617 compatible).
//!
//! Installed as an after-response hook: when the server answers `401` with a
//! `Digest` challenge, the request is re-sent exactly once with the computed
//! `Authorization` header.

use std::collections::HashMap;

use async_trait::async_trait;
use md5::Md5;
use reqwest::header::{HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Client, Request, Response, StatusCode};
use sha2::{Digest as _, Sha256};

use crate::error_handling::RequestError;
use crate::hooks::AfterResponseHook;

/// Parsed `WWW-Authenticate: Digest ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub algorithm: String,
    pub qop: Option<String>,
}

impl DigestChallenge {
    /// Parses a challenge header value; `None` unless it is a Digest challenge
    /// carrying a nonce.
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return None;
        }
        let params = parse_params(params);
        Some(Self {
            realm: params.get("realm").cloned().unwrap_or_default(),
            nonce: params.get("nonce").cloned()?,
            opaque: params.get("opaque").cloned(),
            algorithm: params
                .get("algorithm")
                .cloned()
                .unwrap_or_else(|| "MD5".to_string()),
            qop: params.get("qop").cloned(),
        })
    }

    /// `auth` when the server offers it, otherwise no qop (RFC 2069 style).
    fn selected_qop(&self) -> Option<&'static str> {
        self.qop.as_deref().and_then(|qop| {
            qop.split(',')
                .map(str::trim)
                .any(|q| q.eq_ignore_ascii_case("auth"))
                .then_some("auth")
        })
    }
}

/// Splits `key=value, key="quoted, value"` pairs. Keys are lower-cased.
fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }
        let key: String = chars
            .by_ref()
            .take_while(|c| *c != '=')
            .collect::<String>()
            .trim()
            .to_ascii_lowercase();
        if key.is_empty() {
            break;
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => break,
                    _ => value.push(c),
                }
            }
        } else {
            while let Some(c) = chars.peek() {
                if *c == ',' {
                    break;
                }
                value.push(*c);
                chars.next();
            }
            value = value.trim().to_string();
        }
        params.insert(key, value);
    }

    params
}

fn hash_hex(algorithm: &str, data: &str) -> String {
    if algorithm.to_ascii_uppercase().starts_with("SHA-256") {
        hex::encode(Sha256::digest(data.as_bytes()))
    } else {
        hex::encode(Md5::digest(data.as_bytes()))
    }
}

/// Computes the `Authorization` header value answering a challenge.
///
/// `uri` is the request target (path and query). The nonce count is always
/// `00000001`: each challenge is answered once.
pub fn digest_authorization(
    challenge: &DigestChallenge,
    username: &str,
    password: &str,
    method: &str,
    uri: &str,
    cnonce: &str,
) -> String {
    let algorithm = challenge.algorithm.as_str();
    let nc = "00000001";

    let mut ha1 = hash_hex(
        algorithm,
        &format!("{}:{}:{}", username, challenge.realm, password),
    );
    if algorithm.to_ascii_lowercase().ends_with("-sess") {
        ha1 = hash_hex(
            algorithm,
            &format!("{}:{}:{}", ha1, challenge.nonce, cnonce),
        );
    }
    let ha2 = hash_hex(algorithm, &format!("{}:{}", method, uri));

    let qop = challenge.selected_qop();
    let response = match qop {
        Some(qop) => hash_hex(
            algorithm,
            &format!("{}:{}:{}:{}:{}:{}", ha1, challenge.nonce, nc, cnonce, qop, ha2),
        ),
        None => hash_hex(algorithm, &format!("{}:{}:{}", ha1, challenge.nonce, ha2)),
    };

    let mut header = format!(
        "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", algorithm={}, response=\"{}\"",
        username, challenge.realm, challenge.nonce, uri, algorithm, response
    );
    if let Some(qop) = qop {
        header.push_str(&format!(", qop={}, nc={}, cnonce=\"{}\"", qop, nc, cnonce));
    }
    if let Some(opaque) = &challenge.opaque {
        header.push_str(&format!(", opaque=\"{}\"", opaque));
    }
    header
}

/// After-response hook answering a Digest challenge once.
#[derive(Debug, Clone)]
pub struct DigestAuthHook {
    username: String,
    password: String,
}

impl DigestAuthHook {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl AfterResponseHook for DigestAuthHook {
    async fn after_response(
        &self,
        client: &Client,
        request: &Request,
        response: Response,
    ) -> Result<Response, RequestError> {
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = response
            .headers()
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(DigestChallenge::parse);
        let Some(challenge) = challenge else {
            log::debug!("401 without a Digest challenge; returning it as is");
            return Ok(response);
        };
        let Some(mut retry) = request.try_clone() else {
            log::warn!("Digest retry skipped: request body cannot be replayed");
            return Ok(response);
        };

        let url = retry.url();
        let uri = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        let cnonce = hex::encode(rand::random::<[u8; 8]>());
        let authorization = digest_authorization(
            &challenge,
            &self.username,
            &self.password,
            retry.method().as_str(),
            &uri,
            &cnonce,
        );
        let value = HeaderValue::from_str(&authorization)
            .map_err(|e| RequestError::InvalidRequest(format!("digest header: {}", e)))?;
        retry.headers_mut().insert(AUTHORIZATION, value);

        log::debug!("Answering Digest challenge for realm {:?}", challenge.realm);
        Ok(client.execute(retry).await?)
    }
}

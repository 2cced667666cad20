//! AWS Signature Version 4 request signing.
//!
//! `Authorization: AWS <accessKeyId> <secretAccessKey> [token:<t>] [region:<r>] [service:<s>]`
//! is turned into a before-send hook that signs the outgoing request. Tagged
//! tokens may appear anywhere in the header value.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use percent_encoding::{percent_decode_str, percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION, HOST};
use reqwest::Request;
use sha2::{Digest, Sha256};

use crate::config::{AWS_DEFAULT_REGION, AWS_SIGNING_ALGORITHM};
use crate::error_handling::RequestError;
use crate::hooks::BeforeSendHook;

type HmacSha256 = Hmac<Sha256>;

/// Everything but RFC 3986 unreserved characters is encoded.
const AWS_URI: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

static REGION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"region:(\S*)").expect("valid regex"));
static SERVICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"service:(\S*)").expect("valid regex"));
static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"token:(\S*)").expect("valid regex"));

const TAG_PREFIXES: [&str; 3] = ["region:", "service:", "token:"];

/// Headers never included in the signature.
const UNSIGNED_HEADERS: [&str; 6] = [
    "authorization",
    "connection",
    "expect",
    "range",
    "user-agent",
    "x-amzn-trace-id",
];

/// Credentials and scope extracted from an `AWS` authorization header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub region: Option<String>,
    pub service: Option<String>,
}

impl AwsCredentials {
    /// Parses the full header value (scheme included).
    ///
    /// Tagged tokens are found by pattern; the first two untagged arguments
    /// are the access key id and the secret key. Returns `None` when either
    /// key is missing.
    pub fn parse(authorization: &str) -> Option<Self> {
        let capture = |re: &Regex| {
            re.captures(authorization)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        };

        let mut keys = authorization
            .split_whitespace()
            .skip(1)
            .filter(|token| !TAG_PREFIXES.iter().any(|p| token.starts_with(p)));

        Some(Self {
            access_key_id: keys.next()?.to_string(),
            secret_access_key: keys.next()?.to_string(),
            session_token: capture(&TOKEN_RE),
            region: capture(&REGION_RE),
            service: capture(&SERVICE_RE),
        })
    }
}

/// Before-send hook signing each request with SigV4.
#[derive(Debug, Clone)]
pub struct AwsSignatureHook {
    credentials: AwsCredentials,
}

impl AwsSignatureHook {
    pub fn new(credentials: AwsCredentials) -> Self {
        Self { credentials }
    }
}

impl BeforeSendHook for AwsSignatureHook {
    fn before_send(&self, request: &mut Request) -> Result<(), RequestError> {
        sign_request(request, &self.credentials, Utc::now())
    }
}

/// Region and service for a host, e.g. `dynamodb.eu-west-1.amazonaws.com`.
///
/// Falls back to the default region and the first host label.
pub fn infer_scope(host: &str) -> (String, String) {
    let labels: Vec<&str> = host.split('.').collect();
    let first = labels.first().copied().unwrap_or_default().to_string();

    match labels.iter().position(|l| *l == "amazonaws") {
        Some(idx) if idx >= 2 => (labels[idx - 1].to_string(), labels[idx - 2].to_string()),
        _ => (AWS_DEFAULT_REGION.to_string(), first),
    }
}

/// Signs `request` in place as of `now`.
///
/// Sets `Host`, `X-Amz-Date`, `X-Amz-Security-Token` (with a session token),
/// `X-Amz-Content-Sha256` (S3 only) and `Authorization`.
pub fn sign_request(
    request: &mut Request,
    credentials: &AwsCredentials,
    now: DateTime<Utc>,
) -> Result<(), RequestError> {
    let url = request.url().clone();
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => {
            return Err(RequestError::InvalidRequest(format!(
                "cannot sign request without host: {}",
                url
            )))
        }
    };

    let (inferred_region, inferred_service) = infer_scope(url.host_str().unwrap_or_default());
    let region = credentials.region.clone().unwrap_or(inferred_region);
    let service = credentials.service.clone().unwrap_or(inferred_service);

    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = now.format("%Y%m%d").to_string();

    let body = request
        .body()
        .and_then(|b| b.as_bytes())
        .unwrap_or_default();
    let payload_hash = hex::encode(Sha256::digest(body));

    let headers = request.headers_mut();
    headers.remove(AUTHORIZATION);
    headers.insert(HOST, header_value(&host)?);
    headers.insert(
        HeaderName::from_static("x-amz-date"),
        header_value(&amz_date)?,
    );
    if let Some(token) = &credentials.session_token {
        headers.insert(
            HeaderName::from_static("x-amz-security-token"),
            header_value(token)?,
        );
    }
    if service == "s3" {
        headers.insert(
            HeaderName::from_static("x-amz-content-sha256"),
            header_value(&payload_hash)?,
        );
    }

    let mut signed: Vec<(String, String)> = Vec::new();
    for name in headers.keys() {
        let name = name.as_str();
        if UNSIGNED_HEADERS.contains(&name) {
            continue;
        }
        let value = headers
            .get_all(name)
            .iter()
            .map(|v| collapse_whitespace(&String::from_utf8_lossy(v.as_bytes())))
            .collect::<Vec<_>>()
            .join(",");
        signed.push((name.to_string(), value));
    }
    signed.sort();

    let canonical_headers: String = signed
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();
    let signed_headers = signed
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method().as_str(),
        canonical_uri(url.path(), service == "s3"),
        canonical_query(&url),
        canonical_headers,
        signed_headers,
        payload_hash
    );
    log::trace!("SigV4 canonical request:\n{}", canonical_request);

    let scope = format!("{}/{}/{}/aws4_request", date_stamp, region, service);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        AWS_SIGNING_ALGORITHM,
        amz_date,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let k_date = hmac_sha256(
        format!("AWS4{}", credentials.secret_access_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    let k_signing = hmac_sha256(&k_service, b"aws4_request");
    let signature = hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes()));

    let authorization = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        AWS_SIGNING_ALGORITHM, credentials.access_key_id, scope, signed_headers, signature
    );
    request
        .headers_mut()
        .insert(AUTHORIZATION, header_value(&authorization)?);
    Ok(())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn header_value(value: &str) -> Result<HeaderValue, RequestError> {
    HeaderValue::from_str(value)
        .map_err(|e| RequestError::InvalidRequest(format!("invalid signing header: {}", e)))
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn uri_encode(input: &[u8]) -> String {
    percent_encode(input, AWS_URI).to_string()
}

/// Path segments encoded once for S3 and twice for every other service.
fn canonical_uri(path: &str, is_s3: bool) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| {
            let decoded: Vec<u8> = percent_decode_str(segment).collect();
            let once = uri_encode(&decoded);
            if is_s3 {
                once
            } else {
                uri_encode(once.as_bytes())
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn canonical_query(url: &url::Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(k.as_bytes()), uri_encode(v.as_bytes())))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

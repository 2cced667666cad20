//! Header mappings and case restoration.
//!
//! The transport stores header names lower-cased. Everything handed back to
//! callers goes through [`normalize_header_names`] so names read the way the
//! author of the request (or the server) wrote them.

use std::collections::{BTreeMap, HashMap};

use reqwest::header::HeaderMap;

/// Header name to value. Lookups through the helpers below ignore case.
pub type HeaderMapping = BTreeMap<String, String>;

/// Returns the value of a header, matching the name case-insensitively.
pub fn get_header<'a>(headers: &'a HeaderMapping, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Removes every header with this name (any casing). Returns the last value removed.
pub fn remove_header(headers: &mut HeaderMapping, name: &str) -> Option<String> {
    let keys: Vec<String> = headers
        .keys()
        .filter(|key| key.eq_ignore_ascii_case(name))
        .cloned()
        .collect();
    keys.into_iter().filter_map(|key| headers.remove(&key)).last()
}

/// Sets a header, replacing any existing entry with the same name in any casing.
pub fn set_header(headers: &mut HeaderMapping, name: impl Into<String>, value: impl Into<String>) {
    let name = name.into();
    remove_header(headers, &name);
    headers.insert(name, value.into());
}

/// Restores original casing on a header mapping.
///
/// `raw_names` are header names as actually written on the wire or by the
/// client, in order. The first casing seen for each lower-cased name wins;
/// names with no raw match are kept as given.
pub fn normalize_header_names<S: AsRef<str>>(
    headers: &HeaderMapping,
    raw_names: &[S],
) -> HeaderMapping {
    let mut casing: HashMap<String, &str> = HashMap::with_capacity(raw_names.len());
    for raw in raw_names {
        casing
            .entry(raw.as_ref().to_ascii_lowercase())
            .or_insert(raw.as_ref());
    }

    headers
        .iter()
        .map(|(name, value)| {
            let adjusted = casing
                .get(&name.to_ascii_lowercase())
                .map(|raw| raw.to_string())
                .unwrap_or_else(|| name.clone());
            (adjusted, value.clone())
        })
        .collect()
}

/// Flattens a transport header map into a mapping with lower-cased names.
///
/// Repeated headers are joined with `", "`.
pub fn header_map_to_mapping(headers: &HeaderMap) -> HeaderMapping {
    let mut mapping = HeaderMapping::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        mapping
            .entry(name.as_str().to_string())
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    mapping
}

/// Registered names whose usual casing is not `Title-Case`.
const IRREGULAR_HEADER_NAMES: [&str; 12] = [
    "Content-MD5",
    "Content-ID",
    "DNT",
    "ETag",
    "Expect-CT",
    "SourceMap",
    "TE",
    "WWW-Authenticate",
    "X-DNS-Prefetch-Control",
    "X-UA-Compatible",
    "X-XSS-Protection",
    "X-WebKit-CSP",
];

/// Raw header names for a received header map.
///
/// The transport does not retain the server's casing, so each name is
/// rendered the way it is conventionally written: the irregular spellings
/// above, canonical `Title-Case` otherwise.
pub fn raw_response_header_names(headers: &HeaderMap) -> Vec<String> {
    headers
        .keys()
        .map(|name| conventional_case(name.as_str()))
        .collect()
}

fn conventional_case(name: &str) -> String {
    IRREGULAR_HEADER_NAMES
        .iter()
        .find(|known| known.eq_ignore_ascii_case(name))
        .map(|known| known.to_string())
        .unwrap_or_else(|| title_case(name))
}

fn title_case(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Approximate size of the received header block.
///
/// Sum of every raw name and value length, plus one byte per name/value pair
/// (half the raw entry count). A reproducible diagnostic number rather than an
/// exact wire measurement.
pub fn measure_header_bytes(headers: &HeaderMap) -> u64 {
    let mut raw_entries = 0u64;
    let mut total = 0u64;
    for (name, value) in headers {
        total += (name.as_str().len() + value.as_bytes().len()) as u64;
        raw_entries += 2;
    }
    total + raw_entries / 2
}

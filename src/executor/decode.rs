//! Response body decoding.

use encoding_rs::{Encoding, UTF_8};

/// Extracts the `charset` parameter of a `Content-Type` value.
pub fn charset_from_content_type(content_type: &str) -> Option<&str> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
}

/// Decodes a buffered body using the charset named by `content_type`.
///
/// UTF-8 when no charset is declared. A label the decoder does not know falls
/// back to lossy UTF-8.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = match content_type.and_then(charset_from_content_type) {
        Some(label) => match Encoding::for_label(label.as_bytes()) {
            Some(encoding) => encoding,
            None => {
                log::debug!("Unknown charset {:?}, decoding as UTF-8", label);
                return String::from_utf8_lossy(bytes).into_owned();
            }
        },
        None => UTF_8,
    };
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        log::debug!("Body is not valid {}, replaced malformed sequences", encoding.name());
    }
    text.into_owned()
}

/// Replaces `\uXXXX` escapes with the characters they name.
///
/// Surrogate pairs are combined. An escaped double quote stays escaped as
/// `\"` so JSON string bodies remain valid. Lone surrogates are left as
/// written.
pub fn decode_escaped_unicode(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(idx) = rest.find("\\u") {
        out.push_str(&rest[..idx]);
        let escape = &rest[idx..];
        let Some(unit) = parse_unit(escape) else {
            out.push_str("\\u");
            rest = &escape[2..];
            continue;
        };

        let (decoded, consumed) = if (0xD800..0xDC00).contains(&unit) {
            match parse_unit(&escape[6..]).filter(|low| (0xDC00..0xE000).contains(low)) {
                Some(low) => {
                    let code = 0x10000 + ((u32::from(unit) - 0xD800) << 10) + (u32::from(low) - 0xDC00);
                    (char::from_u32(code), 12)
                }
                None => (None, 6),
            }
        } else {
            (char::from_u32(u32::from(unit)), 6)
        };

        match decoded {
            Some('"') => out.push_str("\\\""),
            Some(c) => out.push(c),
            None => out.push_str(&escape[..consumed]),
        }
        rest = &escape[consumed..];
    }

    out.push_str(rest);
    out
}

/// Parses the four hex digits of a `\uXXXX` escape at the start of `s`.
fn parse_unit(s: &str) -> Option<u16> {
    let digits = s.strip_prefix("\\u")?.get(..4)?;
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(digits, 16).ok()
}

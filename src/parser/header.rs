//! RFC 5322 header parsing: folding, encoded-words (RFC 2047), and
//! parameterized values with RFC 2231 extensions.

use std::collections::HashMap;

use tracing::warn;

use crate::model::part::HeaderMap;
use crate::parser::transfer;

/// Parse a raw header block (everything before the first blank line) into
/// an ordered [`HeaderMap`].
pub fn parse_header_block(raw_headers: &[u8]) -> HeaderMap {
    let text = decode_header_bytes(raw_headers);
    let mut headers = HeaderMap::new();
    for (name, value) in unfold_headers(&text) {
        headers.append(name, value);
    }
    headers
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    // Strip BOM if present
    let bytes = bytes.strip_prefix(&[0xEF_u8, 0xBB, 0xBF][..]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
///
/// Returns a list of `(name, raw_value)` pairs; names keep their spelling.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_string();
            let value = line[colon_pos + 1..].trim().to_string();
            if !name.is_empty() {
                result.push((name, value));
            }
        }
        // Lines without a colon and not a continuation are silently skipped
    }

    result
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// If decoding fails for any token, the original text is preserved.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // If the gap between two encoded words is only whitespace, skip it (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];

        if let Some(decoded) = try_decode_one_word(after_start) {
            result.push_str(&decoded.text);
            remaining = &remaining[start + 2 + decoded.consumed..];
            last_was_encoded = true;
        } else {
            result.push_str("=?");
            remaining = after_start;
            last_was_encoded = false;
        }
    }

    result.push_str(remaining);
    result
}

struct DecodedWord {
    text: String,
    consumed: usize, // bytes consumed from the string *after* the initial "=?"
}

fn try_decode_one_word(s: &str) -> Option<DecodedWord> {
    // Format: charset?encoding?encoded_text?=
    let first_q = s.find('?')?;
    let charset = &s[..first_q];

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let encoded_text = &rest2[..end];

    let total_consumed = first_q + 1 + second_q + 1 + end + 2;

    let bytes = match encoding.to_uppercase().as_str() {
        "B" => transfer::decode_base64(encoded_text.as_bytes()).ok()?,
        "Q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    // RFC 2231 allows a language suffix: "utf-8*en"
    let charset = charset.split('*').next().unwrap_or(charset);
    let text = decode_charset(charset, &bytes);

    Some(DecodedWord {
        text,
        consumed: total_consumed,
    })
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                if let Ok(byte) = u8::from_str_radix(
                    std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("zz"),
                    16,
                ) {
                    result.push(byte);
                    i += 3;
                } else {
                    result.push(b'=');
                    i += 1;
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Decode bytes using a named charset.
///
/// Unknown labels fall back to lossy UTF-8.
pub(crate) fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    let charset_lower = charset.trim().to_lowercase();
    match charset_lower.as_str() {
        "utf-8" | "utf8" | "" => String::from_utf8_lossy(bytes).into_owned(),
        _ => {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.trim().as_bytes()) {
                let (decoded, _, _) = encoding.decode(bytes);
                decoded.into_owned()
            } else {
                warn!(
                    charset = charset,
                    "Unknown charset, falling back to UTF-8 lossy"
                );
                String::from_utf8_lossy(bytes).into_owned()
            }
        }
    }
}

/// Strip surrounding angle brackets (for Content-ID and Message-ID values).
pub fn strip_angle_brackets(s: &str) -> &str {
    s.trim().trim_start_matches('<').trim_end_matches('>')
}

/// One `name*N[*]=value` section of an RFC 2231 parameter.
struct ParamSection {
    index: u32,
    encoded: bool,
    value: String,
}

/// Split a parameterized header value (`Content-Type`, `Content-Disposition`)
/// into its lower-cased main value and its decoded parameters.
///
/// Handles quoted strings, RFC 2231 continuations (`filename*0=`, `filename*1=`)
/// and charset-tagged values (`filename*=utf-8''%E2%82%AC.pdf`). Plain values
/// are RFC 2047 decoded, since many clients put encoded-words in quotes.
pub fn parse_parameterized(value: &str) -> (String, Vec<(String, String)>) {
    let mut segments = split_unquoted(value, ';').into_iter();
    let head = segments
        .next()
        .map(|s| s.trim().to_ascii_lowercase())
        .unwrap_or_default();

    let mut order: Vec<String> = Vec::new();
    let mut plain: HashMap<String, String> = HashMap::new();
    let mut extended: HashMap<String, Vec<ParamSection>> = HashMap::new();

    for segment in segments {
        let Some((raw_key, raw_value)) = segment.split_once('=') else {
            continue;
        };
        let key = raw_key.trim().to_ascii_lowercase();
        if key.is_empty() {
            continue;
        }
        let value = unquote(raw_value.trim());

        let (key, encoded) = match key.strip_suffix('*') {
            Some(stripped) => (stripped.to_string(), true),
            None => (key, false),
        };
        let (base, section) = match key.split_once('*') {
            Some((base, index)) => match index.parse::<u32>() {
                Ok(index) => (base.to_string(), Some(index)),
                Err(_) => (key.clone(), None),
            },
            None => (key.clone(), None),
        };

        if !order.contains(&base) {
            order.push(base.clone());
        }
        if encoded || section.is_some() {
            extended.entry(base).or_default().push(ParamSection {
                index: section.unwrap_or(0),
                encoded,
                value,
            });
        } else {
            plain.insert(base, value);
        }
    }

    let params = order
        .into_iter()
        .filter_map(|name| {
            let value = match extended.remove(&name) {
                Some(sections) => join_sections(sections),
                None => decode_encoded_words(&plain.remove(&name)?),
            };
            Some((name, value))
        })
        .collect();

    (head, params)
}

/// Reassemble RFC 2231 sections into one decoded value.
fn join_sections(mut sections: Vec<ParamSection>) -> String {
    sections.sort_by_key(|s| s.index);

    let mut charset = String::from("utf-8");
    let mut bytes = Vec::new();
    for (i, section) in sections.iter().enumerate() {
        if !section.encoded {
            bytes.extend_from_slice(section.value.as_bytes());
            continue;
        }
        let mut data = section.value.as_str();
        if i == 0 {
            // charset'language'data
            let mut pieces = section.value.splitn(3, '\'');
            if let (Some(cs), Some(_lang), Some(rest)) =
                (pieces.next(), pieces.next(), pieces.next())
            {
                if !cs.is_empty() {
                    charset = cs.to_string();
                }
                data = rest;
            }
        }
        bytes.extend(percent_encoding::percent_decode_str(data));
    }

    decode_charset(&charset, &bytes)
}

/// Split on `sep` outside double-quoted strings.
fn split_unquoted(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => {
                current.push(ch);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            c if c == sep && !in_quotes => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    parts.push(current);
    parts
}

/// Remove surrounding double quotes and resolve backslash escapes.
fn unquote(s: &str) -> String {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        let inner = &s[1..s.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else {
                out.push(c);
            }
        }
        out
    } else {
        s.to_string()
    }
}

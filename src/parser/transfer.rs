//! Content-Transfer-Encoding and charset decoding of leaf payloads.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use crate::diagnostics::Diagnostics;
use crate::error::{ConvertError, Result};
use crate::model::part::{MimePart, TransferEncoding};
use crate::parser::header;

/// Base64 engine that accepts missing or superfluous padding and stray
/// trailing bits, as produced by many mailers.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decode base64, ignoring line breaks and any other non-alphabet bytes.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let filtered: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| b.is_ascii_alphanumeric() || *b == b'+' || *b == b'/')
        .collect();
    LENIENT_BASE64
        .decode(&filtered)
        .map_err(|e| ConvertError::MimeError(format!("invalid base64 payload: {e}")))
}

/// Decode quoted-printable (RFC 2045). Malformed escapes are kept literally.
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] != b'=' {
            result.push(data[i]);
            i += 1;
            continue;
        }
        // Soft line break
        if data.get(i + 1) == Some(&b'\n') {
            i += 2;
            continue;
        }
        if data.get(i + 1) == Some(&b'\r') && data.get(i + 2) == Some(&b'\n') {
            i += 3;
            continue;
        }
        let hex = data
            .get(i + 1..i + 3)
            .and_then(|h| std::str::from_utf8(h).ok())
            .and_then(|h| u8::from_str_radix(h, 16).ok());
        match hex {
            Some(byte) => {
                result.push(byte);
                i += 3;
            }
            None => {
                result.push(b'=');
                i += 1;
            }
        }
    }
    result
}

/// Undo the part's declared transfer encoding.
///
/// `7bit`, `8bit`, `binary` and unknown encodings return the payload as is.
pub fn decode_payload(part: &MimePart) -> Result<Vec<u8>> {
    match part.transfer_encoding {
        TransferEncoding::Base64 => decode_base64(&part.payload),
        TransferEncoding::QuotedPrintable => Ok(decode_quoted_printable(&part.payload)),
        _ => Ok(part.payload.clone()),
    }
}

/// Decode a textual leaf to a `String`.
///
/// An `8bit` part is taken as already-decoded text. Otherwise the transfer
/// encoding is undone first; if that fails the raw payload is used and a
/// warning is recorded. Bytes are then decoded with the declared charset
/// (UTF-8 when absent), replacing invalid sequences.
pub fn decode_text(part: &MimePart, diag: &mut Diagnostics) -> String {
    let bytes = if part.transfer_encoding == TransferEncoding::EightBit {
        tracing::debug!("Part is pre-decoded because Content-Transfer-Encoding is 8bit");
        part.payload.clone()
    } else {
        match decode_payload(part) {
            Ok(bytes) => bytes,
            Err(e) => {
                diag.warn(format!(
                    "Could not undo transfer encoding of {} part ({e}); using raw bytes",
                    part.mime_type()
                ));
                part.payload.clone()
            }
        }
    };

    match part.charset.as_deref() {
        None => {
            tracing::debug!(mime = part.mime_type(), "No charset declared, defaulting to utf-8");
            String::from_utf8_lossy(&bytes).into_owned()
        }
        Some(label) => {
            if encoding_rs::Encoding::for_label(label.trim().as_bytes()).is_none() {
                diag.warn(format!("Unknown charset '{label}', decoding as utf-8"));
            }
            header::decode_charset(label, &bytes)
        }
    }
}

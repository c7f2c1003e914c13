//! MIME tree construction.
//!
//! `mail-parser` finds the part boundaries; the tree keeps each leaf's raw,
//! still-encoded bytes so that transfer and charset decoding stay under the
//! pipeline's control.

use mail_parser::{MessageParser, PartType};

use crate::error::{ConvertError, Result};
use crate::model::mail::Message;
use crate::model::part::{ContentType, HeaderMap, MimePart, TransferEncoding};
use crate::parser::header;

/// Maximum nesting depth (to prevent stack overflow on adversarial input).
/// Containers below this depth are kept but their children are dropped.
const MAX_DEPTH: usize = 32;

/// Parse a complete raw message (headers + body) into an immutable tree.
pub fn parse_message(raw_message: &[u8]) -> Result<Message> {
    let message_bytes = skip_from_line(raw_message);

    let parsed = MessageParser::default()
        .parse(message_bytes)
        .ok_or_else(|| ConvertError::MimeError("Failed to parse message".into()))?;

    let root = convert_part(&parsed, 0, 0);
    tracing::debug!(
        content_type = root.mime_type(),
        children = root.children.len(),
        "Parsed message"
    );

    Ok(Message {
        headers: root.headers.clone(),
        root,
    })
}

/// Build a [`MimePart`] from part `id` of a parsed message, recursing into
/// multipart children and embedded `message/rfc822` messages.
fn convert_part(message: &mail_parser::Message<'_>, id: usize, depth: usize) -> MimePart {
    let raw: &[u8] = message.raw_message.as_ref();
    let Some(part) = message.parts.get(id) else {
        return empty_part();
    };

    let header_bytes = slice(raw, part.offset_header as usize, part.offset_body as usize);
    let headers = header::parse_header_block(header_bytes);

    let content_type = headers
        .get("content-type")
        .map(ContentType::parse)
        .unwrap_or_default();
    let transfer_encoding = headers
        .get("content-transfer-encoding")
        .map(TransferEncoding::parse)
        .unwrap_or_default();
    let charset = content_type.charset().map(|c| c.trim().to_string());

    let mut children = Vec::new();
    let mut payload = Vec::new();
    let is_multipart = match &part.body {
        PartType::Multipart(ids) => {
            if depth < MAX_DEPTH {
                children = ids
                    .iter()
                    .map(|&child| convert_part(message, child as usize, depth + 1))
                    .collect();
            }
            true
        }
        PartType::Message(inner) => {
            if depth < MAX_DEPTH {
                children.push(convert_part(inner, 0, depth + 1));
            }
            true
        }
        _ => {
            payload = slice(raw, part.offset_body as usize, part.offset_end as usize).to_vec();
            false
        }
    };

    MimePart {
        content_type,
        headers,
        transfer_encoding,
        charset,
        payload,
        is_multipart,
        children,
    }
}

fn empty_part() -> MimePart {
    MimePart {
        content_type: ContentType::default(),
        headers: HeaderMap::new(),
        transfer_encoding: TransferEncoding::default(),
        charset: None,
        payload: Vec::new(),
        is_multipart: false,
        children: Vec::new(),
    }
}

/// Bounds-checked sub-slice; malformed offsets yield an empty slice.
fn slice(raw: &[u8], start: usize, end: usize) -> &[u8] {
    raw.get(start..end.min(raw.len())).unwrap_or_default()
}

/// Skip a UTF-8 BOM and the `From ` separator line of mbox-style input.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF_u8, 0xBB, 0xBF][..]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

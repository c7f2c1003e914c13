//! Stamping of the produced document's info dictionary.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, StringFormat};
use tempfile::NamedTempFile;

use crate::error::{ConvertError, Result};

/// Merges key/value pairs into a document's metadata, in place.
pub trait MetadataStamper {
    /// Later entries override existing keys; other keys are preserved.
    fn stamp(&self, path: &Path, entries: &[(String, String)]) -> Result<()>;
}

/// Rewrites the PDF `/Info` dictionary with `lopdf`.
///
/// The updated document is written to a temporary file beside the original
/// and renamed over it, so a failure never leaves a truncated PDF behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfInfoStamper;

impl MetadataStamper for PdfInfoStamper {
    fn stamp(&self, path: &Path, entries: &[(String, String)]) -> Result<()> {
        let fail = |reason: String| ConvertError::MetadataError {
            path: path.to_path_buf(),
            reason,
        };

        let mut doc = Document::load(path).map_err(|e| fail(e.to_string()))?;

        let info_id = match doc.trailer.get(b"Info").and_then(Object::as_reference) {
            Ok(id) => id,
            Err(_) => {
                // Missing, or stored inline in the trailer
                let existing = doc
                    .trailer
                    .get(b"Info")
                    .and_then(Object::as_dict)
                    .cloned()
                    .unwrap_or_else(|_| Dictionary::new());
                let id = doc.add_object(existing);
                doc.trailer.set("Info", Object::Reference(id));
                id
            }
        };

        let info = doc
            .get_object_mut(info_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| fail(format!("invalid info dictionary: {e}")))?;
        for (key, value) in entries {
            tracing::debug!(key = %key, "Setting document metadata");
            info.set(key.as_bytes().to_vec(), pdf_text(value));
        }

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ConvertError::io(dir, e))?;
        doc.save_to(&mut tmp).map_err(|e| fail(e.to_string()))?;
        tmp.persist(path)
            .map_err(|e| ConvertError::io(path, e.error))?;
        Ok(())
    }
}

/// Encode a text string: plain bytes for ASCII, otherwise UTF-16BE with a
/// byte-order mark.
pub fn pdf_text(value: &str) -> Object {
    if value.is_ascii() {
        return Object::String(value.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Decode a PDF text string written by [`pdf_text`] or a PDF producer.
pub fn decode_pdf_text(bytes: &[u8]) -> String {
    match bytes.strip_prefix(&[0xFE_u8, 0xFF][..]) {
        Some(utf16) => {
            let units: Vec<u16> = utf16
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        None => bytes.iter().map(|&b| b as char).collect(),
    }
}

//! Attachment descriptors.
//!
//! A descriptor lives only between filename derivation and the write to the
//! output directory.

use super::mail::LeafId;

/// An attachment ready to be written out.
#[derive(Debug, Clone)]
pub struct AttachmentDescriptor {
    /// Derived filename (before collision suffixing).
    pub filename: String,

    /// MIME content type (e.g. `"image/jpeg"`, `"application/pdf"`).
    pub content_type: String,

    /// Transfer-decoded payload bytes.
    pub payload: Vec<u8>,

    /// Leaf the bytes came from.
    pub source: LeafId,
}

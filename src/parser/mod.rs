//! Email parsing: input loading, header decoding, MIME tree construction,
//! and transfer/charset decoding.

pub mod eml;
pub mod header;
pub mod mime;
pub mod transfer;

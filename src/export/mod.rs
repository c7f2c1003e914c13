//! Output side of a conversion: attachment files, the rendered document and
//! its metadata.

pub mod attachment;
pub mod document;
pub mod metadata;
pub mod render;

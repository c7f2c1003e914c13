//! `eml2pdf`: convert an email into a PDF document plus its attachments.
//!
//! The message is parsed once into an immutable MIME tree. The body is
//! selected and decoded, `cid:` images are inlined, calendar invitations are
//! summarized, and the page is rendered by an external program. Every leaf
//! the body did not consume is written out as an attachment.

pub mod config;
pub mod content;
pub mod convert;
pub mod diagnostics;
pub mod error;
pub mod export;
pub mod i18n;
pub mod model;
pub mod parser;
pub mod walker;

//! Selection and decoding of the primary message body.

use crate::content::html_escape;
use crate::diagnostics::Diagnostics;
use crate::model::mail::LeafId;
use crate::parser::transfer;
use crate::walker::MimeWalker;

/// Which kind of leaf the body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Html,
    Plain,
    /// Neither an HTML nor a plain-text leaf exists.
    Empty,
}

/// The decoded body, always as HTML.
#[derive(Debug, Clone)]
pub struct Body {
    pub html: String,
    pub kind: BodyKind,
    pub source: Option<LeafId>,
}

/// Pick the first `text/html` leaf, else the first `text/plain` leaf, and
/// decode it. Plain text is escaped and wrapped in a `<pre>` scaffold.
pub fn resolve_body(walker: &MimeWalker<'_>, diag: &mut Diagnostics) -> Body {
    if let Some(leaf) = walker.find_by_content_type("text/html") {
        tracing::debug!(leaf = leaf.id.0, "Using text/html body");
        return Body {
            html: transfer::decode_text(leaf.part, diag),
            kind: BodyKind::Html,
            source: Some(leaf.id),
        };
    }

    if let Some(leaf) = walker.find_by_content_type("text/plain") {
        tracing::debug!(leaf = leaf.id.0, "Using text/plain body");
        let text = transfer::decode_text(leaf.part, diag);
        return Body {
            html: wrap_plain_text(&text),
            kind: BodyKind::Plain,
            source: Some(leaf.id),
        };
    }

    tracing::debug!("No text/html or text/plain leaf, body is empty");
    Body {
        html: String::new(),
        kind: BodyKind::Empty,
        source: None,
    }
}

/// Wrap plain text as a minimal UTF-8 HTML document.
///
/// The text has already been decoded to a Rust string, so the declared
/// charset is always `utf-8` whatever the source part declared.
pub fn wrap_plain_text(text: &str) -> String {
    format!(
        "<html><head><meta charset=\"utf-8\"/></head><body><pre>\n{}\n</pre></body></html>",
        html_escape(text)
    )
}

//! Turning message parts into the HTML fragments of the output document.

pub mod body;
pub mod calendar;
pub mod fetch;
pub mod sanitize;

/// Escape text for inclusion in HTML element content or attribute values.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

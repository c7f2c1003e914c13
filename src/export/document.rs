//! Assembly of the final HTML page and production of the document.

use std::path::Path;

use crate::content::html_escape;
use crate::error::{ConvertError, Result};
use crate::export::metadata::MetadataStamper;
use crate::export::render::DocumentRenderer;
use crate::i18n;
use crate::model::part::HeaderMap;

/// Declares the page encoding to the renderer.
pub const UTF8_META: &str =
    "<meta http-equiv=\"Content-Type\" content=\"text/html; charset=UTF-8\" />\n";

/// Value written to the `Producer` metadata key.
pub const PRODUCER: &str = "eml2pdf";

/// Document metadata key filled from each message header.
const HEADER_METADATA: &[(&str, &str)] = &[
    ("Author", "From"),
    ("Title", "Subject"),
    ("X-eml2pdf-To", "To"),
];

/// The pieces that make up the page, in output order.
#[derive(Debug, Clone, Default)]
pub struct PageContent<'a> {
    pub header_block: Option<&'a str>,
    pub body: &'a str,
    pub calendar: &'a str,
    pub attachment_names: &'a [String],
}

/// Concatenate the page: encoding declaration, header block, body,
/// calendar tables, attachment listing.
pub fn assemble_html(content: &PageContent<'_>) -> String {
    let mut html = String::from(UTF8_META);
    if let Some(block) = content.header_block {
        html.push_str(block);
    }
    html.push_str(content.body);
    html.push_str(content.calendar);
    html.push_str(&attachment_listing(content.attachment_names));
    html
}

/// From / To / Date / Subject with localized labels; absent headers are
/// left out.
pub fn header_block(headers: &HeaderMap) -> String {
    let fields: [(&str, &str); 4] = [
        ("From", i18n::hdr_from()),
        ("To", i18n::hdr_to()),
        ("Date", i18n::hdr_date()),
        ("Subject", i18n::hdr_subject()),
    ];
    let mut block = String::new();
    for (name, label) in fields {
        if let Some(value) = headers.get_decoded(name) {
            block.push_str(&format!("<b>{label}</b>: {}<br/>", html_escape(&value)));
        }
    }
    block.push_str("<br/>");
    block
}

/// Bulleted list of attachment names under a singular or plural heading;
/// empty when there are none.
pub fn attachment_listing(names: &[String]) -> String {
    if names.is_empty() {
        return String::new();
    }
    let label = if names.len() == 1 {
        i18n::doc_attachment()
    } else {
        i18n::doc_attachments()
    };
    let items: String = names
        .iter()
        .map(|name| format!("<li>{}</li>", html_escape(name)))
        .collect();
    format!("<br><br><b><u>{label}:</u></b><br><ul>{items}</ul>")
}

/// Metadata taken from the message headers, plus the producer.
pub fn metadata_entries(headers: &HeaderMap) -> Vec<(String, String)> {
    let mut entries: Vec<(String, String)> = HEADER_METADATA
        .iter()
        .filter_map(|(key, header)| {
            headers
                .get_decoded(header)
                .map(|value| (key.to_string(), value))
        })
        .collect();
    entries.push(("Producer".to_string(), PRODUCER.to_string()));
    entries
}

/// Render `html` to `output` and stamp its metadata from `headers`.
pub fn produce_document(
    html: &str,
    output: &Path,
    headers: &HeaderMap,
    renderer: &dyn DocumentRenderer,
    stamper: &dyn MetadataStamper,
) -> Result<()> {
    tracing::debug!(bytes = html.len(), output = %output.display(), "Rendering document");
    renderer.render(html.as_bytes(), output)?;
    if !output.exists() {
        return Err(ConvertError::RenderError(format!(
            "renderer did not produce {}",
            output.display()
        )));
    }
    stamper.stamp(output, &metadata_entries(headers))?;
    tracing::info!(output = %output.display(), "Document written");
    Ok(())
}

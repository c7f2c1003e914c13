//! A single node of the MIME tree plus its header and content-type models.

use crate::parser::header;

/// Ordered, multi-valued header mapping with case-insensitive names.
///
/// Names keep their original spelling; lookups ignore ASCII case. Values are
/// stored unfolded but otherwise raw (RFC 2047 encoded-words are kept).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, keeping any existing values for the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for `name`, or `None` when the header is not present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name` in header order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// First value for `name` with RFC 2047 encoded-words decoded.
    pub fn get_decoded(&self, name: &str) -> Option<String> {
        self.get(name).map(header::decode_encoded_words)
    }
}

/// A parsed `Content-Type` (or `Content-Disposition`) value.
///
/// `mime_type` is lower-cased (`"text/html"`, `"attachment"`); parameter
/// names are lower-cased, values are RFC 2231 / RFC 2047 decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentType {
    pub mime_type: String,
    pub params: Vec<(String, String)>,
}

impl ContentType {
    /// Parse a header value such as `text/plain; charset="utf-8"`.
    pub fn parse(value: &str) -> Self {
        let (mime_type, params) = header::parse_parameterized(value);
        Self { mime_type, params }
    }

    /// Value of parameter `name` (case-insensitive), if present.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The part before the slash (`"text"` for `text/html`).
    pub fn main_type(&self) -> &str {
        self.mime_type.split('/').next().unwrap_or("")
    }

    /// The `charset` parameter, if declared and non-empty.
    pub fn charset(&self) -> Option<&str> {
        self.param("charset").filter(|c| !c.trim().is_empty())
    }

    /// The `name` parameter, if declared.
    pub fn name(&self) -> Option<&str> {
        self.param("name")
    }
}

impl Default for ContentType {
    /// RFC 2045 default for parts without a `Content-Type` header.
    fn default() -> Self {
        Self {
            mime_type: "text/plain".to_string(),
            params: Vec::new(),
        }
    }
}

/// Declared `Content-Transfer-Encoding`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    #[default]
    SevenBit,
    EightBit,
    Binary,
    Base64,
    QuotedPrintable,
    /// Unrecognized token, kept verbatim (lower-cased).
    Other(String),
}

impl TransferEncoding {
    /// Parse a header value; unknown tokens become [`TransferEncoding::Other`].
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "7bit" => Self::SevenBit,
            "8bit" => Self::EightBit,
            "binary" => Self::Binary,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One node of the MIME tree.
///
/// Leaves carry the raw, still transfer-encoded payload; containers
/// (`multipart/*`, and `message/rfc822` holding its embedded message) carry
/// children instead. Nodes are built once by the parser and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct MimePart {
    pub content_type: ContentType,
    pub headers: HeaderMap,
    pub transfer_encoding: TransferEncoding,
    pub charset: Option<String>,
    pub payload: Vec<u8>,
    pub is_multipart: bool,
    pub children: Vec<MimePart>,
}

impl MimePart {
    /// Lower-cased `type/subtype`.
    pub fn mime_type(&self) -> &str {
        &self.content_type.mime_type
    }

    /// Raw `Content-ID` header value, trimmed.
    pub fn content_id(&self) -> Option<&str> {
        self.headers
            .get("content-id")
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Parsed `Content-Disposition`, if present.
    pub fn disposition(&self) -> Option<ContentType> {
        self.headers.get("content-disposition").map(ContentType::parse)
    }

    /// The explicitly declared filename: `Content-Disposition` `filename`,
    /// falling back to the `Content-Type` `name` parameter.
    pub fn explicit_filename(&self) -> Option<String> {
        self.disposition()
            .and_then(|d| d.param("filename").map(str::to_string))
            .or_else(|| self.content_type.name().map(str::to_string))
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
    }
}

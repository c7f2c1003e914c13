//! Rewriting of `<img>` references in the HTML body.
//!
//! Pass 1 inlines `cid:` references as `data:` URIs built from the message's
//! own parts and reports which parts it used. Pass 2 drops every reference
//! the renderer should not follow: unresolved ones, tracker hosts, and remote
//! images that are disabled or cannot be fetched.
//!
//! The body is parsed with `html5ever`. When a pass changes an attribute the
//! whole document is serialized again; otherwise the input is returned as is.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use html5ever::serialize::SerializeOpts;
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{Attribute, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use percent_encoding::percent_decode_str;

use crate::content::fetch::ImageFetcher;
use crate::diagnostics::Diagnostics;
use crate::model::mail::PartSet;
use crate::parser::transfer;
use crate::walker::{Leaf, MimeWalker};

/// Placeholder written in place of a `cid:` reference that did not resolve.
pub const BROKEN_SRC: &str = "broken";

/// Hosts of known tracking pixels; any source containing one is dropped.
pub const DEFAULT_IMAGE_HOST_BLACKLIST: &[&str] = &["emltrk.com", "trk.email"];

const FALLBACK_MIME: &str = "application/octet-stream";

/// How remote (non-`data:`) image sources are treated.
#[derive(Debug, Clone)]
pub struct RemotePolicy {
    /// Fetch remote images; when false every remote source is dropped.
    pub enabled: bool,
    /// Host substrings whose images are always dropped.
    pub blacklist: Vec<String>,
}

impl RemotePolicy {
    /// The default tracker blacklist plus `extra_hosts`.
    pub fn new(enabled: bool, extra_hosts: &[String]) -> Self {
        let blacklist = DEFAULT_IMAGE_HOST_BLACKLIST
            .iter()
            .map(|h| h.to_string())
            .chain(extra_hosts.iter().map(|h| h.to_ascii_lowercase()))
            .collect();
        Self { enabled, blacklist }
    }

    fn is_blacklisted(&self, lower_src: &str) -> bool {
        self.blacklist.iter().any(|host| lower_src.contains(host.as_str()))
    }
}

impl Default for RemotePolicy {
    fn default() -> Self {
        Self::new(true, &[])
    }
}

/// Result of sanitizing a body.
#[derive(Debug, Clone)]
pub struct Sanitized {
    pub html: String,
    /// Leaves inlined into the body; they are not attachments.
    pub consumed: PartSet,
}

/// Run both passes over `html`.
pub fn sanitize(
    html: &str,
    walker: &MimeWalker<'_>,
    policy: &RemotePolicy,
    fetcher: &dyn ImageFetcher,
    diag: &mut Diagnostics,
) -> Sanitized {
    let (inlined, consumed) = inline_cid_images(html, walker, diag);
    let html = remove_invalid_sources(&inlined, policy, fetcher);
    Sanitized { html, consumed }
}

/// Pass 1: replace each `cid:` image source by a `data:` URI, or by
/// [`BROKEN_SRC`] when no part matches.
pub fn inline_cid_images(
    html: &str,
    walker: &MimeWalker<'_>,
    diag: &mut Diagnostics,
) -> (String, PartSet) {
    let mut consumed = PartSet::new();

    let rewritten = rewrite_img_sources(html, |value| {
        let Some(token) = strip_prefix_ignore_case(value.trim(), "cid:") else {
            return SrcAction::Keep;
        };
        tracing::debug!(cid = token, "Looking for image part");

        let Some(leaf) = find_cid_part(walker, token) else {
            diag.warn(format!("Could not find image cid {token} in email content."));
            return SrcAction::Replace(BROKEN_SRC.to_string());
        };

        match transfer::decode_payload(leaf.part) {
            Ok(bytes) => {
                consumed.insert(leaf.id);
                SrcAction::Replace(data_uri(&bytes))
            }
            Err(e) => {
                diag.warn(format!("Could not decode image cid {token}: {e}"));
                SrcAction::Replace(BROKEN_SRC.to_string())
            }
        }
    });

    (rewritten, consumed)
}

/// Pass 2: drop sources that are empty, broken, blacklisted, or remote and
/// not retrievable. `data:` sources are kept untouched.
pub fn remove_invalid_sources(
    html: &str,
    policy: &RemotePolicy,
    fetcher: &dyn ImageFetcher,
) -> String {
    rewrite_img_sources(html, |value| {
        let src = value.trim();
        let lower = src.to_ascii_lowercase();

        if lower.is_empty() || lower == BROKEN_SRC {
            return SrcAction::Drop;
        }
        if lower.starts_with("data:") {
            tracing::debug!("Keeping inline data source");
            return SrcAction::Keep;
        }
        if policy.is_blacklisted(&lower) {
            tracing::debug!(src, "Removing source found in blacklist");
            return SrcAction::Drop;
        }
        if !policy.enabled {
            tracing::debug!(src, "Remote images disabled, removing source");
            return SrcAction::Drop;
        }
        match fetcher.fetch(src) {
            Ok(()) => SrcAction::Keep,
            Err(e) => {
                tracing::debug!(src, error = %e, "Could not retrieve image, removing source");
                SrcAction::Drop
            }
        }
    })
}

/// What to do with one `src` attribute.
enum SrcAction {
    Keep,
    Drop,
    Replace(String),
}

/// Apply `rewrite` to the `src` value of every `<img>` element, in
/// document order.
fn rewrite_img_sources<F>(html: &str, mut rewrite: F) -> String
where
    F: FnMut(&str) -> SrcAction,
{
    let dom = html5ever::parse_document(RcDom::default(), ParseOpts::default()).one(html);

    let mut changed = false;
    let mut pending: Vec<Handle> = vec![dom.document.clone()];
    while let Some(node) = pending.pop() {
        if let NodeData::Element {
            ref name,
            ref attrs,
            ..
        } = node.data
        {
            if &*name.local == "img" {
                changed |= rewrite_src(&mut attrs.borrow_mut(), &mut rewrite);
            }
        }
        pending.extend(node.children.borrow().iter().rev().cloned());
    }

    if !changed {
        return html.to_string();
    }
    match serialize_document(&dom) {
        Ok(out) => out,
        Err(e) => {
            tracing::warn!(error = %e, "Could not serialize rewritten body, keeping input");
            html.to_string()
        }
    }
}

/// Rewrite the `src` attribute of one element; `true` when it changed.
fn rewrite_src<F>(attrs: &mut Vec<Attribute>, rewrite: &mut F) -> bool
where
    F: FnMut(&str) -> SrcAction,
{
    let Some(pos) = attrs.iter().position(|attr| &*attr.name.local == "src") else {
        return false;
    };
    match rewrite(&*attrs[pos].value) {
        SrcAction::Keep => false,
        SrcAction::Drop => {
            attrs.remove(pos);
            true
        }
        SrcAction::Replace(new) => {
            attrs[pos].value = StrTendril::from(new);
            true
        }
    }
}

fn serialize_document(dom: &RcDom) -> std::io::Result<String> {
    let document: SerializableHandle = dom.document.clone().into();
    let mut out = Vec::new();
    html5ever::serialize(&mut out, &document, SerializeOpts::default())?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Content-ID lookup, then `name` lookup, each retried with the
/// percent-decoded token.
fn find_cid_part<'a>(walker: &MimeWalker<'a>, token: &str) -> Option<Leaf<'a>> {
    let lookup = |t: &str| {
        walker
            .find_by_content_id(t)
            .or_else(|| walker.find_by_content_type_name(t))
    };
    lookup(token).or_else(|| {
        let decoded = percent_decode_str(token).decode_utf8().ok()?;
        (decoded != token).then(|| lookup(&decoded)).flatten()
    })
}

/// `data:` URI for `bytes`, typed by sniffing the content.
fn data_uri(bytes: &[u8]) -> String {
    let mime = infer::get(bytes).map_or(FALLBACK_MIME, |kind| kind.mime_type());
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::error::{ConvertError, Result};
    use crate::model::mail::LeafId;
    use crate::parser::mime::parse_message;

    const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    /// Records requested URLs and succeeds only for those listed.
    struct StubFetcher {
        reachable: Vec<&'static str>,
        requested: RefCell<Vec<String>>,
    }

    impl StubFetcher {
        fn new(reachable: Vec<&'static str>) -> Self {
            Self {
                reachable,
                requested: RefCell::new(Vec::new()),
            }
        }
    }

    impl ImageFetcher for StubFetcher {
        fn fetch(&self, url: &str) -> Result<()> {
            self.requested.borrow_mut().push(url.to_string());
            if self.reachable.contains(&url) {
                Ok(())
            } else {
                Err(ConvertError::FetchError {
                    url: url.to_string(),
                    reason: "404".into(),
                })
            }
        }
    }

    fn related_message(cid_header: &str, name: &str) -> Vec<u8> {
        let image = STANDARD.encode(PNG_BYTES);
        format!(
            "Content-Type: multipart/related; boundary=B\r\n\r\n\
--B\r\nContent-Type: text/html\r\n\r\n<p>x</p>\r\n\
--B\r\nContent-Type: image/gif; name=\"{name}\"\r\n\
Content-Transfer-Encoding: base64\r\n\
Content-ID: {cid_header}\r\n\r\n{image}\r\n--B--\r\n"
        )
        .into_bytes()
    }

    #[test]
    fn test_cid_becomes_sniffed_data_uri() {
        let raw = related_message("<logo@x>", "logo.gif");
        let message = parse_message(&raw).unwrap();
        let walker = MimeWalker::new(&message);
        let mut diag = Diagnostics::new();

        let (html, consumed) = inline_cid_images(
            r#"<p><IMG alt="l" SRC="cid:logo@x"></p>"#,
            &walker,
            &mut diag,
        );
        // The declared image/gif is ignored in favour of the sniffed type
        assert!(html.contains("src=\"data:image/png;base64,"));
        assert!(!html.contains("cid:"));
        assert!(consumed.contains(LeafId(1)));
        assert!(!diag.has_warnings());
    }

    #[test]
    fn test_cid_falls_back_to_name_and_percent_decoding() {
        let raw = related_message("<unrelated>", "my logo.png");
        let message = parse_message(&raw).unwrap();
        let walker = MimeWalker::new(&message);
        let mut diag = Diagnostics::new();

        let (html, consumed) =
            inline_cid_images("<img src='cid:my%20logo.png'>", &walker, &mut diag);
        assert!(html.contains("data:image/png;base64,"));
        assert_eq!(consumed.len(), 1);
    }

    #[test]
    fn test_unresolved_cid_is_broken_then_removed() {
        let raw = related_message("<logo@x>", "logo.png");
        let message = parse_message(&raw).unwrap();
        let walker = MimeWalker::new(&message);
        let mut diag = Diagnostics::new();
        let fetcher = StubFetcher::new(vec![]);

        let out = sanitize(
            r#"<img src="cid:missing@x" width="1">"#,
            &walker,
            &RemotePolicy::default(),
            &fetcher,
            &mut diag,
        );
        assert!(out.html.contains(r#"<img width="1">"#));
        assert!(!out.html.contains("src="));
        assert!(out.consumed.is_empty());
        assert!(diag.has_warnings());
        assert!(fetcher.requested.borrow().is_empty());
    }

    #[test]
    fn test_gt_inside_attribute_value() {
        let raw = related_message("<logo@x>", "logo.png");
        let message = parse_message(&raw).unwrap();
        let walker = MimeWalker::new(&message);
        let mut diag = Diagnostics::new();

        let (html, consumed) =
            inline_cid_images(r#"<img alt="a > b" src="cid:logo@x">"#, &walker, &mut diag);
        assert!(html.contains(r#"alt="a > b""#));
        assert!(html.contains("src=\"data:image/png;base64,"));
        assert!(!html.contains("cid:"));
        assert!(consumed.contains(LeafId(1)));
    }

    #[test]
    fn test_src_text_inside_other_attribute() {
        let raw = related_message("<logo@x>", "logo.png");
        let message = parse_message(&raw).unwrap();
        let walker = MimeWalker::new(&message);
        let mut diag = Diagnostics::new();

        let (html, consumed) = inline_cid_images(
            r#"<img title="see src=x" src="cid:logo@x">"#,
            &walker,
            &mut diag,
        );
        assert!(html.contains(r#"title="see src=x""#));
        assert!(html.contains("src=\"data:image/png;base64,"));
        assert!(!html.contains("cid:"));
        assert_eq!(consumed.len(), 1);
    }

    #[test]
    fn test_tracker_behind_decoy_attribute_is_dropped() {
        let fetcher = StubFetcher::new(vec![]);
        let html = remove_invalid_sources(
            r#"<img title="src=x" alt="1 > 0" src="https://emltrk.com/p.gif">"#,
            &RemotePolicy::default(),
            &fetcher,
        );
        assert!(html.contains(r#"<img title="src=x" alt="1 > 0">"#));
        assert!(!html.contains("emltrk"));
        assert!(fetcher.requested.borrow().is_empty());
    }

    #[test]
    fn test_body_without_changes_is_returned_verbatim() {
        let fetcher = StubFetcher::new(vec![]);
        let input = concat!(
            "<p>no <b>images</b> here</p>\n",
            r#"<img alt="x" src="data:image/png;base64,AA==">"#
        );
        assert_eq!(
            remove_invalid_sources(input, &RemotePolicy::default(), &fetcher),
            input
        );
    }

    #[test]
    fn test_blacklisted_host_never_fetched() {
        let fetcher = StubFetcher::new(vec!["http://emltrk.com/p.gif"]);
        let html = remove_invalid_sources(
            r#"<img src="http://EMLTRK.com/p.gif">"#,
            &RemotePolicy::default(),
            &fetcher,
        );
        assert!(html.contains("<img>"));
        assert!(fetcher.requested.borrow().is_empty());
    }

    #[test]
    fn test_configured_blacklist_host() {
        let fetcher = StubFetcher::new(vec!["https://pixel.example/a.gif"]);
        let policy = RemotePolicy::new(true, &["Pixel.Example".to_string()]);
        let input = r#"<img src="https://pixel.example/a.gif">"#;
        let html = remove_invalid_sources(input, &policy, &fetcher);
        assert!(html.contains("<img>"));
        assert!(!html.contains("pixel.example"));
    }

    #[test]
    fn test_remote_disabled_drops_without_fetching() {
        let fetcher = StubFetcher::new(vec!["https://example.com/a.png"]);
        let policy = RemotePolicy::new(false, &[]);
        let input = r#"<img src="https://example.com/a.png">"#;
        let html = remove_invalid_sources(input, &policy, &fetcher);
        assert!(html.contains("<img>"));
        assert!(fetcher.requested.borrow().is_empty());
    }

    #[test]
    fn test_fetch_results_are_per_reference() {
        let fetcher = StubFetcher::new(vec!["https://ok.example/a.png"]);
        let html = remove_invalid_sources(
            r#"<img src="https://down.example/b.png"><img src="https://ok.example/a.png">"#,
            &RemotePolicy::default(),
            &fetcher,
        );
        assert!(html.contains(r#"<img><img src="https://ok.example/a.png">"#));
        assert_eq!(
            *fetcher.requested.borrow(),
            vec!["https://down.example/b.png", "https://ok.example/a.png"]
        );
    }

    #[test]
    fn test_data_and_non_img_untouched() {
        let fetcher = StubFetcher::new(vec![]);
        let input = concat!(
            r#"<a href="cid:x">l</a>"#,
            r#"<img data-src="x" src="data:image/png;base64,AA=="><img src="">"#
        );
        let html = remove_invalid_sources(input, &RemotePolicy::default(), &fetcher);
        assert!(html.contains(r#"<a href="cid:x">l</a>"#));
        assert!(html.contains(r#"<img data-src="x" src="data:image/png;base64,AA=="><img>"#));
    }
}

//! Depth-first traversal and lookup over the MIME tree.
//!
//! The walker flattens the tree once into the sequence of leaves, in parse
//! order. A leaf's position in that sequence is its [`LeafId`]; every
//! pipeline stage refers to parts by id.

use crate::model::mail::{LeafId, Message, PartSet};
use crate::model::part::MimePart;

/// A leaf together with its stable id.
#[derive(Debug, Clone, Copy)]
pub struct Leaf<'a> {
    pub id: LeafId,
    pub part: &'a MimePart,
}

/// Read-only view of a message's leaves.
#[derive(Debug)]
pub struct MimeWalker<'a> {
    message: &'a Message,
    leaves: Vec<&'a MimePart>,
}

impl<'a> MimeWalker<'a> {
    pub fn new(message: &'a Message) -> Self {
        let mut leaves = Vec::new();
        collect_leaves(&message.root, &mut leaves);
        Self { message, leaves }
    }

    /// The message this walker traverses.
    pub fn message(&self) -> &'a Message {
        self.message
    }

    /// All leaves in traversal order. Containers are never yielded.
    pub fn leaves(&self) -> impl Iterator<Item = Leaf<'a>> + '_ {
        self.leaves.iter().copied().enumerate().map(|(i, part)| Leaf {
            id: LeafId(i),
            part,
        })
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// `true` when the message has no leaves (an empty multipart).
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// The leaf with `id`, if it exists.
    pub fn get(&self, id: LeafId) -> Option<Leaf<'a>> {
        self.leaves.get(id.0).copied().map(|part| Leaf { id, part })
    }

    /// First leaf whose content type equals `content_type`.
    pub fn find_by_content_type(&self, content_type: &str) -> Option<Leaf<'a>> {
        self.leaves()
            .find(|leaf| leaf.part.mime_type().eq_ignore_ascii_case(content_type))
    }

    /// All leaves whose content type equals `content_type`.
    pub fn find_all_by_content_type<'s>(
        &'s self,
        content_type: &'s str,
    ) -> impl Iterator<Item = Leaf<'a>> + 's {
        self.leaves()
            .filter(move |leaf| leaf.part.mime_type().eq_ignore_ascii_case(content_type))
    }

    /// First leaf whose `Content-ID` equals `content_id` either bare or
    /// wrapped in angle brackets.
    pub fn find_by_content_id(&self, content_id: &str) -> Option<Leaf<'a>> {
        let wrapped = format!("<{content_id}>");
        self.leaves().find(|leaf| {
            leaf.part
                .content_id()
                .is_some_and(|cid| cid == content_id || cid == wrapped)
        })
    }

    /// First leaf whose `Content-Type` `name` parameter equals `name`.
    pub fn find_by_content_type_name(&self, name: &str) -> Option<Leaf<'a>> {
        self.leaves()
            .find(|leaf| leaf.part.content_type.name() == Some(name))
    }

    /// Every leaf id not contained in `excluded`.
    pub fn complement(&self, excluded: &PartSet) -> PartSet {
        self.leaves()
            .map(|leaf| leaf.id)
            .filter(|id| !excluded.contains(*id))
            .collect()
    }
}

fn collect_leaves<'a>(part: &'a MimePart, out: &mut Vec<&'a MimePart>) {
    if part.is_multipart {
        for child in &part.children {
            collect_leaves(child, out);
        }
    } else {
        out.push(part);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::part::{ContentType, HeaderMap, TransferEncoding};

    fn leaf(mime: &str, content_id: Option<&str>, payload: &[u8]) -> MimePart {
        let mut headers = HeaderMap::new();
        headers.append("Content-Type", mime);
        if let Some(cid) = content_id {
            headers.append("Content-ID", cid);
        }
        MimePart {
            content_type: ContentType::parse(mime),
            headers,
            transfer_encoding: TransferEncoding::SevenBit,
            charset: None,
            payload: payload.to_vec(),
            is_multipart: false,
            children: Vec::new(),
        }
    }

    fn container(mime: &str, children: Vec<MimePart>) -> MimePart {
        MimePart {
            content_type: ContentType::parse(mime),
            headers: HeaderMap::new(),
            transfer_encoding: TransferEncoding::SevenBit,
            charset: None,
            payload: Vec::new(),
            is_multipart: true,
            children,
        }
    }

    fn sample() -> Message {
        let root = container(
            "multipart/mixed",
            vec![
                container(
                    "multipart/alternative",
                    vec![
                        leaf("text/plain", None, b"plain"),
                        leaf("text/html", None, b"<p>html</p>"),
                    ],
                ),
                leaf("image/png; name=\"chart.png\"", Some("<chart@x>"), b"same"),
                leaf("image/png", Some("bare-id"), b"same"),
            ],
        );
        Message {
            headers: HeaderMap::new(),
            root,
        }
    }

    #[test]
    fn test_leaves_in_order_without_containers() {
        let message = sample();
        let walker = MimeWalker::new(&message);
        let types: Vec<&str> = walker.leaves().map(|l| l.part.mime_type()).collect();
        assert_eq!(types, vec!["text/plain", "text/html", "image/png", "image/png"]);
        assert_eq!(walker.len(), 4);
    }

    #[test]
    fn test_find_by_content_type() {
        let message = sample();
        let walker = MimeWalker::new(&message);
        assert_eq!(walker.find_by_content_type("text/html").unwrap().id, LeafId(1));
        assert!(walker.find_by_content_type("multipart/alternative").is_none());
        assert!(walker.find_by_content_type("application/pdf").is_none());
    }

    #[test]
    fn test_find_by_content_id_bare_and_wrapped() {
        let message = sample();
        let walker = MimeWalker::new(&message);
        assert_eq!(walker.find_by_content_id("chart@x").unwrap().id, LeafId(2));
        assert_eq!(walker.find_by_content_id("bare-id").unwrap().id, LeafId(3));
        assert!(walker.find_by_content_id("missing").is_none());
    }

    #[test]
    fn test_identical_parts_are_distinct() {
        let message = sample();
        let walker = MimeWalker::new(&message);
        let pngs: Vec<LeafId> = walker
            .find_all_by_content_type("image/png")
            .map(|l| l.id)
            .collect();
        assert_eq!(pngs, vec![LeafId(2), LeafId(3)]);
    }

    #[test]
    fn test_find_by_content_type_name() {
        let message = sample();
        let walker = MimeWalker::new(&message);
        assert_eq!(walker.find_by_content_type_name("chart.png").unwrap().id, LeafId(2));
        assert!(walker.find_by_content_type_name("other.png").is_none());
    }

    #[test]
    fn test_complement() {
        let message = sample();
        let walker = MimeWalker::new(&message);
        let used: PartSet = [LeafId(2)].into_iter().collect();
        let rest = walker.complement(&used);
        assert_eq!(rest.iter().collect::<Vec<_>>(), vec![LeafId(0), LeafId(1), LeafId(3)]);
    }
}

//! The parsed message and the leaf-identity types used to track which parts
//! each pipeline stage has claimed.

use std::collections::BTreeSet;

use super::part::{HeaderMap, MimePart};

/// A parsed email: the root of the MIME tree plus the top-level headers.
#[derive(Debug, Clone)]
pub struct Message {
    /// Top-level headers (From, To, Date, Subject, ...).
    pub headers: HeaderMap,
    /// Root of the MIME tree. For single-part messages this is the only leaf.
    pub root: MimePart,
}

/// Stable position of a leaf in the depth-first leaf sequence.
///
/// Identity of a part is its position, never its content: two leaves with
/// identical bytes have different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LeafId(pub usize);

/// An ordered set of leaves, e.g. the parts consumed by body inlining.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartSet(BTreeSet<LeafId>);

impl PartSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a leaf; returns `false` when it was already present.
    pub fn insert(&mut self, id: LeafId) -> bool {
        self.0.insert(id)
    }

    /// Whether `id` is in the set.
    pub fn contains(&self, id: LeafId) -> bool {
        self.0.contains(&id)
    }

    /// Number of leaves in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in traversal order.
    pub fn iter(&self) -> impl Iterator<Item = LeafId> + '_ {
        self.0.iter().copied()
    }

    /// Leaves in `self` that are not in `other`.
    pub fn difference(&self, other: &PartSet) -> PartSet {
        PartSet(self.0.difference(&other.0).copied().collect())
    }
}

impl FromIterator<LeafId> for PartSet {
    fn from_iter<I: IntoIterator<Item = LeafId>>(iter: I) -> Self {
        PartSet(iter.into_iter().collect())
    }
}

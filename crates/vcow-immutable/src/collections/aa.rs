//! Purely functional AA-tree rebalancing shared by lists and maps.
//!
//! Nodes are never mutated once published. A rotation allocates new nodes
//! for everything whose children or level change and reuses the rest.

use std::sync::Arc;

use crate::Timestamp;

/// Links and levels of an immutable AA-tree node.
pub(crate) trait AaNode: Sized {
    fn level(&self) -> u32;

    fn left(&self) -> Option<&Arc<Self>>;

    fn right(&self) -> Option<&Arc<Self>>;

    /// Copy of this node with new level and children. Derived aggregates
    /// (sizes, lifespans) are recomputed.
    fn relink(&self, level: u32, left: Option<Arc<Self>>, right: Option<Arc<Self>>) -> Arc<Self>;
}

/// Level of an optional subtree; nil is level 0.
pub(crate) fn level_of<N: AaNode>(node: Option<&Arc<N>>) -> u32 {
    node.map_or(0, |n| n.level())
}

/// Rotate right when the left child sits on the same level.
pub(crate) fn skew<N: AaNode>(node: Arc<N>) -> Arc<N> {
    let Some(left) = node.left() else {
        return node;
    };
    if left.level() != node.level() {
        return node;
    }

    let demoted = node.relink(node.level(), left.right().cloned(), node.right().cloned());
    left.relink(left.level(), left.left().cloned(), Some(demoted))
}

/// Rotate left and promote when two right links sit on the same level.
pub(crate) fn split<N: AaNode>(node: Arc<N>) -> Arc<N> {
    let Some(right) = node.right() else {
        return node;
    };
    if level_of(right.right()) != node.level() {
        return node;
    }

    let demoted = node.relink(node.level(), node.left().cloned(), right.left().cloned());
    right.relink(right.level() + 1, Some(demoted), right.right().cloned())
}

/// Whether one node satisfies the AA invariants relative to its children.
///
/// Used when decoding, where the shape comes from untrusted bytes.
pub(crate) fn locally_balanced<N: AaNode>(node: &N) -> bool {
    let level = node.level();
    let right = node.right();
    level >= 1
        && level_of(node.left()) < level
        && level_of(right) <= level
        && level_of(right.and_then(|r| r.right())) < level
}

/// Smallest creation time and largest deletion time in a subtree.
///
/// A subtree can only hold a slot present at `t` when
/// `first_created <= t < last_deleted`, so queries skip any subtree whose
/// lifespan excludes their time. Derived from the slots, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Lifespan {
    pub first_created: Timestamp,
    pub last_deleted: Timestamp,
}

impl Lifespan {
    /// The lifespan of a subtree with no slots.
    pub const EMPTY: Self = Self {
        first_created: Timestamp::MAX,
        last_deleted: Timestamp::MIN,
    };

    pub const fn slot(created: Timestamp, deleted: Timestamp) -> Self {
        Self {
            first_created: created,
            last_deleted: deleted,
        }
    }

    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            first_created: self.first_created.min(other.first_created),
            last_deleted: self.last_deleted.max(other.last_deleted),
        }
    }

    pub const fn may_contain(self, time: Timestamp) -> bool {
        self.first_created <= time && time < self.last_deleted
    }
}

/// Check the AA invariants over a whole tree, reporting the first violation.
#[cfg(test)]
pub(crate) fn check_balanced<N: AaNode>(node: Option<&Arc<N>>) -> Result<(), String> {
    let Some(n) = node else {
        return Ok(());
    };
    if !locally_balanced(n.as_ref()) {
        return Err(format!(
            "node at level {} has left {}, right {}, right-right {}",
            n.level(),
            level_of(n.left()),
            level_of(n.right()),
            level_of(n.right().and_then(|r| r.right())),
        ));
    }
    check_balanced(n.left())?;
    check_balanced(n.right())
}

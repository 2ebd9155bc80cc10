//! Intrusive red-black tree over index-addressed storage.
//!
//! Nodes are not owned by the tree. Each element embeds an [`RbLink`] in
//! caller-provided storage and is addressed by a [`NodeId`]; the tree only
//! rewires links through the [`RbArena`] trait. Nothing is allocated, so the
//! tree can be mutated from interrupt context.
//!
//! Placement is up to the caller: either descend manually and call
//! [`RbRoot::link_node`] followed by [`RbRoot::insert_color`], or implement
//! [`RbKeyed`] and use [`RbRoot::insert`]. Equal keys always descend right,
//! so a new element sorts after every existing element with the same key.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

mod tree;
mod validate;

use core::fmt;

pub use tree::{Iter, RbRoot};
pub use validate::Violation;

// ---------------------------------------------------------------------------
// Handles and links
// ---------------------------------------------------------------------------

/// Index of a node inside an [`RbArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates a handle for the node stored at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` does not fit in 32 bits.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(index: usize) -> Self {
        assert!(index <= u32::MAX as usize, "rbtree: node index out of range");
        Self(index as u32)
    }

    /// Returns the storage index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    /// Red node.
    Red,
    /// Black node.
    Black,
}

/// Which child slot of the parent a newly linked node occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Left child (sorts before the parent).
    Left,
    /// Right child (sorts after the parent).
    Right,
}

/// Tree linkage embedded in every element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RbLink {
    pub(crate) parent: Option<NodeId>,
    pub(crate) left: Option<NodeId>,
    pub(crate) right: Option<NodeId>,
    pub(crate) color: Color,
    pub(crate) linked: bool,
}

impl RbLink {
    /// Linkage of an element that is in no tree.
    pub const UNLINKED: Self = Self {
        parent: None,
        left: None,
        right: None,
        color: Color::Black,
        linked: false,
    };

    /// Returns `true` while the element is part of a tree.
    #[must_use]
    pub const fn is_linked(&self) -> bool {
        self.linked
    }

    /// Parent node, `None` for the root.
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Left child.
    #[must_use]
    pub const fn left(&self) -> Option<NodeId> {
        self.left
    }

    /// Right child.
    #[must_use]
    pub const fn right(&self) -> Option<NodeId> {
        self.right
    }

    /// Node color.
    #[must_use]
    pub const fn color(&self) -> Color {
        self.color
    }

    /// Resets the linkage to [`RbLink::UNLINKED`].
    pub fn clear(&mut self) {
        *self = Self::UNLINKED;
    }
}

impl Default for RbLink {
    fn default() -> Self {
        Self::UNLINKED
    }
}

// ---------------------------------------------------------------------------
// Storage traits
// ---------------------------------------------------------------------------

/// Storage that embeds one [`RbLink`] per [`NodeId`].
pub trait RbArena {
    /// Returns the linkage of `id`.
    fn link(&self, id: NodeId) -> &RbLink;

    /// Returns the linkage of `id` mutably.
    fn link_mut(&mut self, id: NodeId) -> &mut RbLink;
}

/// Storage whose elements carry an ordering key.
pub trait RbKeyed: RbArena {
    /// Sort key. Equal keys are allowed.
    type Key: Ord;

    /// Returns the key of `id`.
    fn key(&self, id: NodeId) -> Self::Key;
}

impl RbArena for [RbLink] {
    fn link(&self, id: NodeId) -> &RbLink {
        &self[id.index()]
    }

    fn link_mut(&mut self, id: NodeId) -> &mut RbLink {
        &mut self[id.index()]
    }
}

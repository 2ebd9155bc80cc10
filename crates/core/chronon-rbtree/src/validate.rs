//! Structural self-check.

use core::fmt;

use crate::{Color, NodeId, RbArena, RbKeyed, RbRoot};

/// First red-black rule found broken by [`RbRoot::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// The root is red.
    RedRoot,
    /// A red node has a red child.
    RedChild {
        /// The red parent.
        node: NodeId,
    },
    /// The two subtrees of a node have different black heights.
    BlackHeight {
        /// The unbalanced node.
        node: NodeId,
    },
    /// A child does not point back at its parent, or the root has a parent.
    ParentLink {
        /// The node with the wrong parent link.
        node: NodeId,
    },
    /// A node reachable from the root is marked unlinked.
    Unlinked {
        /// The unmarked node.
        node: NodeId,
    },
    /// An in-order neighbour has a smaller key than its predecessor.
    Order {
        /// The out-of-place node.
        node: NodeId,
    },
    /// The number of reachable nodes differs from the recorded length.
    Count {
        /// Recorded length.
        expected: usize,
        /// Nodes reachable from the root.
        found: usize,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RedRoot => f.write_str("root is red"),
            Self::RedChild { node } => write!(f, "red node {node} has a red child"),
            Self::BlackHeight { node } => write!(f, "black height mismatch below {node}"),
            Self::ParentLink { node } => write!(f, "broken parent link at {node}"),
            Self::Unlinked { node } => write!(f, "reachable node {node} is marked unlinked"),
            Self::Order { node } => write!(f, "node {node} is out of order"),
            Self::Count { expected, found } => {
                write!(f, "tree records {expected} nodes but {found} are reachable")
            }
        }
    }
}

impl core::error::Error for Violation {}

impl RbRoot {
    /// Checks every red-black invariant and returns the black height
    /// (number of black nodes on any root-to-leaf path).
    ///
    /// # Errors
    ///
    /// Returns the first [`Violation`] found.
    pub fn validate<A: RbArena + ?Sized>(&self, arena: &A) -> Result<usize, Violation> {
        let Some(root) = self.root() else {
            return if self.len() == 0 {
                Ok(0)
            } else {
                Err(Violation::Count {
                    expected: self.len(),
                    found: 0,
                })
            };
        };
        if arena.link(root).parent().is_some() {
            return Err(Violation::ParentLink { node: root });
        }
        if arena.link(root).color() == Color::Red {
            return Err(Violation::RedRoot);
        }
        let mut found = 0;
        let height = check_subtree(arena, root, &mut found)?;
        if found != self.len() {
            return Err(Violation::Count {
                expected: self.len(),
                found,
            });
        }
        Ok(height)
    }

    /// Like [`validate`](Self::validate), and also checks that in-order
    /// traversal yields non-decreasing keys.
    ///
    /// # Errors
    ///
    /// Returns the first [`Violation`] found.
    pub fn validate_order<A: RbKeyed + ?Sized>(&self, arena: &A) -> Result<usize, Violation> {
        let height = self.validate(arena)?;
        let mut iter = self.iter(arena);
        if let Some(mut prev) = iter.next() {
            for node in iter {
                if arena.key(node) < arena.key(prev) {
                    return Err(Violation::Order { node });
                }
                prev = node;
            }
        }
        Ok(height)
    }
}

fn check_subtree<A: RbArena + ?Sized>(
    arena: &A,
    node: NodeId,
    found: &mut usize,
) -> Result<usize, Violation> {
    let link = arena.link(node);
    if !link.is_linked() {
        return Err(Violation::Unlinked { node });
    }
    *found += 1;

    let mut heights = [0usize; 2];
    for (height, child) in heights.iter_mut().zip([link.left(), link.right()]) {
        let Some(child) = child else { continue };
        if arena.link(child).parent() != Some(node) {
            return Err(Violation::ParentLink { node: child });
        }
        if link.color() == Color::Red && arena.link(child).color() == Color::Red {
            return Err(Violation::RedChild { node });
        }
        *height = check_subtree(arena, child, found)?;
    }
    if heights[0] != heights[1] {
        return Err(Violation::BlackHeight { node });
    }
    Ok(heights[0] + usize::from(link.color() == Color::Black))
}

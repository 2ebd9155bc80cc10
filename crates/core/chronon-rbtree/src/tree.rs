//! Tree root and the rebalancing algorithms.

use crate::{Color, NodeId, RbArena, RbKeyed, RbLink, Side};

/// Root of an intrusive red-black tree.
///
/// Holds only the root handle and the element count; every link lives in
/// the arena passed to each operation. Passing a different arena than the
/// one the tree was built in is a logic error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RbRoot {
    node: Option<NodeId>,
    len: usize,
}

// ---------------------------------------------------------------------------
// Link helpers
// ---------------------------------------------------------------------------

#[inline]
fn is_red<A: RbArena + ?Sized>(arena: &A, node: Option<NodeId>) -> bool {
    node.is_some_and(|n| arena.link(n).color == Color::Red)
}

#[inline]
fn is_black<A: RbArena + ?Sized>(arena: &A, node: Option<NodeId>) -> bool {
    !is_red(arena, node)
}

#[inline]
fn set_color<A: RbArena + ?Sized>(arena: &mut A, node: NodeId, color: Color) {
    arena.link_mut(node).color = color;
}

impl RbRoot {
    /// Creates an empty tree.
    #[must_use]
    pub const fn new() -> Self {
        Self { node: None, len: 0 }
    }

    /// Returns the root element.
    #[must_use]
    pub const fn root(&self) -> Option<NodeId> {
        self.node
    }

    /// Number of linked elements.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no element is linked.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.node.is_none()
    }

    // -----------------------------------------------------------------------
    // Insertion
    // -----------------------------------------------------------------------

    /// Links `node` as a red leaf under `parent` (or as the root).
    ///
    /// Must be followed by [`insert_color`](Self::insert_color) to restore
    /// the red-black invariants.
    ///
    /// # Panics
    ///
    /// Panics if `node` is already linked.
    pub fn link_node<A: RbArena + ?Sized>(
        &mut self,
        arena: &mut A,
        node: NodeId,
        parent: Option<NodeId>,
        side: Side,
    ) {
        assert!(
            !arena.link(node).is_linked(),
            "rbtree: node {node} is already linked"
        );
        *arena.link_mut(node) = RbLink {
            parent,
            left: None,
            right: None,
            color: Color::Red,
            linked: true,
        };
        match parent {
            Some(p) => {
                let slot = match side {
                    Side::Left => &mut arena.link_mut(p).left,
                    Side::Right => &mut arena.link_mut(p).right,
                };
                debug_assert!(slot.is_none(), "rbtree: child slot of {p} is occupied");
                *slot = Some(node);
            }
            None => {
                debug_assert!(self.node.is_none(), "rbtree: root is occupied");
                self.node = Some(node);
            }
        }
        self.len += 1;
    }

    /// Inserts `node` in key order and rebalances.
    ///
    /// Equal keys descend right: the new element follows existing elements
    /// with the same key in traversal order.
    ///
    /// # Panics
    ///
    /// Panics if `node` is already linked.
    pub fn insert<A: RbKeyed + ?Sized>(&mut self, arena: &mut A, node: NodeId) {
        let key = arena.key(node);
        let mut parent = None;
        let mut side = Side::Left;
        let mut cursor = self.node;
        while let Some(current) = cursor {
            parent = Some(current);
            if key < arena.key(current) {
                side = Side::Left;
                cursor = arena.link(current).left;
            } else {
                side = Side::Right;
                cursor = arena.link(current).right;
            }
        }
        self.link_node(arena, node, parent, side);
        self.insert_color(arena, node);
    }

    /// Restores the red-black invariants after [`link_node`](Self::link_node).
    pub fn insert_color<A: RbArena + ?Sized>(&mut self, arena: &mut A, mut node: NodeId) {
        while let Some(mut parent) = arena.link(node).parent {
            if arena.link(parent).color != Color::Red {
                break;
            }
            let gparent = arena
                .link(parent)
                .parent
                .expect("rbtree: red node without a parent");

            if arena.link(gparent).left == Some(parent) {
                let uncle = arena.link(gparent).right;
                if let Some(uncle) = uncle.filter(|&u| arena.link(u).color == Color::Red) {
                    set_color(arena, uncle, Color::Black);
                    set_color(arena, parent, Color::Black);
                    set_color(arena, gparent, Color::Red);
                    node = gparent;
                    continue;
                }
                if arena.link(parent).right == Some(node) {
                    self.rotate_left(arena, parent);
                    core::mem::swap(&mut parent, &mut node);
                }
                set_color(arena, parent, Color::Black);
                set_color(arena, gparent, Color::Red);
                self.rotate_right(arena, gparent);
            } else {
                let uncle = arena.link(gparent).left;
                if let Some(uncle) = uncle.filter(|&u| arena.link(u).color == Color::Red) {
                    set_color(arena, uncle, Color::Black);
                    set_color(arena, parent, Color::Black);
                    set_color(arena, gparent, Color::Red);
                    node = gparent;
                    continue;
                }
                if arena.link(parent).left == Some(node) {
                    self.rotate_right(arena, parent);
                    core::mem::swap(&mut parent, &mut node);
                }
                set_color(arena, parent, Color::Black);
                set_color(arena, gparent, Color::Red);
                self.rotate_left(arena, gparent);
            }
        }
        if let Some(root) = self.node {
            set_color(arena, root, Color::Black);
        }
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    /// Unlinks `node` and rebalances. The node's link is reset to
    /// [`RbLink::UNLINKED`].
    ///
    /// # Panics
    ///
    /// Panics if `node` is not linked.
    pub fn erase<A: RbArena + ?Sized>(&mut self, arena: &mut A, node: NodeId) {
        assert!(
            arena.link(node).is_linked(),
            "rbtree: erasing unlinked node {node}"
        );
        let old = *arena.link(node);
        let child;
        let parent;
        let color;

        match (old.left, old.right) {
            (Some(old_left), Some(old_right)) => {
                // Splice the in-order successor into the erased position.
                let mut successor = old_right;
                while let Some(left) = arena.link(successor).left {
                    successor = left;
                }
                self.replace_child(arena, old.parent, node, Some(successor));

                let succ = *arena.link(successor);
                child = succ.right;
                color = succ.color;

                if succ.parent == Some(node) {
                    parent = Some(successor);
                } else {
                    let succ_parent = succ.parent.expect("rbtree: successor without a parent");
                    parent = Some(succ_parent);
                    if let Some(c) = child {
                        arena.link_mut(c).parent = Some(succ_parent);
                    }
                    arena.link_mut(succ_parent).left = child;
                    arena.link_mut(successor).right = Some(old_right);
                    arena.link_mut(old_right).parent = Some(successor);
                }

                let link = arena.link_mut(successor);
                link.parent = old.parent;
                link.color = old.color;
                link.left = Some(old_left);
                arena.link_mut(old_left).parent = Some(successor);
            }
            (left, right) => {
                child = left.or(right);
                parent = old.parent;
                color = old.color;
                if let Some(c) = child {
                    arena.link_mut(c).parent = parent;
                }
                self.replace_child(arena, parent, node, child);
            }
        }

        arena.link_mut(node).clear();
        self.len -= 1;

        if color == Color::Black {
            self.erase_color(arena, child, parent);
        }
    }

    /// Rebalances after removing a black node whose position is now held by
    /// `node` (possibly empty) under `parent`.
    fn erase_color<A: RbArena + ?Sized>(
        &mut self,
        arena: &mut A,
        mut node: Option<NodeId>,
        mut parent: Option<NodeId>,
    ) {
        while is_black(arena, node) && node != self.node {
            let p = parent.expect("rbtree: non-root position without a parent");
            if arena.link(p).left == node {
                let mut other = arena.link(p).right.expect("rbtree: missing sibling");
                if arena.link(other).color == Color::Red {
                    set_color(arena, other, Color::Black);
                    set_color(arena, p, Color::Red);
                    self.rotate_left(arena, p);
                    other = arena.link(p).right.expect("rbtree: missing sibling");
                }
                let (other_left, other_right) = (arena.link(other).left, arena.link(other).right);
                if is_black(arena, other_left) && is_black(arena, other_right) {
                    set_color(arena, other, Color::Red);
                    node = Some(p);
                    parent = arena.link(p).parent;
                } else {
                    if is_black(arena, other_right) {
                        if let Some(ol) = other_left {
                            set_color(arena, ol, Color::Black);
                        }
                        set_color(arena, other, Color::Red);
                        self.rotate_right(arena, other);
                        other = arena.link(p).right.expect("rbtree: missing sibling");
                    }
                    let parent_color = arena.link(p).color;
                    set_color(arena, other, parent_color);
                    set_color(arena, p, Color::Black);
                    if let Some(or) = arena.link(other).right {
                        set_color(arena, or, Color::Black);
                    }
                    self.rotate_left(arena, p);
                    node = self.node;
                    break;
                }
            } else {
                let mut other = arena.link(p).left.expect("rbtree: missing sibling");
                if arena.link(other).color == Color::Red {
                    set_color(arena, other, Color::Black);
                    set_color(arena, p, Color::Red);
                    self.rotate_right(arena, p);
                    other = arena.link(p).left.expect("rbtree: missing sibling");
                }
                let (other_left, other_right) = (arena.link(other).left, arena.link(other).right);
                if is_black(arena, other_left) && is_black(arena, other_right) {
                    set_color(arena, other, Color::Red);
                    node = Some(p);
                    parent = arena.link(p).parent;
                } else {
                    if is_black(arena, other_left) {
                        if let Some(or) = other_right {
                            set_color(arena, or, Color::Black);
                        }
                        set_color(arena, other, Color::Red);
                        self.rotate_left(arena, other);
                        other = arena.link(p).left.expect("rbtree: missing sibling");
                    }
                    let parent_color = arena.link(p).color;
                    set_color(arena, other, parent_color);
                    set_color(arena, p, Color::Black);
                    if let Some(ol) = arena.link(other).left {
                        set_color(arena, ol, Color::Black);
                    }
                    self.rotate_right(arena, p);
                    node = self.node;
                    break;
                }
            }
        }
        if let Some(n) = node {
            set_color(arena, n, Color::Black);
        }
    }

    /// Puts `new` in the exact position of the linked `victim` without
    /// rebalancing. The caller keeps the tree ordered: `new` must sort where
    /// `victim` did.
    ///
    /// # Panics
    ///
    /// Panics if `victim` is unlinked or `new` is linked.
    pub fn replace_node<A: RbArena + ?Sized>(&mut self, arena: &mut A, victim: NodeId, new: NodeId) {
        assert!(
            arena.link(victim).is_linked(),
            "rbtree: replacing unlinked node {victim}"
        );
        assert!(
            !arena.link(new).is_linked(),
            "rbtree: replacement {new} is already linked"
        );
        let link = *arena.link(victim);
        self.replace_child(arena, link.parent, victim, Some(new));
        if let Some(left) = link.left {
            arena.link_mut(left).parent = Some(new);
        }
        if let Some(right) = link.right {
            arena.link_mut(right).parent = Some(new);
        }
        *arena.link_mut(new) = link;
        arena.link_mut(victim).clear();
    }

    // -----------------------------------------------------------------------
    // Traversal
    // -----------------------------------------------------------------------

    /// Returns the leftmost (smallest) element.
    pub fn first<A: RbArena + ?Sized>(&self, arena: &A) -> Option<NodeId> {
        let mut node = self.node?;
        while let Some(left) = arena.link(node).left {
            node = left;
        }
        Some(node)
    }

    /// Returns the rightmost (largest) element.
    pub fn last<A: RbArena + ?Sized>(&self, arena: &A) -> Option<NodeId> {
        let mut node = self.node?;
        while let Some(right) = arena.link(node).right {
            node = right;
        }
        Some(node)
    }

    /// Returns the in-order successor of `node`, or `None` if `node` is the
    /// last element or is not linked.
    pub fn next<A: RbArena + ?Sized>(arena: &A, node: NodeId) -> Option<NodeId> {
        let link = arena.link(node);
        if !link.is_linked() {
            return None;
        }
        if let Some(mut next) = link.right {
            while let Some(left) = arena.link(next).left {
                next = left;
            }
            return Some(next);
        }
        // No right subtree: climb until we arrive from a left child.
        let mut node = node;
        let mut parent = link.parent;
        while let Some(p) = parent {
            if arena.link(p).right != Some(node) {
                break;
            }
            node = p;
            parent = arena.link(p).parent;
        }
        parent
    }

    /// Returns the in-order predecessor of `node`, or `None` if `node` is the
    /// first element or is not linked.
    pub fn prev<A: RbArena + ?Sized>(arena: &A, node: NodeId) -> Option<NodeId> {
        let link = arena.link(node);
        if !link.is_linked() {
            return None;
        }
        if let Some(mut prev) = link.left {
            while let Some(right) = arena.link(prev).right {
                prev = right;
            }
            return Some(prev);
        }
        let mut node = node;
        let mut parent = link.parent;
        while let Some(p) = parent {
            if arena.link(p).left != Some(node) {
                break;
            }
            node = p;
            parent = arena.link(p).parent;
        }
        parent
    }

    /// Iterates elements in ascending order.
    pub fn iter<'a, A: RbArena + ?Sized>(&self, arena: &'a A) -> Iter<'a, A> {
        Iter {
            arena,
            next: self.first(arena),
        }
    }

    // -----------------------------------------------------------------------
    // Rotations
    // -----------------------------------------------------------------------

    /// Points `parent`'s child slot (or the root) that held `old` at `new`.
    fn replace_child<A: RbArena + ?Sized>(
        &mut self,
        arena: &mut A,
        parent: Option<NodeId>,
        old: NodeId,
        new: Option<NodeId>,
    ) {
        match parent {
            Some(p) => {
                let link = arena.link_mut(p);
                if link.left == Some(old) {
                    link.left = new;
                } else {
                    link.right = new;
                }
            }
            None => self.node = new,
        }
    }

    fn rotate_left<A: RbArena + ?Sized>(&mut self, arena: &mut A, node: NodeId) {
        let right = arena
            .link(node)
            .right
            .expect("rbtree: rotate_left without a right child");
        let parent = arena.link(node).parent;
        let right_left = arena.link(right).left;

        arena.link_mut(node).right = right_left;
        if let Some(rl) = right_left {
            arena.link_mut(rl).parent = Some(node);
        }
        arena.link_mut(right).left = Some(node);
        arena.link_mut(right).parent = parent;
        self.replace_child(arena, parent, node, Some(right));
        arena.link_mut(node).parent = Some(right);
    }

    fn rotate_right<A: RbArena + ?Sized>(&mut self, arena: &mut A, node: NodeId) {
        let left = arena
            .link(node)
            .left
            .expect("rbtree: rotate_right without a left child");
        let parent = arena.link(node).parent;
        let left_right = arena.link(left).right;

        arena.link_mut(node).left = left_right;
        if let Some(lr) = left_right {
            arena.link_mut(lr).parent = Some(node);
        }
        arena.link_mut(left).right = Some(node);
        arena.link_mut(left).parent = parent;
        self.replace_child(arena, parent, node, Some(left));
        arena.link_mut(node).parent = Some(left);
    }
}

/// In-order iterator returned by [`RbRoot::iter`].
pub struct Iter<'a, A: ?Sized> {
    arena: &'a A,
    next: Option<NodeId>,
}

impl<A: RbArena + ?Sized> Iterator for Iter<'_, A> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = RbRoot::next(self.arena, current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Keys plus links, the shape a timer pool has.
    struct Pool {
        links: Vec<RbLink>,
        keys: Vec<i64>,
    }

    impl Pool {
        fn with_keys(keys: &[i64]) -> Self {
            Self {
                links: vec![RbLink::UNLINKED; keys.len()],
                keys: keys.to_vec(),
            }
        }

        fn ordered_keys(&self, root: &RbRoot) -> Vec<i64> {
            root.iter(self).map(|id| self.keys[id.index()]).collect()
        }
    }

    impl RbArena for Pool {
        fn link(&self, id: NodeId) -> &RbLink {
            &self.links[id.index()]
        }

        fn link_mut(&mut self, id: NodeId) -> &mut RbLink {
            &mut self.links[id.index()]
        }
    }

    impl RbKeyed for Pool {
        type Key = i64;

        fn key(&self, id: NodeId) -> i64 {
            self.keys[id.index()]
        }
    }

    /// Deterministic xorshift64 so failures are reproducible.
    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self) -> u64 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;
            x
        }
    }

    fn id(index: usize) -> NodeId {
        NodeId::new(index)
    }

    // -----------------------------------------------------------------------
    // Insertion
    // -----------------------------------------------------------------------

    #[test]
    fn empty_tree() {
        let pool = Pool::with_keys(&[]);
        let root = RbRoot::new();
        assert!(root.is_empty());
        assert_eq!(root.first(&pool), None);
        assert_eq!(root.last(&pool), None);
        assert_eq!(root.validate(&pool), Ok(0));
    }

    #[test]
    fn ascending_inserts_stay_balanced() {
        let keys: Vec<i64> = (0..256).collect();
        let mut pool = Pool::with_keys(&keys);
        let mut root = RbRoot::new();
        for i in 0..keys.len() {
            root.insert(&mut pool, id(i));
            root.validate_order(&pool).unwrap();
        }
        assert_eq!(root.len(), 256);
        assert_eq!(pool.ordered_keys(&root), keys);
        // 256 nodes fit within a black height of log2(257).
        assert!(root.validate(&pool).unwrap() <= 9);
    }

    #[test]
    fn descending_inserts_stay_balanced() {
        let keys: Vec<i64> = (0..200).rev().collect();
        let mut pool = Pool::with_keys(&keys);
        let mut root = RbRoot::new();
        for i in 0..keys.len() {
            root.insert(&mut pool, id(i));
        }
        root.validate_order(&pool).unwrap();
        assert_eq!(root.first(&pool), Some(id(199)));
        assert_eq!(root.last(&pool), Some(id(0)));
    }

    #[test]
    fn equal_keys_keep_insertion_order() {
        let mut pool = Pool::with_keys(&[5, 5, 3, 5, 7]);
        let mut root = RbRoot::new();
        for i in 0..5 {
            root.insert(&mut pool, id(i));
        }
        let order: Vec<usize> = root.iter(&pool).map(NodeId::index).collect();
        assert_eq!(order, [2, 0, 1, 3, 4]);
    }

    #[test]
    fn reinserted_equal_key_moves_behind() {
        let mut pool = Pool::with_keys(&[5, 5, 5]);
        let mut root = RbRoot::new();
        for i in 0..3 {
            root.insert(&mut pool, id(i));
        }
        root.erase(&mut pool, id(0));
        root.insert(&mut pool, id(0));
        let order: Vec<usize> = root.iter(&pool).map(NodeId::index).collect();
        assert_eq!(order, [1, 2, 0]);
    }

    #[test]
    fn manual_placement() {
        let mut links = [RbLink::UNLINKED; 3];
        let mut root = RbRoot::new();
        root.link_node(&mut links[..], id(1), None, Side::Left);
        root.insert_color(&mut links[..], id(1));
        root.link_node(&mut links[..], id(0), Some(id(1)), Side::Left);
        root.insert_color(&mut links[..], id(0));
        root.link_node(&mut links[..], id(2), Some(id(1)), Side::Right);
        root.insert_color(&mut links[..], id(2));

        assert_eq!(root.validate(&links[..]), Ok(1));
        let order: Vec<usize> = root.iter(&links[..]).map(NodeId::index).collect();
        assert_eq!(order, [0, 1, 2]);
        assert_eq!(links[1].color(), Color::Black);
        assert_eq!(links[0].color(), Color::Red);
    }

    #[test]
    #[should_panic(expected = "already linked")]
    fn double_link_is_fatal() {
        let mut pool = Pool::with_keys(&[1]);
        let mut root = RbRoot::new();
        root.insert(&mut pool, id(0));
        root.insert(&mut pool, id(0));
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    #[test]
    fn erase_every_position() {
        for victim in 0..31 {
            let keys: Vec<i64> = (0..31).collect();
            let mut pool = Pool::with_keys(&keys);
            let mut root = RbRoot::new();
            for i in 0..keys.len() {
                root.insert(&mut pool, id(i));
            }
            root.erase(&mut pool, id(victim));
            root.validate_order(&pool).unwrap();
            assert!(!pool.links[victim].is_linked());
            let expected: Vec<i64> = keys.iter().copied().filter(|&k| k != victim as i64).collect();
            assert_eq!(pool.ordered_keys(&root), expected);
        }
    }

    #[test]
    fn erase_to_empty() {
        let mut pool = Pool::with_keys(&[3, 1, 2]);
        let mut root = RbRoot::new();
        for i in 0..3 {
            root.insert(&mut pool, id(i));
        }
        for i in 0..3 {
            root.erase(&mut pool, id(i));
            root.validate(&pool).unwrap();
        }
        assert!(root.is_empty());
        assert_eq!(root.len(), 0);
        assert_eq!(root.first(&pool), None);
    }

    #[test]
    #[should_panic(expected = "erasing unlinked")]
    fn erase_unlinked_is_fatal() {
        let mut pool = Pool::with_keys(&[1, 2]);
        let mut root = RbRoot::new();
        root.insert(&mut pool, id(0));
        root.erase(&mut pool, id(1));
    }

    #[test]
    fn random_insert_erase_sequences() {
        const SLOTS: usize = 128;
        let mut rng = XorShift(0x9E37_79B9_7F4A_7C15);
        let mut pool = Pool::with_keys(&[0; SLOTS]);
        let mut root = RbRoot::new();

        for _ in 0..5_000 {
            let slot = (rng.next() % SLOTS as u64) as usize;
            if pool.links[slot].is_linked() {
                root.erase(&mut pool, id(slot));
            } else {
                // Narrow key range forces plenty of duplicates.
                pool.keys[slot] = (rng.next() % 64) as i64;
                root.insert(&mut pool, id(slot));
            }
            root.validate_order(&pool).unwrap();
        }

        let linked = pool.links.iter().filter(|l| l.is_linked()).count();
        assert_eq!(root.len(), linked);
        let keys = pool.ordered_keys(&root);
        assert!(keys.windows(2).all(|w| w[0] <= w[1]));
    }

    // -----------------------------------------------------------------------
    // Traversal and replacement
    // -----------------------------------------------------------------------

    #[test]
    fn next_and_prev_walk_both_directions() {
        let keys = [40, 10, 30, 20, 50];
        let mut pool = Pool::with_keys(&keys);
        let mut root = RbRoot::new();
        for i in 0..keys.len() {
            root.insert(&mut pool, id(i));
        }

        let mut forward = Vec::new();
        let mut cursor = root.first(&pool);
        while let Some(node) = cursor {
            forward.push(pool.keys[node.index()]);
            cursor = RbRoot::next(&pool, node);
        }
        assert_eq!(forward, [10, 20, 30, 40, 50]);

        let mut backward = Vec::new();
        let mut cursor = root.last(&pool);
        while let Some(node) = cursor {
            backward.push(pool.keys[node.index()]);
            cursor = RbRoot::prev(&pool, node);
        }
        assert_eq!(backward, [50, 40, 30, 20, 10]);
    }

    #[test]
    fn unlinked_node_has_no_neighbours() {
        let mut pool = Pool::with_keys(&[1, 2]);
        let mut root = RbRoot::new();
        root.insert(&mut pool, id(0));
        assert_eq!(RbRoot::next(&pool, id(1)), None);
        assert_eq!(RbRoot::prev(&pool, id(1)), None);
    }

    #[test]
    fn replace_node_takes_over_position() {
        let mut pool = Pool::with_keys(&[10, 20, 30, 20]);
        let mut root = RbRoot::new();
        for i in 0..3 {
            root.insert(&mut pool, id(i));
        }
        let before = root.validate(&pool).unwrap();

        root.replace_node(&mut pool, id(1), id(3));

        assert!(!pool.links[1].is_linked());
        assert!(pool.links[3].is_linked());
        assert_eq!(root.len(), 3);
        assert_eq!(root.validate(&pool), Ok(before));
        let order: Vec<usize> = root.iter(&pool).map(NodeId::index).collect();
        assert_eq!(order, [0, 3, 2]);
    }
}

use std::cmp::Ordering;

use lrpick_error::{PickError, Result};

/// Handle to a node in the tree's arena.
///
/// Handles are only meaningful for the tree that produced them and are
/// invalidated by the next structural mutation of that tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(u32);

/// Arena slot 0 is a sentinel standing in for every absent child. It is
/// black and carries identity aggregates, so size and generation rollups
/// never need to special-case missing children.
const NIL: NodeId = NodeId(0);

#[derive(Debug)]
struct Node {
    key: String,
    generation: i64,
    red: bool,
    /// Nodes in the subtree rooted here, including this node.
    size: u32,
    min_gen: i64,
    max_gen: i64,
    parent: NodeId,
    left: NodeId,
    right: NodeId,
}

impl Node {
    fn sentinel() -> Self {
        Self {
            key: String::new(),
            generation: 0,
            red: false,
            size: 0,
            min_gen: i64::MAX,
            max_gen: i64::MIN,
            parent: NIL,
            left: NIL,
            right: NIL,
        }
    }

    fn leaf(key: String, generation: i64) -> Self {
        Self {
            key,
            generation,
            red: true,
            size: 1,
            min_gen: generation,
            max_gen: generation,
            parent: NIL,
            left: NIL,
            right: NIL,
        }
    }
}

/// An ordered, indexed red-black tree of `(key, generation)` pairs.
///
/// Beyond the usual dictionary operations it supports the selection
/// primitive [`find_next`](Self::find_next): the first in-order node at or
/// after a given rank whose generation does not exceed a threshold,
/// wrapping around to rank zero. All single-key operations are `O(log n)`.
#[derive(Debug)]
pub struct GenTree {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    root: NodeId,
    len: usize,
}

impl Default for GenTree {
    fn default() -> Self {
        Self::new()
    }
}

impl GenTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::sentinel()],
            free: Vec::new(),
            root: NIL,
            len: 0,
        }
    }

    /// Number of keys in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true when the tree holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The minimum and maximum generations over the whole tree, or `(0, 0)`
    /// when the tree is empty.
    #[must_use]
    pub fn generations(&self) -> (i64, i64) {
        if self.root == NIL {
            (0, 0)
        } else {
            let root = self.node(self.root);
            (root.min_gen, root.max_gen)
        }
    }

    /// The key stored at `id`.
    #[must_use]
    pub fn key_of(&self, id: NodeId) -> &str {
        &self.node(id).key
    }

    /// The generation stored at `id`.
    #[must_use]
    pub fn generation_of(&self, id: NodeId) -> i64 {
        self.node(id).generation
    }

    /// Inserts a key with the given generation.
    ///
    /// Returns false and leaves the tree untouched when the key is already
    /// present.
    pub fn insert(&mut self, key: String, generation: i64) -> bool {
        if self.root == NIL {
            let id = self.alloc(key, generation);
            self.node_mut(id).red = false;
            self.root = id;
            self.len += 1;
            return true;
        }

        // Find the attachment point for the new node.
        let mut current = self.root;
        let mut parent = NIL;
        while current != NIL {
            match key.as_str().cmp(self.node(current).key.as_str()) {
                Ordering::Equal => return false,
                Ordering::Less => {
                    parent = current;
                    current = self.node(current).left;
                }
                Ordering::Greater => {
                    parent = current;
                    current = self.node(current).right;
                }
            }
        }

        let id = self.alloc(key, generation);
        self.len += 1;
        self.node_mut(id).parent = parent;
        if self.node(id).key < self.node(parent).key {
            self.node_mut(parent).left = id;
        } else {
            self.node_mut(parent).right = id;
        }

        // Fold the new node into the size and generation aggregates of
        // every ancestor.
        let mut walk = parent;
        while walk != NIL {
            let node = self.node_mut(walk);
            node.size += 1;
            if generation > node.max_gen {
                node.max_gen = generation;
            }
            if generation < node.min_gen {
                node.min_gen = generation;
            }
            walk = node.parent;
        }

        self.fix_after_insert(id);
        true
    }

    /// Removes a key, returning whether it was present.
    pub fn delete(&mut self, key: &str) -> bool {
        if self.root == NIL {
            return false;
        }

        let mut target = self.root;
        loop {
            if target == NIL {
                return false;
            }
            match key.cmp(self.node(target).key.as_str()) {
                Ordering::Equal => break,
                Ordering::Less => target = self.node(target).left,
                Ordering::Greater => target = self.node(target).right,
            }
        }

        self.len -= 1;

        if self.node(target).left != NIL && self.node(target).right != NIL {
            // Swap payload with the in-order successor so the node to
            // physically unlink has at most one child. Aggregates along the
            // path are refreshed by the ancestor walk below.
            let mut successor = self.node(target).right;
            while self.node(successor).left != NIL {
                successor = self.node(successor).left;
            }

            let (ti, si) = (target.0 as usize, successor.0 as usize);
            let key = std::mem::take(&mut self.nodes[ti].key);
            self.nodes[ti].key = std::mem::replace(&mut self.nodes[si].key, key);
            let generation = self.nodes[ti].generation;
            self.nodes[ti].generation = self.nodes[si].generation;
            self.nodes[si].generation = generation;

            target = successor;
        }

        let parent = self.node(target).parent;
        if parent == NIL {
            // Removing the root with at most one child; the child (if any)
            // is already internally consistent.
            let child = if self.node(target).left != NIL {
                self.node(target).left
            } else {
                self.node(target).right
            };
            self.root = child;
            if child != NIL {
                self.node_mut(child).parent = NIL;
                self.node_mut(child).red = false;
            }
            self.release(target);
            return true;
        }

        let child = if self.node(target).left != NIL {
            self.node(target).left
        } else {
            self.node(target).right
        };

        if self.node(target).red || self.is_red(child) {
            // A red node, or a black node with a red child, unlinks without
            // disturbing black heights.
            if self.node(parent).left == target {
                self.node_mut(parent).left = child;
            } else {
                self.node_mut(parent).right = child;
            }
            if child != NIL {
                self.node_mut(child).red = false;
                self.node_mut(child).parent = parent;
            }
        } else {
            self.fix_before_delete(target);
            // Rotations during the fixup may have reparented the target.
            let parent = self.node(target).parent;
            if self.node(parent).left == target {
                self.node_mut(parent).left = NIL;
            } else {
                self.node_mut(parent).right = NIL;
            }
        }

        let start = self.node(target).parent;
        self.recalc_ancestors(start);
        self.release(target);
        true
    }

    /// Looks up a key.
    #[must_use]
    pub fn find(&self, key: &str) -> Option<NodeId> {
        let mut current = self.root;
        while current != NIL {
            match key.cmp(self.node(current).key.as_str()) {
                Ordering::Equal => return Some(current),
                Ordering::Less => current = self.node(current).left,
                Ordering::Greater => current = self.node(current).right,
            }
        }
        None
    }

    /// The selection primitive: the first node in in-order position `index`
    /// or later whose generation is at most `threshold`, wrapping around to
    /// position zero if the tail of the tree has no candidate.
    ///
    /// A matching node always exists when `threshold` is at least the root's
    /// minimum generation; failing to find one (or being handed an
    /// out-of-range index) means the aggregates are inconsistent, which is
    /// reported as [`PickError::Corrupt`].
    pub fn find_next(&self, index: usize, threshold: i64) -> Result<NodeId> {
        if index >= self.len {
            return Err(PickError::Corrupt);
        }
        if threshold < self.node(self.root).min_gen {
            return Err(PickError::Corrupt);
        }

        let mut found = self.find_above(self.root, index as i64, threshold);
        if found == NIL && index != 0 {
            found = self.find_above(self.root, 0, threshold);
        }
        if found == NIL {
            return Err(PickError::Corrupt);
        }
        Ok(found)
    }

    // Recursive descent for `find_next`. A negative `index` means any node
    // in this subtree is at or past the requested rank. Depth is bounded by
    // the tree height, so recursion stays within 2·lg(n) frames.
    fn find_above(&self, id: NodeId, index: i64, threshold: i64) -> NodeId {
        if self.node(id).min_gen > threshold {
            // Covers the sentinel: its minimum generation is i64::MAX.
            return NIL;
        }

        let node = self.node(id);
        let left_size = i64::from(self.node(node.left).size);

        if index < left_size {
            let found = self.find_above(node.left, index, threshold);
            if found != NIL {
                return found;
            }
        }

        if index <= left_size && node.generation <= threshold {
            return id;
        }

        self.find_above(node.right, index - (left_size + 1), threshold)
    }

    /// Rewrites the generation at `id` and refreshes the aggregates along
    /// its ancestor chain.
    pub fn set_generation(&mut self, id: NodeId, generation: i64) {
        self.node_mut(id).generation = generation;
        self.recalc_ancestors(id);
    }

    /// All keys in ascending order.
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.len);
        self.collect_in_order(self.root, &mut out);
        out
    }

    /// Drops every node and returns the tree to its freshly-created state.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.nodes.push(Node::sentinel());
        self.free.clear();
        self.root = NIL;
        self.len = 0;
    }

    fn collect_in_order(&self, id: NodeId, out: &mut Vec<String>) {
        if id == NIL {
            return;
        }
        let node = self.node(id);
        self.collect_in_order(node.left, out);
        out.push(node.key.clone());
        self.collect_in_order(node.right, out);
    }

    fn fix_after_insert(&mut self, mut current: NodeId) {
        let mut parent = self.node(current).parent;
        while parent != NIL {
            if !self.node(parent).red {
                return;
            }

            // A red parent is never the root, so the grandparent exists.
            let grandparent = self.node(parent).parent;
            let uncle = self.other_child(grandparent, parent);
            if self.is_red(uncle) {
                self.node_mut(parent).red = false;
                self.node_mut(uncle).red = false;
                self.node_mut(grandparent).red = true;
                current = grandparent;
                parent = self.node(current).parent;
                continue;
            }

            if self.node(grandparent).left == parent {
                if self.node(parent).right == current {
                    self.rotate_left(parent);
                    parent = current;
                }
                self.rotate_right(grandparent);
            } else {
                if self.node(parent).left == current {
                    self.rotate_right(parent);
                    parent = current;
                }
                self.rotate_left(grandparent);
            }
            self.node_mut(parent).red = false;
            self.node_mut(grandparent).red = true;
            return;
        }
        // The new node became the root, which must be black.
        self.node_mut(current).red = false;
    }

    // Only called for a black non-root node about to be unlinked, which
    // therefore always has a sibling.
    fn fix_before_delete(&mut self, mut current: NodeId) {
        loop {
            let parent = self.node(current).parent;
            if parent == NIL {
                return;
            }

            let sibling = self.other_child(parent, current);
            if self.node(sibling).red {
                // Rotate a red sibling into the parent's position so the
                // remaining cases see a black sibling.
                self.node_mut(parent).red = true;
                self.node_mut(sibling).red = false;
                if self.node(parent).left == current {
                    self.rotate_left(parent);
                } else {
                    self.rotate_right(parent);
                }
            }

            let sibling = self.other_child(parent, current);
            let sibling_left = self.node(sibling).left;
            let sibling_right = self.node(sibling).right;
            let parent_red = self.node(parent).red;
            let sibling_red = self.node(sibling).red;

            if !parent_red
                && !sibling_red
                && !self.is_red(sibling_left)
                && !self.is_red(sibling_right)
            {
                // Everything local is black: shorten the sibling's side too
                // and push the deficit one level up.
                self.node_mut(sibling).red = true;
                current = parent;
                continue;
            }

            if parent_red
                && !sibling_red
                && !self.is_red(sibling_left)
                && !self.is_red(sibling_right)
            {
                // Trading the parent's red for a red sibling rebalances the
                // black counts on both sides.
                self.node_mut(sibling).red = true;
                self.node_mut(parent).red = false;
                return;
            }

            if !sibling_red {
                // A lone inner red child of the sibling rotates outward so
                // the final rotation below can recolor it.
                if self.node(parent).left == current
                    && !self.is_red(sibling_right)
                    && self.is_red(sibling_left)
                {
                    self.node_mut(sibling).red = true;
                    self.node_mut(sibling_left).red = false;
                    self.rotate_right(sibling);
                } else if self.node(parent).right == current
                    && !self.is_red(sibling_left)
                    && self.is_red(sibling_right)
                {
                    self.node_mut(sibling).red = true;
                    self.node_mut(sibling_right).red = false;
                    self.rotate_left(sibling);
                }
            }

            // The sibling is red or has a red outer child. Rotate it into
            // the parent's position, taking over the parent's color.
            let sibling = self.other_child(parent, current);
            let parent_red = self.node(parent).red;
            self.node_mut(sibling).red = parent_red;
            self.node_mut(parent).red = false;
            if self.node(parent).left == current {
                let outer = self.node(sibling).right;
                if outer != NIL {
                    self.node_mut(outer).red = false;
                }
                self.rotate_left(parent);
            } else {
                let outer = self.node(sibling).left;
                if outer != NIL {
                    self.node_mut(outer).red = false;
                }
                self.rotate_right(parent);
            }
            return;
        }
    }

    fn rotate_left(&mut self, pivot: NodeId) {
        let right = self.node(pivot).right;
        let moved = self.node(right).left;
        self.node_mut(pivot).right = moved;
        if moved != NIL {
            self.node_mut(moved).parent = pivot;
        }
        let above = self.node(pivot).parent;
        self.node_mut(right).left = pivot;
        self.node_mut(right).parent = above;
        self.node_mut(pivot).parent = right;
        if above != NIL {
            if self.node(above).right == pivot {
                self.node_mut(above).right = right;
            } else {
                self.node_mut(above).left = right;
            }
        } else {
            self.root = right;
        }

        self.recalc(pivot);
        self.recalc(right);
    }

    fn rotate_right(&mut self, pivot: NodeId) {
        let left = self.node(pivot).left;
        let moved = self.node(left).right;
        self.node_mut(pivot).left = moved;
        if moved != NIL {
            self.node_mut(moved).parent = pivot;
        }
        let above = self.node(pivot).parent;
        self.node_mut(left).right = pivot;
        self.node_mut(left).parent = above;
        self.node_mut(pivot).parent = left;
        if above != NIL {
            if self.node(above).right == pivot {
                self.node_mut(above).right = left;
            } else {
                self.node_mut(above).left = left;
            }
        } else {
            self.root = left;
        }

        self.recalc(pivot);
        self.recalc(left);
    }

    /// Recomputes size and generation aggregates for one node from its
    /// children. The sentinel's identity aggregates make absent children
    /// fall out of the min/max naturally.
    fn recalc(&mut self, id: NodeId) {
        let node = self.node(id);
        let (left, right) = (node.left, node.right);
        let generation = node.generation;

        let left_node = self.node(left);
        let (lsize, lmin, lmax) = (left_node.size, left_node.min_gen, left_node.max_gen);
        let right_node = self.node(right);
        let (rsize, rmin, rmax) = (right_node.size, right_node.min_gen, right_node.max_gen);

        let node = self.node_mut(id);
        node.size = 1 + lsize + rsize;
        node.min_gen = generation.min(lmin).min(rmin);
        node.max_gen = generation.max(lmax).max(rmax);
    }

    fn recalc_ancestors(&mut self, mut id: NodeId) {
        while id != NIL {
            self.recalc(id);
            id = self.node(id).parent;
        }
    }

    fn other_child(&self, parent: NodeId, child: NodeId) -> NodeId {
        let node = self.node(parent);
        if node.left == child {
            node.right
        } else {
            node.left
        }
    }

    fn is_red(&self, id: NodeId) -> bool {
        self.node(id).red
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    fn alloc(&mut self, key: String, generation: i64) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                *self.node_mut(id) = Node::leaf(key, generation);
                id
            }
            None => {
                debug_assert!(self.nodes.len() < u32::MAX as usize);
                let id = NodeId(self.nodes.len() as u32);
                self.nodes.push(Node::leaf(key, generation));
                id
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        let node = self.node_mut(id);
        node.key = String::new();
        node.parent = NIL;
        node.left = NIL;
        node.right = NIL;
        self.free.push(id);
    }
}

#[cfg(test)]
impl GenTree {
    /// Brute-force structural validation used by the invariant tests.
    ///
    /// Panics if any red-black, ordering, or aggregate invariant is broken.
    pub(crate) fn assert_invariants(&self) {
        if self.root == NIL {
            assert_eq!(self.len, 0, "empty tree must report len 0");
            return;
        }
        assert!(!self.node(self.root).red, "root must be black");
        assert_eq!(
            self.node(self.root).parent,
            NIL,
            "root must have no parent"
        );

        let (size, _, _, _) = self.validate_subtree(self.root);
        assert_eq!(self.len, size as usize, "len must equal the root size");
        assert_eq!(self.node(self.root).size, size);

        let values = self.values();
        for pair in values.windows(2) {
            assert!(pair[0] < pair[1], "in-order keys must strictly ascend");
        }
    }

    /// Returns `(size, min_gen, max_gen, black_height)` computed from
    /// scratch, asserting the stored aggregates along the way.
    fn validate_subtree(&self, id: NodeId) -> (u32, i64, i64, u32) {
        if id == NIL {
            return (0, i64::MAX, i64::MIN, 1);
        }
        let node = self.node(id);

        if node.red {
            assert!(
                !self.is_red(node.left) && !self.is_red(node.right),
                "red node {:?} has a red child",
                node.key
            );
        }
        for child in [node.left, node.right] {
            if child != NIL {
                assert_eq!(
                    self.node(child).parent,
                    id,
                    "child parent link must point back"
                );
            }
        }

        let (lsize, lmin, lmax, lblack) = self.validate_subtree(node.left);
        let (rsize, rmin, rmax, rblack) = self.validate_subtree(node.right);
        assert_eq!(lblack, rblack, "black heights must match at {:?}", node.key);

        let size = 1 + lsize + rsize;
        let min_gen = node.generation.min(lmin).min(rmin);
        let max_gen = node.generation.max(lmax).max(rmax);
        assert_eq!(node.size, size, "stored size disagrees at {:?}", node.key);
        assert_eq!(node.min_gen, min_gen, "stored min_gen disagrees at {:?}", node.key);
        assert_eq!(node.max_gen, max_gen, "stored max_gen disagrees at {:?}", node.key);

        let black = lblack + u32::from(!node.red);
        (size, min_gen, max_gen, black)
    }
}

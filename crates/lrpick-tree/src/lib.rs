//! Order-indexed red-black tree with per-subtree generation aggregates.
//!
//! [`GenTree`] is the index backing every picker: a balanced BST keyed by
//! string, where each node additionally tracks the size, minimum generation,
//! and maximum generation of its subtree. The aggregates make the selection
//! primitive [`GenTree::find_next`] logarithmic: any subtree whose minimum
//! generation exceeds the search threshold is pruned whole.
//!
//! Nodes live in an arena and link to each other through integer handles,
//! so the parent/child cycles never involve owning references.

mod tree;

#[cfg(test)]
mod tree_invariant_tests;

pub use tree::{GenTree, NodeId};

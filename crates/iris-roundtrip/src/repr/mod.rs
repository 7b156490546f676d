//! Canonical tree and forest representations.
//!
//! Both model families share this representation: boosted models use
//! [`ScalarLeaf`] trees, random forests use [`VectorLeaf`] trees.

/// Canonical node identifier.
///
/// Internally this is just an index into the tree's SoA arrays.
pub type NodeId = u32;

pub mod forest;
pub mod leaf;
pub mod mutable_tree;
pub mod tree;

pub use forest::{Forest, ForestValidationError};
pub use leaf::{LeafValue, ScalarLeaf, VectorLeaf};
pub use mutable_tree::MutableTree;
pub use tree::{Tree, TreeValidationError, TreeView};

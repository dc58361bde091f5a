//! The sparse fixed-height tree and its proof helpers.

use std::collections::HashMap;
use std::fmt::Debug;
use std::marker::PhantomData;

use log::trace;
use serde::Serialize;
use tenor_primitives::{FieldHasher, Fr};
use thiserror::Error;

/// Stores the result of tree operations. Returns an [`SmtError`] upon
/// failure.
pub type SmtResult<T> = Result<T, SmtError>;

/// An error type for sparse-tree operations.
///
/// Every variant indicates a construction or call-site defect, never a
/// recoverable data condition.
#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum SmtError {
    /// A node id mapped to a level outside the tree's default table. Only
    /// reachable through an id larger than the tree can contain.
    #[error("Node id {node_id} lies on level {level}, but the tree height is {height}")]
    LevelOutOfRange {
        /// The offending 1-based node id.
        node_id: u64,
        /// The level the id maps to.
        level: u32,
        /// The tree height.
        height: u32,
    },

    /// A leaf index at or beyond `2^height`.
    #[error("Leaf id {leaf_id} is out of range for a tree of height {height}")]
    LeafOutOfRange {
        /// The offending leaf index.
        leaf_id: u64,
        /// The tree height.
        height: u32,
    },
}

/// A sparse complete binary Merkle tree of fixed height over field-element
/// leaves.
///
/// Nodes use 1-based complete-binary-tree numbering: the root is node `1`,
/// the children of node `n` are `2n` and `2n + 1`, and leaf `i` is node
/// `i + 2^height`. Only written nodes are stored; an absent node equals the
/// cached default hash for its level, where the leaf-level default is the
/// configured default leaf and each internal default is
/// `hash([child_default, child_default])`.
#[derive(Clone, Debug, Serialize)]
pub struct SmtTree<H: FieldHasher> {
    height: u32,
    nodes: HashMap<u64, Fr>,
    /// Default hash per level, index 0 = root level, index `height` = leaves.
    level_defaults: Vec<Fr>,
    #[serde(skip)]
    _hasher: PhantomData<H>,
}

impl<H: FieldHasher> SmtTree<H> {
    /// Builds a tree of the given height whose unwritten leaves all equal
    /// `default_leaf`, then writes `leaves[i]` at leaf `i` in index order.
    pub fn new(leaves: &[Fr], height: u32, default_leaf: Fr) -> SmtResult<Self> {
        let mut level_defaults = vec![Fr::zero(); height as usize + 1];
        level_defaults[height as usize] = default_leaf;
        for level in (0..height as usize).rev() {
            let child = level_defaults[level + 1];
            level_defaults[level] = H::hash2(child, child);
        }

        let mut tree = SmtTree {
            height,
            nodes: HashMap::new(),
            level_defaults,
            _hasher: PhantomData,
        };
        for (i, leaf) in leaves.iter().enumerate() {
            tree.update_leaf(i as u64, *leaf)?;
        }
        Ok(tree)
    }

    /// The tree height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The configured default leaf value.
    pub fn default_leaf(&self) -> Fr {
        self.level_defaults[self.height as usize]
    }

    /// The root of an all-default tree of this height.
    pub fn default_root(&self) -> Fr {
        self.level_defaults[0]
    }

    /// The tree-internal node id of leaf `i`.
    fn node_id(&self, leaf_id: u64) -> u64 {
        leaf_id + (1u64 << self.height)
    }

    fn check_leaf_id(&self, leaf_id: u64) -> SmtResult<()> {
        if leaf_id >= 1u64 << self.height {
            return Err(SmtError::LeafOutOfRange {
                leaf_id,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Returns the stored value of the node, or the default hash for its
    /// level if it was never written.
    pub fn node(&self, node_id: u64) -> SmtResult<Fr> {
        if let Some(v) = self.nodes.get(&node_id) {
            return Ok(*v);
        }
        let level = node_id.ilog2();
        self.level_defaults
            .get(level as usize)
            .copied()
            .ok_or(SmtError::LevelOutOfRange {
                node_id,
                level,
                height: self.height,
            })
    }

    /// The current root.
    pub fn root(&self) -> Fr {
        self.nodes.get(&1).copied().unwrap_or(self.level_defaults[0])
    }

    /// The value of leaf `i`.
    pub fn leaf(&self, leaf_id: u64) -> SmtResult<Fr> {
        self.check_leaf_id(leaf_id)?;
        self.node(self.node_id(leaf_id))
    }

    /// The Merkle proof for leaf `i`: the sibling hash at every level on the
    /// path from the leaf to the root, ordered leaf to root.
    pub fn proof(&self, leaf_id: u64) -> SmtResult<Vec<Fr>> {
        self.check_leaf_id(leaf_id)?;
        let mut prf = Vec::with_capacity(self.height as usize);
        let mut id = self.node_id(leaf_id);
        while id > 1 {
            let sibling = if id % 2 == 0 { id + 1 } else { id - 1 };
            prf.push(self.node(sibling)?);
            id >>= 1;
        }
        Ok(prf)
    }

    /// Writes `value` at leaf `i` and recomputes every ancestor up to the
    /// root. O(height) hash invocations; no full rehash.
    pub fn update_leaf(&mut self, leaf_id: u64, value: Fr) -> SmtResult<()> {
        let prf = self.proof(leaf_id)?;
        let mut id = self.node_id(leaf_id);
        trace!("smt update: leaf_id={leaf_id} node_id={id} value={value}");
        self.nodes.insert(id, value);
        for sibling in prf {
            let current = self.node(id)?;
            let parent = if id % 2 == 0 {
                H::hash2(current, sibling)
            } else {
                H::hash2(sibling, current)
            };
            id >>= 1;
            self.nodes.insert(id, parent);
        }
        Ok(())
    }
}

/// Recomputes a root by folding a leaf value through its Merkle proof,
/// pairing left/right by the node id parity at each level. The result equals
/// the tree root iff the proof is consistent with it.
pub fn fold_proof<H: FieldHasher>(height: u32, leaf_id: u64, leaf: Fr, proof: &[Fr]) -> Fr {
    let mut acc = leaf;
    let mut id = leaf_id + (1u64 << height);
    for sibling in proof {
        acc = if id % 2 == 0 {
            H::hash2(acc, *sibling)
        } else {
            H::hash2(*sibling, acc)
        };
        id >>= 1;
    }
    acc
}

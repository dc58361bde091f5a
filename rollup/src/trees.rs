//! Domain trees: orders, nullifiers, fees and the bond registry.
//!
//! Each wrapper pairs an [`SmtTree`] with a leaf map so handlers read
//! typed leaves and the tree root stays in lockstep. The nullifier tree
//! splits every write into a prepare step (fails without side effects)
//! and a commit step, since the witness snapshots the leaf before the
//! insert lands.

use std::collections::HashMap;

use tenor_primitives::{FieldHasher, Fr};
use tenor_smt::SmtTree;

use crate::error::{RollupError, RollupResult};
use crate::leaves::{BondLeaf, FeeLeaf, NullifierLeaf, OrderLeaf, NULLIFIER_SLOTS};
use crate::types::{Amount, OrderId, TokenId};

/// The resting-order tree.
#[derive(Clone, Debug)]
pub struct OrderTree<H: FieldHasher> {
    tree: SmtTree<H>,
    leaves: HashMap<OrderId, OrderLeaf>,
}

impl<H: FieldHasher> OrderTree<H> {
    /// An empty order tree of `height` levels.
    pub fn new(height: u32) -> RollupResult<Self> {
        Ok(Self {
            tree: SmtTree::new(&[], height, OrderLeaf::default().hash::<H>())?,
            leaves: HashMap::new(),
        })
    }

    /// Leaf at `order_id`; the default (dead) leaf when unoccupied.
    pub fn leaf(&self, order_id: OrderId) -> OrderLeaf {
        self.leaves.get(&order_id).cloned().unwrap_or_default()
    }

    /// Leaf at `order_id`, failing when the slot holds no live order.
    pub fn live_leaf(&self, order_id: OrderId) -> RollupResult<OrderLeaf> {
        let leaf = self.leaf(order_id);
        if !leaf.is_live() {
            return Err(RollupError::OrderNotFound(order_id));
        }
        Ok(leaf)
    }

    /// Writes `leaf` at `order_id`.
    pub fn set_leaf(&mut self, order_id: OrderId, leaf: OrderLeaf) -> RollupResult<()> {
        if order_id >= 1u64 << self.tree.height() {
            return Err(RollupError::OrderTreeFull(order_id));
        }
        self.tree.update_leaf(order_id, leaf.hash::<H>())?;
        self.leaves.insert(order_id, leaf);
        Ok(())
    }

    /// Clears the slot at `order_id` back to the dead leaf.
    pub fn remove_leaf(&mut self, order_id: OrderId) -> RollupResult<()> {
        self.set_leaf(order_id, OrderLeaf::default())
    }

    /// Merkle path of `order_id`.
    pub fn proof(&self, order_id: OrderId) -> RollupResult<Vec<Fr>> {
        Ok(self.tree.proof(order_id)?)
    }

    /// Current root.
    pub fn root(&self) -> Fr {
        self.tree.root()
    }
}

/// One of the two epoch-scoped nullifier trees.
#[derive(Clone, Debug)]
pub struct NullifierTree<H: FieldHasher> {
    index: u8,
    epoch: u64,
    tree: SmtTree<H>,
    leaves: HashMap<u64, NullifierLeaf>,
}

impl<H: FieldHasher> NullifierTree<H> {
    /// An empty nullifier tree. `index` is 0 or 1, `epoch` its starting
    /// epoch number.
    pub fn new(height: u32, index: u8, epoch: u64) -> RollupResult<Self> {
        Ok(Self {
            index,
            epoch,
            tree: SmtTree::new(&[], height, NullifierLeaf::default().hash::<H>())?,
            leaves: HashMap::new(),
        })
    }

    /// Tree index inside the state (0 or 1).
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Epoch this tree currently collects nullifiers for.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Bucket id a nullifier hash maps to.
    pub fn leaf_id_of(&self, hash: Fr) -> u64 {
        hash.low_bits(self.tree.height() as usize).low_u64()
    }

    /// Bucket leaf at `leaf_id`.
    pub fn leaf(&self, leaf_id: u64) -> NullifierLeaf {
        self.leaves.get(&leaf_id).cloned().unwrap_or_default()
    }

    /// Locates the slot a commit of `hash` would occupy, failing when
    /// the bucket is full. State is untouched either way.
    pub fn prepare_insert(&self, hash: Fr) -> RollupResult<(u64, usize)> {
        let leaf_id = self.leaf_id_of(hash);
        let leaf = self.leaf(leaf_id);
        if leaf.count >= NULLIFIER_SLOTS {
            return Err(RollupError::NullifierBucketFull { tree: self.index, leaf_id });
        }
        Ok((leaf_id, leaf.count))
    }

    /// Lands a previously prepared insert.
    pub fn commit_insert(&mut self, hash: Fr) -> RollupResult<()> {
        let (leaf_id, elem_id) = self.prepare_insert(hash)?;
        let mut leaf = self.leaf(leaf_id);
        leaf.slots[elem_id] = hash;
        leaf.count = elem_id + 1;
        self.tree.update_leaf(leaf_id, leaf.hash::<H>())?;
        self.leaves.insert(leaf_id, leaf);
        Ok(())
    }

    /// Advances to `epoch` and drops every collected nullifier.
    pub fn rollover(&mut self, epoch: u64) -> RollupResult<()> {
        self.epoch = epoch;
        self.tree =
            SmtTree::new(&[], self.tree.height(), NullifierLeaf::default().hash::<H>())?;
        self.leaves.clear();
        Ok(())
    }

    /// Merkle path of `leaf_id`.
    pub fn proof(&self, leaf_id: u64) -> RollupResult<Vec<Fr>> {
        Ok(self.tree.proof(leaf_id)?)
    }

    /// Current root.
    pub fn root(&self) -> Fr {
        self.tree.root()
    }
}

/// Accrued-fee tree, one leaf per token id.
#[derive(Clone, Debug)]
pub struct FeeTree<H: FieldHasher> {
    tree: SmtTree<H>,
    leaves: HashMap<TokenId, FeeLeaf>,
}

impl<H: FieldHasher> FeeTree<H> {
    /// An empty fee tree of `height` levels.
    pub fn new(height: u32) -> RollupResult<Self> {
        Ok(Self {
            tree: SmtTree::new(&[], height, FeeLeaf::default().hash::<H>())?,
            leaves: HashMap::new(),
        })
    }

    /// Fee leaf for `token_id`.
    pub fn leaf(&self, token_id: TokenId) -> FeeLeaf {
        self.leaves.get(&token_id).copied().unwrap_or_default()
    }

    /// Adds `amount` to the accrued fee of `token_id`.
    pub fn credit(&mut self, token_id: TokenId, amount: Amount) -> RollupResult<FeeLeaf> {
        let old = self.leaf(token_id);
        let new = FeeLeaf {
            amount: old.amount.checked_add(amount).ok_or(
                RollupError::BalanceOverflow { account: 0, token: token_id },
            )?,
        };
        self.tree.update_leaf(u64::from(token_id), new.hash::<H>())?;
        self.leaves.insert(token_id, new);
        Ok(new)
    }

    /// Empties the accrued fee of `token_id`, returning what was drained.
    pub fn drain(&mut self, token_id: TokenId) -> RollupResult<Amount> {
        let old = self.leaf(token_id);
        self.tree.update_leaf(u64::from(token_id), FeeLeaf::default().hash::<H>())?;
        self.leaves.insert(token_id, FeeLeaf::default());
        Ok(old.amount)
    }

    /// Merkle path of `token_id`.
    pub fn proof(&self, token_id: TokenId) -> RollupResult<Vec<Fr>> {
        Ok(self.tree.proof(u64::from(token_id))?)
    }

    /// Current root.
    pub fn root(&self) -> Fr {
        self.tree.root()
    }
}

/// Bond-token registry tree, one leaf per bond token id.
#[derive(Clone, Debug)]
pub struct BondTree<H: FieldHasher> {
    tree: SmtTree<H>,
    leaves: HashMap<TokenId, BondLeaf>,
}

impl<H: FieldHasher> BondTree<H> {
    /// An empty bond registry of `height` levels.
    pub fn new(height: u32) -> RollupResult<Self> {
        Ok(Self {
            tree: SmtTree::new(&[], height, BondLeaf::default().hash::<H>())?,
            leaves: HashMap::new(),
        })
    }

    /// Registry leaf for `token_id`, unset when never created.
    pub fn leaf(&self, token_id: TokenId) -> BondLeaf {
        self.leaves.get(&token_id).copied().unwrap_or_default()
    }

    /// Registry leaf for `token_id`, failing when unset.
    pub fn registered_leaf(&self, token_id: TokenId) -> RollupResult<BondLeaf> {
        let leaf = self.leaf(token_id);
        if !leaf.is_set() {
            return Err(RollupError::UnknownBondToken(token_id));
        }
        Ok(leaf)
    }

    /// Registers `token_id`; each bond token is created exactly once.
    pub fn register(&mut self, token_id: TokenId, leaf: BondLeaf) -> RollupResult<()> {
        if self.leaf(token_id).is_set() {
            return Err(RollupError::BondTokenExists(token_id));
        }
        self.tree.update_leaf(u64::from(token_id), leaf.hash::<H>())?;
        self.leaves.insert(token_id, leaf);
        Ok(())
    }

    /// Merkle path of `token_id`.
    pub fn proof(&self, token_id: TokenId) -> RollupResult<Vec<Fr>> {
        Ok(self.tree.proof(u64::from(token_id))?)
    }

    /// Current root.
    pub fn root(&self) -> Fr {
        self.tree.root()
    }
}

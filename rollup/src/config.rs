//! Static geometry of a rollup instance.
//!
//! Every tree height and batch dimension is fixed when the circuit is
//! compiled, so the engine takes them once at construction and never lets
//! them change afterwards.

use serde::{Deserialize, Serialize};

/// Tree heights and batch dimensions shared by the engine and the circuit.
///
/// All trees are complete binary trees of fixed height; a tree of height
/// `h` has `2^h` leaf slots. The batch dimensions bound how many
/// transactions a block holds and how many pubdata chunks they may emit in
/// total.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupConfig {
    /// Height of the global order tree.
    pub order_tree_height: u32,
    /// Height of the global account tree.
    pub account_tree_height: u32,
    /// Height of each per-account token subtree.
    pub token_tree_height: u32,
    /// Height of each of the two epoch nullifier trees.
    pub nullifier_tree_height: u32,
    /// Height of the fee tree.
    pub fee_tree_height: u32,
    /// Height of the bond-token registry tree.
    pub bond_tree_height: u32,
    /// Number of transaction slots in a block; short blocks are padded
    /// with no-ops up to this count.
    pub num_txs_per_batch: usize,
    /// Total pubdata chunk slots in a block across all transactions.
    pub num_chunks_per_batch: usize,
    /// Account ids below this bound are system accounts and are created
    /// empty at genesis.
    pub reserved_accounts: u32,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            order_tree_height: 24,
            account_tree_height: 12,
            token_tree_height: 8,
            nullifier_tree_height: 8,
            fee_tree_height: 3,
            bond_tree_height: 3,
            num_txs_per_batch: 3,
            num_chunks_per_batch: 64,
            reserved_accounts: 100,
        }
    }
}

impl RollupConfig {
    /// Leaf capacity of the account tree.
    pub fn account_capacity(&self) -> u64 {
        1u64 << self.account_tree_height
    }

    /// Leaf capacity of the order tree.
    pub fn order_capacity(&self) -> u64 {
        1u64 << self.order_tree_height
    }
}

//! Fixed-height sparse Merkle trees over field elements.
//!
//! Every authenticated structure in the Tenor rollup (accounts, per-account
//! token balances, resting orders, nullifiers, fees, bond metadata) is a
//! [`SmtTree`]: a complete binary tree of a fixed height in which only
//! explicitly written nodes are stored. Any absent node is defined to equal
//! a cached per-level default hash, so an empty tree of height 24 costs a
//! 25-entry default table rather than 2^25 nodes.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]
#![deny(missing_docs)]

mod tree;
#[cfg(test)]
mod tree_test;

pub use tree::{fold_proof, SmtError, SmtResult, SmtTree};

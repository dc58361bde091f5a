//! State-transition engine of the Tenor rollup.
//!
//! The engine owns every authenticated tree of the L2 state (accounts with
//! nested per-account token subtrees, open orders, dual-epoch nullifiers,
//! collected fees and bond-token registry), applies batches of typed
//! transaction requests to them, and records for every applied transaction
//! the Merkle material a proving circuit consumes: before/after leaves,
//! sibling paths, root-flow timelines and the packed pubdata chunks.
//!
//! The crate is hash-agnostic. Callers pick the field hasher (and the
//! signature scheme used for admin-signed batches) through the traits in
//! [`tenor_primitives`].

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]
#![deny(missing_docs)]

pub mod account;
pub mod chunk;
pub mod config;
pub mod error;
pub mod fees;
mod handlers;
pub mod leaves;
pub mod state;
pub mod trees;
pub mod tx;
pub mod types;
pub mod witness;

pub use config::RollupConfig;
pub use error::{RollupError, RollupResult};
pub use state::RollupState;
pub use tx::{TxKind, TxRequest};

//! Errors surfaced by the state-transition engine.

use tenor_smt::SmtError;
use thiserror::Error;

use crate::tx::TxKind;

/// Result alias used throughout the engine.
pub type RollupResult<T> = Result<T, RollupError>;

/// An error that occurred while applying a transaction or sealing a block.
///
/// Any variant other than the per-transaction validation failures
/// ([`RollupError::NonceMismatch`], [`RollupError::BalanceUnderflow`], ...)
/// indicates the block under construction is unrecoverable and must be
/// discarded by the caller.
#[derive(Clone, Debug, Error)]
pub enum RollupError {
    /// A block was started while another one was still open.
    #[error("a block is already being built")]
    BlockInProgress,

    /// A transaction was submitted outside of an open block.
    #[error("no block is being built")]
    NoBlockInProgress,

    /// More transactions were applied than the batch has slots for.
    #[error("batch overflow: {got} transactions applied but the batch holds {max}")]
    BatchOverflow {
        /// Transactions applied to the open block.
        got: usize,
        /// Transaction slots per batch.
        max: usize,
    },

    /// The pubdata of a block exceeded the configured chunk capacity.
    #[error("pubdata overflow: {got} chunks emitted but the batch holds {max}")]
    PubdataOverflow {
        /// Chunks emitted by the open block.
        got: usize,
        /// Chunk slots per batch.
        max: usize,
    },

    /// The account tree has no free leaf slot left.
    #[error("account tree is full (capacity {0})")]
    AccountTreeFull(u64),

    /// A transaction referenced an account id with no registered account.
    #[error("account {0} does not exist")]
    AccountNotFound(u32),

    /// A registration targeted a leaf slot other than the next free one.
    #[error("register targeted account {got} but the next free slot is {expected}")]
    RegisterSlotMismatch {
        /// Next free account leaf slot.
        expected: u32,
        /// Slot named by the request.
        got: u32,
    },

    /// A transaction carried a nonce other than the account's next nonce.
    #[error("account {account}: nonce {got} does not follow {current}")]
    NonceMismatch {
        /// Account whose nonce was checked.
        account: u32,
        /// Nonce currently stored in the account leaf.
        current: u64,
        /// Nonce carried by the request.
        got: u64,
    },

    /// A debit would drive a token balance or locked amount below zero.
    #[error("account {account} token {token}: balance underflow")]
    BalanceUnderflow {
        /// Account being debited.
        account: u32,
        /// Token leaf being debited.
        token: u16,
    },

    /// A balance credit overflowed the amount width.
    #[error("account {account} token {token}: balance overflow")]
    BalanceOverflow {
        /// Account being credited.
        account: u32,
        /// Token leaf being credited.
        token: u16,
    },

    /// A transaction referenced an order slot holding no live order.
    #[error("order {0} does not exist")]
    OrderNotFound(u64),

    /// The order tree has no free leaf slot left.
    #[error("order tree is full (capacity {0})")]
    OrderTreeFull(u64),

    /// All slots of a nullifier bucket are occupied.
    #[error("nullifier bucket {leaf_id} of tree {tree} is full")]
    NullifierBucketFull {
        /// Tree the insert targeted (0 or 1).
        tree: u8,
        /// Bucket leaf the hash mapped to.
        leaf_id: u64,
    },

    /// A fee was collected for a token with an empty fee leaf.
    #[error("no fee leaf holds token {0}")]
    FeeLeafNotFound(u16),

    /// A bond token was created twice.
    #[error("bond token {0} already exists")]
    BondTokenExists(u16),

    /// A redemption referenced a token with no bond registry entry.
    #[error("token {0} is not a registered bond token")]
    UnknownBondToken(u16),

    /// A matching-phase transaction disagreed with the held order context.
    #[error("{kind:?}: matching context mismatch ({detail})")]
    MatchContext {
        /// Kind of the offending transaction.
        kind: TxKind,
        /// What disagreed.
        detail: &'static str,
    },

    /// A request carried metadata of the wrong shape for its kind.
    #[error("{kind:?}: request metadata has the wrong shape")]
    InvalidMetadata {
        /// Kind of the offending transaction.
        kind: TxKind,
    },

    /// A request failed a kind-specific validity check.
    #[error("{kind:?}: {detail}")]
    InvalidRequest {
        /// Kind of the offending transaction.
        kind: TxKind,
        /// What was wrong with it.
        detail: &'static str,
    },

    /// An admin transaction was applied while no admin signer is installed.
    #[error("admin address is set but no admin signer is installed")]
    MissingAdminSigner,

    /// A root-flow timeline was read or closed while a before/after pair
    /// was still open.
    #[error("unbalanced root flow in the {0} payload")]
    UnbalancedRootFlow(&'static str),

    /// An underlying tree operation failed.
    #[error(transparent)]
    Smt(#[from] SmtError),
}

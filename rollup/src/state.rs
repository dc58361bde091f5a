//! Rollup state and block assembly.
//!
//! [`RollupState`] owns the account tree (with per-account token
//! subtrees), the order tree, the two epoch-scoped nullifier trees, the
//! fee tree and the bond registry. Blocks are built transaction by
//! transaction between [`begin_block`](RollupState::begin_block) and
//! [`finish_block`](RollupState::finish_block); each applied transaction
//! contributes one [`TxWitness`] and one pubdata chunk run, and every
//! tree root is recorded once per transaction so the circuit can replay
//! the block.

use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;
use log::warn;
use tenor_primitives::{FieldHasher, FieldSigner, Fr};
use tenor_smt::SmtTree;

use crate::account::RollupAccount;
use crate::chunk::{self, ChunkExtras};
use crate::config::RollupConfig;
use crate::error::{RollupError, RollupResult};
use crate::leaves::OrderLeaf;
use crate::trees::{BondTree, FeeTree, NullifierTree, OrderTree};
use crate::tx::{TxKind, TxRequest};
use crate::types::{AccountId, Delta, OrderId, Timestamp, TokenId};
use crate::witness::{BlockWitness, TxWitness};

/// Whether a block is currently being assembled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RollupStatus {
    /// No block in flight.
    Idle,
    /// Between `begin_block` and `finish_block`.
    Running,
}

/// The complete rollup state machine.
///
/// There is no in-engine rollback: any error leaves the open block in an
/// undefined partial state. Callers that need recovery clone the state
/// before [`begin_block`](RollupState::begin_block) and discard the
/// mutated copy on failure.
#[derive(Clone)]
pub struct RollupState<H: FieldHasher> {
    pub(crate) config: RollupConfig,
    pub(crate) accounts: HashMap<AccountId, RollupAccount<H>>,
    pub(crate) account_tree: SmtTree<H>,
    pub(crate) order_tree: OrderTree<H>,
    pub(crate) nullifier_trees: [NullifierTree<H>; 2],
    pub(crate) fee_tree: FeeTree<H>,
    pub(crate) bond_tree: BondTree<H>,
    default_account: RollupAccount<H>,

    pub(crate) admin_ts_addr: Fr,
    pub(crate) admin_pub_key: (Fr, Fr),
    admin_signer: Option<Arc<dyn FieldSigner>>,

    status: RollupStatus,
    block_number: u64,
    pub(crate) current_time: Timestamp,
    /// Global id of the next transaction to apply.
    ori_tx_id: u64,
    next_account_id: AccountId,

    // held match contexts, alive between a start and its end
    pub(crate) held_taker_order: Option<(OrderId, OrderLeaf)>,
    pub(crate) held_auction_order: Option<(OrderId, OrderLeaf)>,
    pub(crate) matched_lend_interest: u128,

    // in-flight block
    reqs: Vec<TxWitness>,
    pub(crate) tx: TxWitness,
    account_root_flow: Vec<Fr>,
    order_root_flow: Vec<Fr>,
    fee_root_flow: Vec<Fr>,
    bond_root_flow: Vec<Fr>,
    admin_ts_addr_flow: Vec<Fr>,
    nullifier_root_flows: [Vec<Fr>; 2],
    epoch_flows: [Vec<Fr>; 2],
}

impl<H: FieldHasher> RollupState<H> {
    /// A fresh state: empty trees, the reserved system accounts in
    /// place, epochs one and two, no admin key.
    pub fn new(config: RollupConfig) -> RollupResult<Self> {
        let default_account = RollupAccount::new(0, config.token_tree_height, true)?;
        let account_tree =
            SmtTree::new(&[], config.account_tree_height, default_account.leaf_hash())?;
        let mut accounts = HashMap::new();
        for id in 0..config.reserved_accounts {
            accounts.insert(id, RollupAccount::new(id, config.token_tree_height, false)?);
        }
        Ok(Self {
            accounts,
            account_tree,
            order_tree: OrderTree::new(config.order_tree_height)?,
            nullifier_trees: [
                NullifierTree::new(config.nullifier_tree_height, 0, 1)?,
                NullifierTree::new(config.nullifier_tree_height, 1, 2)?,
            ],
            fee_tree: FeeTree::new(config.fee_tree_height)?,
            bond_tree: BondTree::new(config.bond_tree_height)?,
            default_account,
            admin_ts_addr: Fr::zero(),
            admin_pub_key: (Fr::zero(), Fr::zero()),
            admin_signer: None,
            status: RollupStatus::Idle,
            block_number: 0,
            current_time: 0,
            ori_tx_id: 0,
            next_account_id: config.reserved_accounts,
            held_taker_order: None,
            held_auction_order: None,
            matched_lend_interest: 0,
            reqs: Vec::new(),
            tx: TxWitness::default(),
            account_root_flow: Vec::new(),
            order_root_flow: Vec::new(),
            fee_root_flow: Vec::new(),
            bond_root_flow: Vec::new(),
            admin_ts_addr_flow: Vec::new(),
            nullifier_root_flows: [Vec::new(), Vec::new()],
            epoch_flows: [Vec::new(), Vec::new()],
            config,
        })
    }

    /// Installs the signer producing admin signatures. Admin kinds fail
    /// once an admin address is set and no signer is available.
    pub fn set_admin_signer(&mut self, signer: Arc<dyn FieldSigner>) {
        self.admin_signer = Some(signer);
    }

    /// Current block-assembly status.
    pub fn status(&self) -> RollupStatus {
        self.status
    }

    /// Number of the last closed block.
    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    /// Global transaction id the next applied transaction receives.
    pub fn latest_tx_id(&self) -> u64 {
        self.ori_tx_id + self.reqs.len() as u64
    }

    /// Account by id, if it exists.
    pub fn account(&self, id: AccountId) -> Option<&RollupAccount<H>> {
        self.accounts.get(&id)
    }

    /// Commitment to the whole state.
    ///
    /// The transaction-state root covers everything but the account
    /// tree: admin address, bond registry, fees, the aggregated
    /// nullifier roots with their epochs, the order tree and the global
    /// transaction count.
    pub fn state_root(&self) -> Fr {
        let nullifier_agg = H::hash(&[
            self.nullifier_trees[0].root(),
            Fr::from(self.nullifier_trees[0].epoch()),
            self.nullifier_trees[1].root(),
            Fr::from(self.nullifier_trees[1].epoch()),
        ]);
        let ts_root = H::hash(&[
            self.admin_ts_addr,
            self.bond_tree.root(),
            self.fee_tree.root(),
            nullifier_agg,
            self.order_tree.root(),
            Fr::from(self.ori_tx_id),
        ]);
        H::hash(&[ts_root, self.account_tree.root()])
    }

    /// Opens a block at `current_time`, snapshotting every root as the
    /// first entry of each timeline.
    pub fn begin_block(&mut self, current_time: Timestamp) -> RollupResult<()> {
        if self.status == RollupStatus::Running {
            return Err(RollupError::BlockInProgress);
        }
        self.status = RollupStatus::Running;
        self.current_time = current_time;
        self.push_root_flows();
        Ok(())
    }

    /// Pads the batch with no-ops, closes the block and returns its
    /// witness.
    pub fn finish_block(&mut self) -> RollupResult<BlockWitness> {
        if self.status != RollupStatus::Running {
            return Err(RollupError::NoBlockInProgress);
        }
        let per_batch = self.config.num_txs_per_batch;
        if self.reqs.len() > per_batch {
            return Err(RollupError::BatchOverflow { got: self.reqs.len(), max: per_batch });
        }
        if self.reqs.len() < per_batch {
            warn!(
                "block {}: padding {} of {} transaction slots",
                self.block_number + 1,
                per_batch - self.reqs.len(),
                per_batch
            );
            while self.reqs.len() < per_batch {
                self.apply_transaction(&TxRequest::noop())?;
            }
        }

        let mut o_chunks =
            self.reqs.iter().flat_map(|r| &r.o_chunks).copied().collect_vec();
        let mut is_critical_chunk =
            self.reqs.iter().flat_map(|r| &r.is_critical_chunk).copied().collect_vec();
        let max_chunks = self.config.num_chunks_per_batch;
        if o_chunks.len() > max_chunks {
            return Err(RollupError::PubdataOverflow { got: o_chunks.len(), max: max_chunks });
        }
        o_chunks.resize(max_chunks, Fr::zero());
        is_critical_chunk.resize(max_chunks, Fr::zero());

        self.block_number += 1;
        let witness = BlockWitness {
            block_number: self.block_number,
            reqs: std::mem::take(&mut self.reqs),
            o_chunks,
            is_critical_chunk,
            ori_tx_num: Fr::from(self.ori_tx_id),
            account_root_flow: std::mem::take(&mut self.account_root_flow),
            order_root_flow: std::mem::take(&mut self.order_root_flow),
            fee_root_flow: std::mem::take(&mut self.fee_root_flow),
            bond_token_root_flow: std::mem::take(&mut self.bond_root_flow),
            admin_ts_addr_flow: std::mem::take(&mut self.admin_ts_addr_flow),
            nullifier_root_flow: [
                std::mem::take(&mut self.nullifier_root_flows[0]),
                std::mem::take(&mut self.nullifier_root_flows[1]),
            ],
            epoch_flow: [
                std::mem::take(&mut self.epoch_flows[0]),
                std::mem::take(&mut self.epoch_flows[1]),
            ],
            current_time: self.current_time,
        };
        self.ori_tx_id += witness.reqs.len() as u64;
        self.status = RollupStatus::Idle;
        Ok(witness)
    }

    /// Applies one transaction to the open block.
    pub fn apply_transaction(&mut self, req: &TxRequest) -> RollupResult<()> {
        if self.status != RollupStatus::Running {
            return Err(RollupError::NoBlockInProgress);
        }
        self.tx = TxWitness::default();
        self.tx.req_data = req.encode_message().to_vec();

        // placements write a real nullifier; everything else records the
        // same shape against bucket zero of tree zero
        if !req.kind.is_order_placement() {
            self.nullifier_before(0, 0, 0)?;
            self.nullifier_after(0, 0)?;
        }
        let own_fee_pair = matches!(
            req.kind,
            TxKind::AuctionMatch
                | TxKind::AuctionEnd
                | TxKind::SecondLimitExchange
                | TxKind::SecondLimitEnd
                | TxKind::SecondMarketExchange
                | TxKind::SecondMarketEnd
                | TxKind::WithdrawFee
        );
        if !own_fee_pair {
            self.fee_before(req.fee_token_id)?;
            self.fee_after(req.fee_token_id)?;
        }

        let extras = self.dispatch(req)?;

        if !self.admin_ts_addr.is_zero() && req.kind.is_admin() {
            let signer = self.admin_signer.as_ref().ok_or(RollupError::MissingAdminSigner)?;
            let sig = signer.sign(H::hash(&self.tx.req_data));
            self.tx.sig_r = [sig.r8.0, sig.r8.1];
            self.tx.sig_s = sig.s;
            self.tx.ts_pub_key = [self.admin_pub_key.0, self.admin_pub_key.1];
        }

        if !matches!(req.kind, TxKind::CreateBondToken | TxKind::Redeem) {
            self.bond_before(req.bond_token_id)?;
            self.bond_after(req.bond_token_id)?;
        }

        let chunks = chunk::pack(req, &extras);
        self.tx.r_chunks = chunks.r_chunks.to_vec();
        self.tx.is_critical_chunk = vec![Fr::zero(); chunks.o_chunks.len()];
        if chunks.is_critical {
            self.tx.is_critical_chunk[0] = Fr::one();
        }
        self.tx.o_chunks = chunks.o_chunks;

        self.push_root_flows();
        self.reqs.push(std::mem::take(&mut self.tx));
        Ok(())
    }

    fn push_root_flows(&mut self) {
        self.bond_root_flow.push(self.bond_tree.root());
        self.fee_root_flow.push(self.fee_tree.root());
        self.account_root_flow.push(self.account_tree.root());
        self.order_root_flow.push(self.order_tree.root());
        for i in 0..2 {
            self.nullifier_root_flows[i].push(self.nullifier_trees[i].root());
            self.epoch_flows[i].push(Fr::from(self.nullifier_trees[i].epoch()));
        }
        self.admin_ts_addr_flow.push(self.admin_ts_addr);
    }

    // --- witness brackets ----------------------------------------------

    fn account_ref(&self, id: AccountId) -> &RollupAccount<H> {
        self.accounts.get(&id).unwrap_or(&self.default_account)
    }

    /// Account by id, failing for ids never registered.
    pub(crate) fn existing_account(&self, id: AccountId) -> RollupResult<&RollupAccount<H>> {
        self.accounts.get(&id).ok_or(RollupError::AccountNotFound(id))
    }

    pub(crate) fn account_before(&mut self, id: AccountId) -> RollupResult<()> {
        let leaf = self.account_ref(id).encode_leaf();
        let prf = self.account_tree.proof(u64::from(id))?;
        self.tx.account.account_before(Fr::from(id), leaf, prf, self.account_tree.root());
        Ok(())
    }

    pub(crate) fn account_after(&mut self, id: AccountId) -> RollupResult<()> {
        let leaf = self.account_ref(id).encode_leaf();
        self.tx.account.account_after(leaf, self.account_tree.root())
    }

    pub(crate) fn token_before(&mut self, id: AccountId, token_id: TokenId) -> RollupResult<()> {
        let account = self.account_ref(id);
        let leaf = account.token_leaf(token_id).encode_leaf_message();
        let prf = account.token_proof(token_id)?;
        let root = account.token_root();
        self.tx.account.token_before(Fr::from(token_id), leaf, prf, root);
        Ok(())
    }

    pub(crate) fn token_after(&mut self, id: AccountId, token_id: TokenId) -> RollupResult<()> {
        let account = self.account_ref(id);
        let leaf = account.token_leaf(token_id).encode_leaf_message();
        let root = account.token_root();
        self.tx.account.token_after(leaf, root)
    }

    pub(crate) fn account_and_token_before(
        &mut self,
        id: AccountId,
        token_id: TokenId,
    ) -> RollupResult<()> {
        self.token_before(id, token_id)?;
        self.account_before(id)
    }

    pub(crate) fn account_and_token_after(
        &mut self,
        id: AccountId,
        token_id: TokenId,
    ) -> RollupResult<()> {
        self.token_after(id, token_id)?;
        self.account_after(id)
    }

    pub(crate) fn order_before(&mut self, order_id: OrderId) -> RollupResult<()> {
        let leaf = self.order_tree.leaf(order_id).encode_leaf_message();
        let prf = self.order_tree.proof(order_id)?;
        self.tx.order.before(Fr::from(order_id), leaf, prf, self.order_tree.root());
        Ok(())
    }

    pub(crate) fn order_after(&mut self, order_id: OrderId) -> RollupResult<()> {
        let leaf = self.order_tree.leaf(order_id).encode_leaf_message();
        self.tx.order.after(leaf, self.order_tree.root())
    }

    pub(crate) fn fee_before(&mut self, token_id: TokenId) -> RollupResult<()> {
        let leaf = self.fee_tree.leaf(token_id).encode_leaf_message();
        let prf = self.fee_tree.proof(token_id)?;
        self.tx.fee.before(Fr::from(token_id), leaf, prf, self.fee_tree.root());
        Ok(())
    }

    pub(crate) fn fee_after(&mut self, token_id: TokenId) -> RollupResult<()> {
        let leaf = self.fee_tree.leaf(token_id).encode_leaf_message();
        self.tx.fee.after(leaf, self.fee_tree.root())
    }

    pub(crate) fn bond_before(&mut self, token_id: TokenId) -> RollupResult<()> {
        let leaf = self.bond_tree.leaf(token_id).encode_leaf_message();
        let prf = self.bond_tree.proof(token_id)?;
        self.tx.bond.before(Fr::from(token_id), leaf, prf, self.bond_tree.root());
        Ok(())
    }

    pub(crate) fn bond_after(&mut self, token_id: TokenId) -> RollupResult<()> {
        let leaf = self.bond_tree.leaf(token_id).encode_leaf_message();
        self.tx.bond.after(leaf, self.bond_tree.root())
    }

    pub(crate) fn nullifier_before(
        &mut self,
        tree: usize,
        elem_id: usize,
        leaf_id: u64,
    ) -> RollupResult<()> {
        let t = &self.nullifier_trees[tree];
        let leaf = t.leaf(leaf_id).encode_leaf_message();
        let prf = t.proof(leaf_id)?;
        let root = t.root();
        self.tx.nullifier.nullifier_tree_id = Fr::from(tree);
        self.tx.nullifier.nullifier_elem_id = Fr::from(elem_id);
        self.tx.nullifier.before(Fr::from(leaf_id), leaf, prf, root);
        Ok(())
    }

    pub(crate) fn nullifier_after(&mut self, tree: usize, leaf_id: u64) -> RollupResult<()> {
        let t = &self.nullifier_trees[tree];
        let leaf = t.leaf(leaf_id).encode_leaf_message();
        self.tx.nullifier.after(leaf, t.root())
    }

    // --- state mutation -------------------------------------------------

    /// Nullifier tree an order binds to, by its epoch argument.
    pub(crate) fn nullifier_tree_for_epoch(&self, epoch: u64) -> usize {
        usize::from(epoch == self.nullifier_trees[1].epoch())
    }

    pub(crate) fn update_account_token(
        &mut self,
        id: AccountId,
        token_id: TokenId,
        amount: Delta,
        locked: Delta,
    ) -> RollupResult<()> {
        let account =
            self.accounts.get_mut(&id).ok_or(RollupError::AccountNotFound(id))?;
        account.apply_token_delta(token_id, amount, locked)?;
        let leaf_hash = account.leaf_hash();
        self.account_tree.update_leaf(u64::from(id), leaf_hash)?;
        Ok(())
    }

    pub(crate) fn consume_nonce(&mut self, id: AccountId, nonce: u64) -> RollupResult<()> {
        let account =
            self.accounts.get_mut(&id).ok_or(RollupError::AccountNotFound(id))?;
        account.consume_nonce(nonce)?;
        let leaf_hash = account.leaf_hash();
        self.account_tree.update_leaf(u64::from(id), leaf_hash)?;
        Ok(())
    }

    /// Creates the next sequential account; ids are assigned by the
    /// sequencer and must arrive in order.
    pub(crate) fn add_account(
        &mut self,
        id: AccountId,
        account: RollupAccount<H>,
    ) -> RollupResult<()> {
        if u64::from(id) >= self.config.account_capacity() {
            return Err(RollupError::AccountTreeFull(u64::from(id)));
        }
        if id != self.next_account_id {
            return Err(RollupError::RegisterSlotMismatch {
                expected: self.next_account_id,
                got: id,
            });
        }
        self.account_tree.update_leaf(u64::from(id), account.leaf_hash())?;
        self.accounts.insert(id, account);
        self.next_account_id += 1;
        Ok(())
    }
}

impl<H: FieldHasher> std::fmt::Debug for RollupState<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollupState")
            .field("status", &self.status)
            .field("block_number", &self.block_number)
            .field("ori_tx_id", &self.ori_tx_id)
            .field("next_account_id", &self.next_account_id)
            .field("state_root", &self.state_root())
            .finish_non_exhaustive()
    }
}

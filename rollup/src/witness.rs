//! Circuit witness assembly.
//!
//! Every tree write is bracketed: the leaf, its Merkle path and the root
//! are snapshotted before the write, and the new leaf and root after.
//! Kinds that skip a tree still record a no-op pair so every transaction
//! presents the same witness shape to the circuit. Field names follow
//! the circuit's input layout, hence the serde renames.

use serde::{Deserialize, Serialize};
use tenor_primitives::Fr;

use crate::error::{RollupError, RollupResult};

/// Tree roots captured before and after one write.
pub type RootPair = [Fr; 2];

fn close_pair(flow: &mut [RootPair], root: Fr, what: &'static str) -> RollupResult<()> {
    let pair = flow.last_mut().ok_or(RollupError::UnbalancedRootFlow(what))?;
    pair[1] = root;
    Ok(())
}

/// Account and token-subtree writes of one transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTxPayload {
    /// Touched account leaf ids, in touch order.
    #[serde(rename = "r_accountLeafId")]
    pub account_leaf_id: Vec<Fr>,
    /// Account leaf tuples before each write.
    #[serde(rename = "r_oriAccountLeaf")]
    pub ori_account_leaf: Vec<[Fr; 3]>,
    /// Account leaf tuples after each write.
    #[serde(rename = "r_newAccountLeaf")]
    pub new_account_leaf: Vec<[Fr; 3]>,
    /// Account tree root before/after each write.
    #[serde(rename = "r_accountRootFlow")]
    pub account_root_flow: Vec<RootPair>,
    /// Merkle path of each touched account leaf, taken before the write.
    #[serde(rename = "r_accountMkPrf")]
    pub account_mk_prf: Vec<Vec<Fr>>,

    /// Touched token leaf ids.
    #[serde(rename = "r_tokenLeafId")]
    pub token_leaf_id: Vec<Fr>,
    /// Token leaf tuples before each write.
    #[serde(rename = "r_oriTokenLeaf")]
    pub ori_token_leaf: Vec<Vec<Fr>>,
    /// Token leaf tuples after each write.
    #[serde(rename = "r_newTokenLeaf")]
    pub new_token_leaf: Vec<Vec<Fr>>,
    /// Token subtree root before/after each write.
    #[serde(rename = "r_tokenRootFlow")]
    pub token_root_flow: Vec<RootPair>,
    /// Merkle path of each touched token leaf.
    #[serde(rename = "r_tokenMkPrf")]
    pub token_mk_prf: Vec<Vec<Fr>>,
}

impl AccountTxPayload {
    /// Snapshot of one account leaf before it is written.
    pub fn account_before(&mut self, leaf_id: Fr, leaf: [Fr; 3], prf: Vec<Fr>, root: Fr) {
        self.account_leaf_id.push(leaf_id);
        self.ori_account_leaf.push(leaf);
        self.account_mk_prf.push(prf);
        self.account_root_flow.push([root, root]);
    }

    /// Completes the pending account pair.
    pub fn account_after(&mut self, leaf: [Fr; 3], root: Fr) -> RollupResult<()> {
        self.new_account_leaf.push(leaf);
        close_pair(&mut self.account_root_flow, root, "account")
    }

    /// Snapshot of one token leaf before it is written.
    pub fn token_before(&mut self, leaf_id: Fr, leaf: Vec<Fr>, prf: Vec<Fr>, root: Fr) {
        self.token_leaf_id.push(leaf_id);
        self.ori_token_leaf.push(leaf);
        self.token_mk_prf.push(prf);
        self.token_root_flow.push([root, root]);
    }

    /// Completes the pending token pair.
    pub fn token_after(&mut self, leaf: Vec<Fr>, root: Fr) -> RollupResult<()> {
        self.new_token_leaf.push(leaf);
        close_pair(&mut self.token_root_flow, root, "token")
    }
}

/// Order-tree writes of one transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTxPayload {
    /// Touched order slots.
    #[serde(rename = "r_orderLeafId")]
    pub order_leaf_id: Vec<Fr>,
    /// Order leaf tuples before each write.
    #[serde(rename = "r_oriOrderLeaf")]
    pub ori_order_leaf: Vec<Vec<Fr>>,
    /// Order leaf tuples after each write.
    #[serde(rename = "r_newOrderLeaf")]
    pub new_order_leaf: Vec<Vec<Fr>>,
    /// Order tree root before/after each write.
    #[serde(rename = "r_orderRootFlow")]
    pub order_root_flow: Vec<RootPair>,
    /// Merkle path of each touched order slot.
    #[serde(rename = "r_orderMkPrf")]
    pub order_mk_prf: Vec<Vec<Fr>>,
}

impl OrderTxPayload {
    /// Snapshot of one order slot before it is written.
    pub fn before(&mut self, leaf_id: Fr, leaf: Vec<Fr>, prf: Vec<Fr>, root: Fr) {
        self.order_leaf_id.push(leaf_id);
        self.ori_order_leaf.push(leaf);
        self.order_mk_prf.push(prf);
        self.order_root_flow.push([root, root]);
    }

    /// Completes the pending order pair.
    pub fn after(&mut self, leaf: Vec<Fr>, root: Fr) -> RollupResult<()> {
        self.new_order_leaf.push(leaf);
        close_pair(&mut self.order_root_flow, root, "order")
    }
}

/// Nullifier-tree writes of one transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullifierTxPayload {
    /// Which of the two trees the write targets (0 or 1).
    #[serde(rename = "nullifierTreeId")]
    pub nullifier_tree_id: Fr,
    /// Slot inside the bucket the hash lands in.
    #[serde(rename = "nullifierElemId")]
    pub nullifier_elem_id: Fr,
    /// Touched bucket ids.
    #[serde(rename = "r_nullifierLeafId")]
    pub nullifier_leaf_id: Vec<Fr>,
    /// Bucket tuples before each write.
    #[serde(rename = "r_oriNullifierLeaf")]
    pub ori_nullifier_leaf: Vec<Vec<Fr>>,
    /// Bucket tuples after each write.
    #[serde(rename = "r_newNullifierLeaf")]
    pub new_nullifier_leaf: Vec<Vec<Fr>>,
    /// Targeted tree's root before/after each write.
    #[serde(rename = "r_nullifierRootFlow")]
    pub nullifier_root_flow: Vec<RootPair>,
    /// Merkle path of each touched bucket.
    #[serde(rename = "r_nullifierMkPrf")]
    pub nullifier_mk_prf: Vec<Vec<Fr>>,
}

impl NullifierTxPayload {
    /// Snapshot of one bucket before it is written.
    pub fn before(&mut self, leaf_id: Fr, leaf: Vec<Fr>, prf: Vec<Fr>, root: Fr) {
        self.nullifier_leaf_id.push(leaf_id);
        self.ori_nullifier_leaf.push(leaf);
        self.nullifier_mk_prf.push(prf);
        self.nullifier_root_flow.push([root, root]);
    }

    /// Completes the pending bucket pair.
    pub fn after(&mut self, leaf: Vec<Fr>, root: Fr) -> RollupResult<()> {
        self.new_nullifier_leaf.push(leaf);
        close_pair(&mut self.nullifier_root_flow, root, "nullifier")
    }
}

/// Fee-tree writes of one transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTxPayload {
    /// Touched fee leaf ids.
    #[serde(rename = "r_feeLeafId")]
    pub fee_leaf_id: Vec<Fr>,
    /// Fee leaf tuples before each write.
    #[serde(rename = "r_oriFeeLeaf")]
    pub ori_fee_leaf: Vec<Vec<Fr>>,
    /// Fee leaf tuples after each write.
    #[serde(rename = "r_newFeeLeaf")]
    pub new_fee_leaf: Vec<Vec<Fr>>,
    /// Fee tree root before/after each write.
    #[serde(rename = "r_feeRootFlow")]
    pub fee_root_flow: Vec<RootPair>,
    /// Merkle path of each touched fee leaf.
    #[serde(rename = "r_feeMkPrf")]
    pub fee_mk_prf: Vec<Vec<Fr>>,
}

impl FeeTxPayload {
    /// Snapshot of one fee leaf before it is written.
    pub fn before(&mut self, leaf_id: Fr, leaf: Vec<Fr>, prf: Vec<Fr>, root: Fr) {
        self.fee_leaf_id.push(leaf_id);
        self.ori_fee_leaf.push(leaf);
        self.fee_mk_prf.push(prf);
        self.fee_root_flow.push([root, root]);
    }

    /// Completes the pending fee pair.
    pub fn after(&mut self, leaf: Vec<Fr>, root: Fr) -> RollupResult<()> {
        self.new_fee_leaf.push(leaf);
        close_pair(&mut self.fee_root_flow, root, "fee")
    }
}

/// Bond-registry writes of one transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondTxPayload {
    /// Touched registry leaf ids.
    #[serde(rename = "r_bondTokenLeafId")]
    pub bond_token_leaf_id: Vec<Fr>,
    /// Registry tuples before each write.
    #[serde(rename = "r_oriBondTokenLeaf")]
    pub ori_bond_token_leaf: Vec<Vec<Fr>>,
    /// Registry tuples after each write.
    #[serde(rename = "r_newBondTokenLeaf")]
    pub new_bond_token_leaf: Vec<Vec<Fr>>,
    /// Registry root before/after each write.
    #[serde(rename = "r_bondTokenRootFlow")]
    pub bond_token_root_flow: Vec<RootPair>,
    /// Merkle path of each touched registry leaf.
    #[serde(rename = "r_bondTokenMkPrf")]
    pub bond_token_mk_prf: Vec<Vec<Fr>>,
}

impl BondTxPayload {
    /// Snapshot of one registry leaf before it is written.
    pub fn before(&mut self, leaf_id: Fr, leaf: Vec<Fr>, prf: Vec<Fr>, root: Fr) {
        self.bond_token_leaf_id.push(leaf_id);
        self.ori_bond_token_leaf.push(leaf);
        self.bond_token_mk_prf.push(prf);
        self.bond_token_root_flow.push([root, root]);
    }

    /// Completes the pending registry pair.
    pub fn after(&mut self, leaf: Vec<Fr>, root: Fr) -> RollupResult<()> {
        self.new_bond_token_leaf.push(leaf);
        close_pair(&mut self.bond_token_root_flow, root, "bond")
    }
}

/// Witness of one applied transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxWitness {
    /// The seventeen-field request tuple.
    #[serde(rename = "reqData")]
    pub req_data: Vec<Fr>,
    /// Key the signature verifies against; the admin key for admin kinds.
    #[serde(rename = "tsPubKey")]
    pub ts_pub_key: [Fr; 2],
    /// Signature R point.
    #[serde(rename = "sigR")]
    pub sig_r: [Fr; 2],
    /// Signature scalar.
    #[serde(rename = "sigS")]
    pub sig_s: Fr,
    /// Fixed five-chunk pubdata view.
    pub r_chunks: Vec<Fr>,
    /// Minimal pubdata chunk run.
    pub o_chunks: Vec<Fr>,
    /// Per-chunk critical flags, aligned with `o_chunks`.
    #[serde(rename = "isCriticalChunk")]
    pub is_critical_chunk: Vec<Fr>,
    /// Account and token writes.
    #[serde(flatten)]
    pub account: AccountTxPayload,
    /// Order-tree writes.
    #[serde(flatten)]
    pub order: OrderTxPayload,
    /// Nullifier writes.
    #[serde(flatten)]
    pub nullifier: NullifierTxPayload,
    /// Fee-tree writes.
    #[serde(flatten)]
    pub fee: FeeTxPayload,
    /// Bond-registry writes.
    #[serde(flatten)]
    pub bond: BondTxPayload,
}

/// Witness of one closed block.
///
/// Every root-flow timeline holds one entry per applied transaction plus
/// the pre-block snapshot, so its length is the batch size plus one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockWitness {
    /// Block number assigned at close.
    #[serde(rename = "blockNumber")]
    pub block_number: u64,
    /// Per-transaction witnesses, padding included.
    pub reqs: Vec<TxWitness>,
    /// Block-level pubdata chunks, zero-padded to the batch chunk count.
    pub o_chunks: Vec<Fr>,
    /// Per-chunk critical flags, aligned with `o_chunks`.
    #[serde(rename = "isCriticalChunk")]
    pub is_critical_chunk: Vec<Fr>,
    /// Global transaction id at the start of the block.
    #[serde(rename = "oriTxNum")]
    pub ori_tx_num: Fr,
    /// Account root timeline.
    #[serde(rename = "accountRootFlow")]
    pub account_root_flow: Vec<Fr>,
    /// Order root timeline.
    #[serde(rename = "orderRootFlow")]
    pub order_root_flow: Vec<Fr>,
    /// Fee root timeline.
    #[serde(rename = "feeRootFlow")]
    pub fee_root_flow: Vec<Fr>,
    /// Bond registry root timeline.
    #[serde(rename = "bondTokenRootFlow")]
    pub bond_token_root_flow: Vec<Fr>,
    /// Admin address timeline.
    #[serde(rename = "adminTsAddrFlow")]
    pub admin_ts_addr_flow: Vec<Fr>,
    /// Root timelines of the two nullifier trees.
    #[serde(rename = "nullifierRootFlow")]
    pub nullifier_root_flow: [Vec<Fr>; 2],
    /// Epoch timelines of the two nullifier trees.
    #[serde(rename = "epochFlow")]
    pub epoch_flow: [Vec<Fr>; 2],
    /// Block timestamp used for day spans and pubdata.
    #[serde(rename = "currentTime")]
    pub current_time: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_close_in_order() {
        let mut p = OrderTxPayload::default();
        p.before(Fr::from(4u64), vec![Fr::zero()], vec![], Fr::from(10u64));
        p.after(vec![Fr::one()], Fr::from(11u64)).unwrap();
        assert_eq!(p.order_root_flow, vec![[Fr::from(10u64), Fr::from(11u64)]]);

        // an after without a before is a shape violation
        let mut q = FeeTxPayload::default();
        assert!(matches!(
            q.after(vec![], Fr::zero()),
            Err(RollupError::UnbalancedRootFlow("fee"))
        ));
    }

    #[test]
    fn witness_serialises_with_circuit_names() {
        let mut w = TxWitness::default();
        w.nullifier.nullifier_tree_id = Fr::one();
        let json = serde_json::to_value(&w).unwrap();
        assert!(json.get("reqData").is_some());
        assert!(json.get("r_accountRootFlow").is_some());
        assert!(json.get("r_bondTokenMkPrf").is_some());
        assert_eq!(json["nullifierTreeId"], serde_json::json!("1"));
    }
}

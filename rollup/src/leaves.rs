//! Leaf codecs for every domain tree.
//!
//! Each leaf type defines two canonical tuples of field elements: the hash
//! encoding (`encode_leaf_hash`, fed to the hasher to produce the value
//! stored in the tree) and the message encoding (`encode_leaf_message`,
//! exported verbatim into the witness bundle). The message tuple is a
//! superset of the hash tuple for leaves carrying audit fields. Default
//! constructors are pure so that any unvisited leaf of a sparse tree can
//! be reproduced on demand.

use serde::{Deserialize, Serialize};
use tenor_primitives::{FieldHasher, Fr};

use crate::tx::{TxKind, TxRequest};
use crate::types::{AccountId, Amount, OrderId, Timestamp, TokenId};

/// Slots per nullifier bucket leaf; the leaf tuple shape is fixed by the
/// circuit even when the configured fill cap is lower.
pub const NULLIFIER_SLOTS: usize = 8;

/// Balance entry of one token inside an account's token subtree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLeaf {
    /// Freely spendable balance.
    pub amount: Amount,
    /// Balance locked behind resting orders.
    pub locked: Amount,
}

impl TokenLeaf {
    /// Tuple fed to the hasher.
    pub fn encode_leaf_hash(&self) -> Vec<Fr> {
        vec![Fr::from(self.amount), Fr::from(self.locked)]
    }

    /// Witness tuple; identical to the hash tuple for token leaves.
    pub fn encode_leaf_message(&self) -> Vec<Fr> {
        self.encode_leaf_hash()
    }

    /// Hash stored in the token subtree.
    pub fn hash<H: FieldHasher>(&self) -> Fr {
        H::hash(&self.encode_leaf_hash())
    }
}

/// A resting order, stored in the order tree.
///
/// The first seventeen fields mirror the placing request verbatim; the
/// remaining four are bookkeeping accumulated while the order is matched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLeaf {
    /// Kind of the placing request.
    pub kind: TxKind,
    /// Account that placed the order.
    pub account_id: AccountId,
    /// Token sold (lend token or collateral token for auctions).
    pub token_id: TokenId,
    /// Principal amount of the placing request.
    pub amount: Amount,
    /// Nonce of the placing request.
    pub nonce: u64,
    /// Taker fee rate.
    pub fee0: Amount,
    /// Maker fee rate.
    pub fee1: Amount,
    /// Argument slots copied from the placing request.
    pub args: [Fr; 10],
    /// Global transaction id assigned when the order entered the state.
    pub order_tx_id: u64,
    /// Accumulated matched sell-side amount.
    pub acc1: Amount,
    /// Accumulated matched buy-side amount.
    pub acc2: Amount,
    /// Balance still locked for this order.
    pub locked_amt: Amount,
}

impl Default for OrderLeaf {
    fn default() -> Self {
        Self {
            kind: TxKind::Noop,
            account_id: 0,
            token_id: 0,
            amount: 0,
            nonce: 0,
            fee0: 0,
            fee1: 0,
            args: [Fr::zero(); 10],
            order_tx_id: 0,
            acc1: 0,
            acc2: 0,
            locked_amt: 0,
        }
    }
}

impl OrderLeaf {
    /// Builds an order leaf from the placing request; bookkeeping fields
    /// start at zero.
    pub fn from_request(req: &TxRequest) -> Self {
        Self {
            kind: req.kind,
            account_id: req.account_id,
            token_id: req.token_id,
            amount: req.amount,
            nonce: req.nonce,
            fee0: req.fee0,
            fee1: req.fee1,
            args: req.args,
            ..Self::default()
        }
    }

    /// Whether this slot holds a live order.
    pub fn is_live(&self) -> bool {
        self.kind != TxKind::Noop
    }

    fn request_fields(&self) -> Vec<Fr> {
        let mut out = vec![
            Fr::from(self.kind as u8),
            Fr::from(self.account_id),
            Fr::from(self.token_id),
            Fr::from(self.amount),
            Fr::from(self.nonce),
            Fr::from(self.fee0),
            Fr::from(self.fee1),
        ];
        out.extend_from_slice(&self.args);
        out
    }

    /// Witness tuple: the seventeen request fields plus bookkeeping.
    pub fn encode_leaf_message(&self) -> Vec<Fr> {
        let mut out = self.request_fields();
        out.push(Fr::from(self.order_tx_id));
        out.push(Fr::from(self.acc1));
        out.push(Fr::from(self.acc2));
        out.push(Fr::from(self.locked_amt));
        out
    }

    /// Tuple fed to the hasher; same as the message tuple.
    pub fn encode_leaf_hash(&self) -> Vec<Fr> {
        self.encode_leaf_message()
    }

    /// Hash stored in the order tree.
    pub fn hash<H: FieldHasher>(&self) -> Fr {
        H::hash(&self.encode_leaf_hash())
    }

    /// Anti-replay key: the hash of the order-defining fields only,
    /// excluding bookkeeping, so a resubmitted identical order collides.
    pub fn encode_nullifier_hash<H: FieldHasher>(&self) -> Fr {
        H::hash(&self.request_fields())
    }

    /// Token bought (borrow token for auction borrow orders).
    pub fn buy_token_id(&self) -> TokenId {
        self.args[4].low_u64() as TokenId
    }

    /// Amount bought (borrow amount for auction borrow orders).
    pub fn buy_amount(&self) -> Amount {
        self.args[5].low_u128()
    }

    /// Maturity timestamp of the traded bond.
    pub fn maturity_time(&self) -> Timestamp {
        self.args[1].low_u64()
    }

    /// Interest rate carried by auction orders.
    pub fn interest(&self) -> Amount {
        self.args[3].low_u128()
    }

    /// Sell side flag of secondary orders.
    pub fn is_sell(&self) -> bool {
        self.args[8] == Fr::one()
    }

    /// Epoch the order was placed against.
    pub fn epoch(&self) -> u64 {
        self.args[7].low_u64()
    }
}

/// One collision bucket of a nullifier tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullifierLeaf {
    /// Stored nullifier hashes, in insertion order.
    pub slots: [Fr; NULLIFIER_SLOTS],
    /// Occupied slot count.
    pub count: usize,
}

impl NullifierLeaf {
    /// Tuple fed to the hasher: the eight slots, count excluded.
    pub fn encode_leaf_hash(&self) -> Vec<Fr> {
        self.slots.to_vec()
    }

    /// Witness tuple; identical to the hash tuple.
    pub fn encode_leaf_message(&self) -> Vec<Fr> {
        self.encode_leaf_hash()
    }

    /// Hash stored in the nullifier tree.
    pub fn hash<H: FieldHasher>(&self) -> Fr {
        H::hash(&self.encode_leaf_hash())
    }

    /// Slot index holding `hash`, if present.
    pub fn position_of(&self, hash: Fr) -> Option<usize> {
        self.slots[..self.count].iter().position(|s| *s == hash)
    }
}

/// Accrued protocol fee for one token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeLeaf {
    /// Running accrued amount; reset to zero on withdrawal.
    pub amount: Amount,
}

impl FeeLeaf {
    /// Tuple fed to the hasher.
    pub fn encode_leaf_hash(&self) -> Vec<Fr> {
        vec![Fr::from(self.amount)]
    }

    /// Witness tuple; identical to the hash tuple.
    pub fn encode_leaf_message(&self) -> Vec<Fr> {
        self.encode_leaf_hash()
    }

    /// Hash stored in the fee tree.
    pub fn hash<H: FieldHasher>(&self) -> Fr {
        H::hash(&self.encode_leaf_hash())
    }
}

/// Registry entry of one bond token, written once at creation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondLeaf {
    /// Underlying token the bond settles into.
    pub base_token_id: TokenId,
    /// Maturity timestamp of the bond.
    pub maturity_time: Timestamp,
}

impl BondLeaf {
    /// Whether this token-id has been registered.
    pub fn is_set(&self) -> bool {
        *self != Self::default()
    }

    /// Tuple fed to the hasher.
    pub fn encode_leaf_hash(&self) -> Vec<Fr> {
        vec![Fr::from(self.base_token_id), Fr::from(self.maturity_time)]
    }

    /// Witness tuple; identical to the hash tuple.
    pub fn encode_leaf_message(&self) -> Vec<Fr> {
        self.encode_leaf_hash()
    }

    /// Hash stored in the bond tree.
    pub fn hash<H: FieldHasher>(&self) -> Fr {
        H::hash(&self.encode_leaf_hash())
    }
}

/// Marker type re-exported for order-tree callers working with slot ids.
pub type OrderSlot = OrderId;

#[cfg(test)]
mod tests {
    use tenor_primitives::testing::MixHasher;

    use super::*;

    #[test]
    fn default_order_leaf_hashes_all_zero_tuple() {
        let leaf = OrderLeaf::default();
        let tuple = leaf.encode_leaf_hash();
        assert_eq!(tuple.len(), 21);
        assert!(tuple.iter().all(|f| f.is_zero()));
        assert_eq!(leaf.hash::<MixHasher>(), MixHasher::hash(&vec![Fr::zero(); 21]));
    }

    #[test]
    fn nullifier_hash_ignores_bookkeeping() {
        let req = TxRequest::noop();
        let mut leaf = OrderLeaf::from_request(&req);
        let before = leaf.encode_nullifier_hash::<MixHasher>();
        leaf.order_tx_id = 42;
        leaf.acc1 = 7;
        leaf.acc2 = 9;
        leaf.locked_amt = 11;
        assert_eq!(leaf.encode_nullifier_hash::<MixHasher>(), before);
        assert_ne!(
            leaf.hash::<MixHasher>(),
            OrderLeaf::from_request(&req).hash::<MixHasher>()
        );
    }

    #[test]
    fn nullifier_leaf_scans_occupied_slots_only() {
        let mut leaf = NullifierLeaf::default();
        leaf.slots[0] = Fr::from(5u64);
        // count still 0: slot not yet committed, must be invisible
        assert_eq!(leaf.position_of(Fr::from(5u64)), None);
        leaf.count = 1;
        assert_eq!(leaf.position_of(Fr::from(5u64)), Some(0));
        assert_eq!(leaf.position_of(Fr::from(6u64)), None);
    }

    #[test]
    fn bond_leaf_set_detection() {
        assert!(!BondLeaf::default().is_set());
        let leaf = BondLeaf { base_token_id: 3, maturity_time: 1_700_000_000 };
        assert!(leaf.is_set());
        assert_eq!(leaf.encode_leaf_hash(), vec![Fr::from(3u64), Fr::from(1_700_000_000u64)]);
    }
}

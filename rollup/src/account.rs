//! Account state.
//!
//! Each account owns a token subtree; the account leaf commits to the
//! rollup address, the nonce and that subtree's root. System accounts
//! (ids below the reserved range) keep an all-default token subtree, so
//! burns and mints leave no balance trail.

use std::collections::HashMap;

use tenor_primitives::{FieldHasher, Fr};
use tenor_smt::SmtTree;

use crate::error::{RollupError, RollupResult};
use crate::leaves::TokenLeaf;
use crate::types::{AccountId, Delta, TokenId};

/// Width of a rollup address in bits.
pub const TS_ADDR_BITS: usize = 160;

/// Derives the rollup address committed by an account leaf. The unset
/// key (0, 0) maps to address zero.
pub fn ts_addr_of<H: FieldHasher>(pub_key: (Fr, Fr)) -> Fr {
    if pub_key.0.is_zero() && pub_key.1.is_zero() {
        return Fr::zero();
    }
    Fr::from_u256(H::hash(&[pub_key.0, pub_key.1]).low_bits(TS_ADDR_BITS))
}

/// One rollup account and its token subtree.
#[derive(Clone, Debug)]
pub struct RollupAccount<H: FieldHasher> {
    id: AccountId,
    pub_key: (Fr, Fr),
    nonce: u64,
    normal: bool,
    token_tree: SmtTree<H>,
    token_leaves: HashMap<TokenId, TokenLeaf>,
}

impl<H: FieldHasher> RollupAccount<H> {
    /// An account with no key, no balances and nonce zero. `normal`
    /// accounts track balances; system accounts ignore token updates.
    pub fn new(id: AccountId, token_tree_height: u32, normal: bool) -> RollupResult<Self> {
        Ok(Self {
            id,
            pub_key: (Fr::zero(), Fr::zero()),
            nonce: 0,
            normal,
            token_tree: SmtTree::new(&[], token_tree_height, TokenLeaf::default().hash::<H>())?,
            token_leaves: HashMap::new(),
        })
    }

    /// Account id.
    pub fn id(&self) -> AccountId {
        self.id
    }

    /// Current nonce.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Public key, (0, 0) until registered.
    pub fn pub_key(&self) -> (Fr, Fr) {
        self.pub_key
    }

    /// Whether this account tracks balances.
    pub fn is_normal(&self) -> bool {
        self.normal
    }

    /// Rollup address of the current key.
    pub fn ts_addr(&self) -> Fr {
        ts_addr_of::<H>(self.pub_key)
    }

    /// Installs the key of a freshly registered account.
    pub fn set_pub_key(&mut self, pub_key: (Fr, Fr)) {
        self.pub_key = pub_key;
    }

    /// Checks and bumps the nonce. Normal accounts consume strictly
    /// increasing nonces; system accounts must present the current one
    /// and keep it.
    pub fn consume_nonce(&mut self, nonce: u64) -> RollupResult<()> {
        if nonce != self.nonce {
            return Err(RollupError::NonceMismatch {
                account: self.id,
                current: self.nonce,
                got: nonce,
            });
        }
        if self.normal {
            self.nonce += 1;
        }
        Ok(())
    }

    /// Balance leaf for `token_id`, default (0, 0) when untouched.
    pub fn token_leaf(&self, token_id: TokenId) -> TokenLeaf {
        self.token_leaves.get(&token_id).copied().unwrap_or_default()
    }

    /// Merkle path of `token_id` in the token subtree.
    pub fn token_proof(&self, token_id: TokenId) -> RollupResult<Vec<Fr>> {
        Ok(self.token_tree.proof(u64::from(token_id))?)
    }

    /// Root of the token subtree.
    pub fn token_root(&self) -> Fr {
        self.token_tree.root()
    }

    /// Applies balance and lock deltas to one token leaf. Underflow and
    /// overflow both fail without touching state. System accounts accept
    /// any delta and stay all-default.
    pub fn apply_token_delta(
        &mut self,
        token_id: TokenId,
        amount: Delta,
        locked: Delta,
    ) -> RollupResult<TokenLeaf> {
        if !self.normal {
            return Ok(TokenLeaf::default());
        }
        let old = self.token_leaf(token_id);
        let err = || {
            if amount.is_debit() || locked.is_debit() {
                RollupError::BalanceUnderflow { account: self.id, token: token_id }
            } else {
                RollupError::BalanceOverflow { account: self.id, token: token_id }
            }
        };
        let new = TokenLeaf {
            amount: amount.apply(old.amount).ok_or_else(err)?,
            locked: locked.apply(old.locked).ok_or_else(err)?,
        };
        self.token_leaves.insert(token_id, new);
        self.token_tree.update_leaf(u64::from(token_id), new.hash::<H>())?;
        Ok(new)
    }

    /// Account leaf tuple: address, nonce, token subtree root.
    pub fn encode_leaf(&self) -> [Fr; 3] {
        [self.ts_addr(), Fr::from(self.nonce), self.token_root()]
    }

    /// Hash of the account leaf.
    pub fn leaf_hash(&self) -> Fr {
        H::hash(&self.encode_leaf())
    }
}

#[cfg(test)]
mod tests {
    use tenor_primitives::testing::MixHasher;

    use super::*;

    #[test]
    fn unset_key_has_address_zero() {
        let acc = RollupAccount::<MixHasher>::new(5, 4, true).unwrap();
        assert!(acc.ts_addr().is_zero());
        let mut acc = acc;
        acc.set_pub_key((Fr::from(3u64), Fr::from(4u64)));
        assert!(!acc.ts_addr().is_zero());
        // address fits 160 bits
        assert_eq!(acc.ts_addr(), Fr::from_u256(acc.ts_addr().low_bits(160)));
    }

    #[test]
    fn deltas_move_the_subtree_root() {
        let mut acc = RollupAccount::<MixHasher>::new(7, 4, true).unwrap();
        let empty_root = acc.token_root();
        let leaf = acc.apply_token_delta(2, Delta::Add(900), Delta::None).unwrap();
        assert_eq!(leaf, TokenLeaf { amount: 900, locked: 0 });
        assert_ne!(acc.token_root(), empty_root);

        let leaf = acc.apply_token_delta(2, Delta::Sub(400), Delta::Add(100)).unwrap();
        assert_eq!(leaf, TokenLeaf { amount: 500, locked: 100 });

        let err = acc.apply_token_delta(2, Delta::Sub(501), Delta::None).unwrap_err();
        assert!(matches!(err, RollupError::BalanceUnderflow { account: 7, token: 2 }));
        // failed delta leaves the leaf untouched
        assert_eq!(acc.token_leaf(2), TokenLeaf { amount: 500, locked: 100 });
    }

    #[test]
    fn system_account_swallows_deltas() {
        let mut acc = RollupAccount::<MixHasher>::new(0, 4, false).unwrap();
        let root = acc.token_root();
        let leaf = acc.apply_token_delta(9, Delta::Sub(1 << 40), Delta::None).unwrap();
        assert_eq!(leaf, TokenLeaf::default());
        assert_eq!(acc.token_root(), root);
        // system nonces check but never advance
        acc.consume_nonce(0).unwrap();
        acc.consume_nonce(0).unwrap();
    }
}

//! Transaction requests.
//!
//! A [`TxRequest`] carries the seventeen-field message tuple the circuit
//! verifies (kind, account, token, amount, nonce, two fee rates and ten
//! argument slots), the placer's signature, and a typed metadata variant
//! describing the off-tuple inputs a handler needs. Metadata is validated
//! when the request is built, not probed at the point of use.

use serde::{Deserialize, Serialize};
use tenor_primitives::{Fr, Signature};

use crate::types::{AccountId, Amount, OrderId, Timestamp, TokenId};

/// Number of field elements in the request message tuple.
pub const TX_MESSAGE_LEN: usize = 17;

/// Transaction kind tags; the values are the 8-bit wire tags used by the
/// chunk packer and the circuit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TxKind {
    /// Padding transaction; touches every tree in the no-op shape.
    Noop = 0,
    /// Create the next sequential account.
    Register = 1,
    /// Credit a token balance from L1.
    Deposit = 2,
    /// Debit an account's entire balance of one token, L1-initiated.
    ForceWithdraw = 3,
    /// Move balance between two accounts.
    Transfer = 4,
    /// Debit a balance back to L1.
    Withdraw = 5,
    /// Place a lend-side auction order.
    AuctionLend = 6,
    /// Place a borrow-side auction order.
    AuctionBorrow = 7,
    /// Open an auction match: take the borrow order off the book.
    AuctionStart = 8,
    /// Fill one lend order inside an open auction match.
    AuctionMatch = 9,
    /// Settle the borrower side and close the auction match.
    AuctionEnd = 10,
    /// Place a secondary-market limit order.
    SecondLimitOrder = 11,
    /// Open a secondary match: take the limit taker order off the book.
    SecondLimitStart = 12,
    /// Fill one resting maker order against the held limit taker.
    SecondLimitExchange = 13,
    /// Settle the limit taker and close the secondary match.
    SecondLimitEnd = 14,
    /// Place a secondary-market market order (never rests in the tree).
    SecondMarketOrder = 15,
    /// Fill one resting maker order against the held market taker.
    SecondMarketExchange = 16,
    /// Settle the market taker and close the secondary match.
    SecondMarketEnd = 17,
    /// Cancel a resting order and unlock its balance.
    CancelOrder = 18,
    /// Advance the smaller nullifier epoch and reset its tree.
    IncreaseEpoch = 19,
    /// Register a bond token in the bond tree.
    CreateBondToken = 20,
    /// Convert a matured bond balance into its underlying token.
    Redeem = 21,
    /// Withdraw the accrued fee balance of one token.
    WithdrawFee = 22,
    /// Install the admin address and public key.
    SetAdminAddr = 23,
}

impl TxKind {
    /// Kinds that place a resting or in-flight order; these consume a
    /// nullifier slot keyed by the order hash instead of the implicit
    /// zero-hash slot.
    pub fn is_order_placement(self) -> bool {
        matches!(
            self,
            TxKind::AuctionLend
                | TxKind::AuctionBorrow
                | TxKind::SecondLimitOrder
                | TxKind::SecondMarketOrder
        )
    }

    /// Kinds signed by the admin key once an admin address is installed.
    pub fn is_admin(self) -> bool {
        matches!(
            self,
            TxKind::Noop
                | TxKind::Register
                | TxKind::Deposit
                | TxKind::ForceWithdraw
                | TxKind::AuctionStart
                | TxKind::AuctionMatch
                | TxKind::AuctionEnd
                | TxKind::SecondLimitStart
                | TxKind::SecondLimitExchange
                | TxKind::SecondLimitEnd
                | TxKind::SecondMarketExchange
                | TxKind::SecondMarketEnd
                | TxKind::IncreaseEpoch
                | TxKind::CreateBondToken
                | TxKind::WithdrawFee
                | TxKind::SetAdminAddr
        )
    }
}

/// Which side of a secondary-market order the placer takes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// Buying the main quantity, paying the base quantity.
    Buy,
    /// Selling the main quantity.
    Sell,
}

/// Off-tuple inputs a handler needs, one variant per request family.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxMeta {
    /// Kinds that need nothing beyond the message tuple.
    None,
    /// Account creation: the public key the new account commits to.
    Register {
        /// EdDSA-style public key of the new account.
        pub_key: (Fr, Fr),
    },
    /// Order placement: where the order rests and what it locks.
    PlaceOrder {
        /// Order-tree slot assigned by the sequencer.
        order_id: OrderId,
        /// Pre-computed locked amount for secondary orders; auction
        /// orders lock an engine-computed amount instead.
        locked_amt: Option<Amount>,
        /// Maturity of the traded bond, echoed for secondary orders.
        maturity_time: Timestamp,
    },
    /// Phase opener: which resting order the match works on.
    StartMatch {
        /// Order-tree slot of the order taken off the book.
        order_id: OrderId,
    },
    /// One secondary-market fill (exchange or end step).
    MatchStep {
        /// Order-tree slot of the order being filled.
        order_id: OrderId,
        /// Whether this fill exhausts the order's sell amount.
        full_matched: bool,
        /// Sell-side amount matched by this step.
        matched_sell_amt: Amount,
        /// Buy-side amount matched by this step.
        matched_buy_amt: Amount,
        /// Token the fee is charged in.
        fee_token_id: TokenId,
        /// Fee charged by this step; cross-checked against the rate.
        fee_amt: Amount,
    },
    /// One lend-order fill inside an auction match.
    AuctionMatch {
        /// Order-tree slot of the lend order being filled.
        order_id: OrderId,
        /// Whether this fill exhausts the lend amount.
        full_matched: bool,
        /// Lend amount matched by this step.
        matched_lend_amt: Amount,
        /// Bond amount credited to the lender.
        matched_bond_amt: Amount,
        /// Bond token minted to the lender.
        bond_token_id: TokenId,
        /// Token the lender fee is charged in.
        fee_token_id: TokenId,
        /// Lender fee; cross-checked against the rate.
        fee_amt: Amount,
    },
    /// Borrower-side settlement closing an auction match.
    AuctionEnd {
        /// Order-tree slot of the held borrow order.
        order_id: OrderId,
        /// Whether the settlement exhausts the borrow amount.
        full_matched: bool,
        /// Collateral consumed by the settlement.
        matched_collateral_amt: Amount,
        /// Borrowed amount credited to the borrower.
        matched_borrow_amt: Amount,
        /// Debt recorded for pubdata.
        matched_debt_amt: Amount,
        /// Bond token of the match, for pubdata.
        bond_token_id: TokenId,
        /// Token the borrower fee is charged in.
        fee_token_id: TokenId,
        /// Borrower fee; cross-checked against the rate.
        fee_amt: Amount,
    },
    /// Order cancellation.
    CancelOrder {
        /// Order-tree slot being cleared.
        order_id: OrderId,
        /// Public key of the order's owner, echoed into the witness.
        pub_key: (Fr, Fr),
    },
    /// Admin key installation.
    SetAdmin {
        /// Public key the admin address must hash to.
        pub_key: (Fr, Fr),
    },
}

/// One transaction request, as accepted by
/// [`RollupState::apply_transaction`](crate::state::RollupState::apply_transaction).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    /// Transaction kind.
    pub kind: TxKind,
    /// Acting account (sender for user transactions).
    pub account_id: AccountId,
    /// Primary token of the request.
    pub token_id: TokenId,
    /// Primary amount of the request.
    pub amount: Amount,
    /// Sender nonce, where the kind consumes one.
    pub nonce: u64,
    /// First fee rate (taker fee for orders).
    pub fee0: Amount,
    /// Second fee rate (maker fee for limit orders).
    pub fee1: Amount,
    /// Ten argument slots; meaning depends on the kind.
    pub args: [Fr; 10],
    /// Placer's signature over the message hash.
    pub sig: Signature,
    /// Kind-specific off-tuple inputs.
    pub meta: TxMeta,
    /// Token whose fee leaf the no-op fee pair touches.
    pub fee_token_id: TokenId,
    /// Bond-token hint for the no-op bond pair.
    pub bond_token_id: TokenId,
    /// Match timestamp override for pubdata; block time when absent.
    pub matched_time: Option<Timestamp>,
}

impl TxRequest {
    fn empty(kind: TxKind) -> Self {
        Self {
            kind,
            account_id: 0,
            token_id: 0,
            amount: 0,
            nonce: 0,
            fee0: 0,
            fee1: 0,
            args: [Fr::zero(); 10],
            sig: Signature::empty(),
            meta: TxMeta::None,
            fee_token_id: 0,
            bond_token_id: 0,
            matched_time: None,
        }
    }

    /// The seventeen-field tuple the circuit verifies and the admin signs.
    pub fn encode_message(&self) -> [Fr; TX_MESSAGE_LEN] {
        let mut out = [Fr::zero(); TX_MESSAGE_LEN];
        out[0] = Fr::from(self.kind as u8);
        out[1] = Fr::from(self.account_id);
        out[2] = Fr::from(self.token_id);
        out[3] = Fr::from(self.amount);
        out[4] = Fr::from(self.nonce);
        out[5] = Fr::from(self.fee0);
        out[6] = Fr::from(self.fee1);
        out[7..].copy_from_slice(&self.args);
        out
    }

    /// Receiver account carried in argument slot 0.
    pub fn receiver_id(&self) -> AccountId {
        self.args[0].low_u64() as AccountId
    }

    /// Maturity timestamp carried in argument slot 1.
    pub fn maturity_time(&self) -> Timestamp {
        self.args[1].low_u64()
    }

    /// Expiry timestamp carried in argument slot 2.
    pub fn expire_time(&self) -> Timestamp {
        self.args[2].low_u64()
    }

    /// Counter-token carried in argument slot 4.
    pub fn trade_token_id(&self) -> TokenId {
        self.args[4].low_u64() as TokenId
    }

    /// Counter-amount carried in argument slot 5.
    pub fn trade_amount(&self) -> Amount {
        self.args[5].low_u128()
    }

    /// Rollup address carried in argument slot 6.
    pub fn ts_addr(&self) -> Fr {
        self.args[6]
    }

    // --- builders -------------------------------------------------------

    /// Padding transaction.
    pub fn noop() -> Self {
        Self::empty(TxKind::Noop)
    }

    /// Create account `receiver_id` with `pub_key`, optionally seeded
    /// with `amount` of `token_id`.
    pub fn register(
        receiver_id: AccountId,
        token_id: TokenId,
        amount: Amount,
        ts_addr: Fr,
        pub_key: (Fr, Fr),
    ) -> Self {
        let mut tx = Self::empty(TxKind::Register);
        tx.token_id = token_id;
        tx.amount = amount;
        tx.args[0] = Fr::from(receiver_id);
        tx.args[6] = ts_addr;
        tx.meta = TxMeta::Register { pub_key };
        tx
    }

    /// Credit `amount` of `token_id` to `receiver_id`.
    pub fn deposit(receiver_id: AccountId, token_id: TokenId, amount: Amount) -> Self {
        let mut tx = Self::empty(TxKind::Deposit);
        tx.token_id = token_id;
        tx.amount = amount;
        tx.args[0] = Fr::from(receiver_id);
        tx
    }

    /// Move `amount` of `token_id` from `sender_id` to `receiver_id`.
    pub fn transfer(
        sender_id: AccountId,
        token_id: TokenId,
        amount: Amount,
        nonce: u64,
        receiver_id: AccountId,
        sig: Signature,
    ) -> Self {
        let mut tx = Self::empty(TxKind::Transfer);
        tx.account_id = sender_id;
        tx.token_id = token_id;
        tx.amount = amount;
        tx.nonce = nonce;
        tx.args[0] = Fr::from(receiver_id);
        tx.sig = sig;
        tx
    }

    /// Debit `amount` of `token_id` from `sender_id` back to L1.
    pub fn withdraw(
        sender_id: AccountId,
        token_id: TokenId,
        amount: Amount,
        nonce: u64,
        sig: Signature,
    ) -> Self {
        let mut tx = Self::empty(TxKind::Withdraw);
        tx.account_id = sender_id;
        tx.token_id = token_id;
        tx.amount = amount;
        tx.nonce = nonce;
        tx.sig = sig;
        tx
    }

    /// Debit the whole `token_id` balance of `receiver_id`, L1-initiated.
    pub fn force_withdraw(receiver_id: AccountId, token_id: TokenId) -> Self {
        let mut tx = Self::empty(TxKind::ForceWithdraw);
        tx.token_id = token_id;
        tx.args[0] = Fr::from(receiver_id);
        tx
    }

    /// Convert `amount` of bond token `token_id` into its underlying.
    pub fn redeem(
        sender_id: AccountId,
        token_id: TokenId,
        amount: Amount,
        nonce: u64,
        sig: Signature,
    ) -> Self {
        let mut tx = Self::empty(TxKind::Redeem);
        tx.account_id = sender_id;
        tx.token_id = token_id;
        tx.amount = amount;
        tx.nonce = nonce;
        tx.sig = sig;
        tx
    }

    /// Place a lend-side auction order resting at `order_id`.
    pub fn auction_lend(order_id: OrderId, order: &AuctionLendOrder, sig: Signature) -> Self {
        let mut tx = Self::empty(TxKind::AuctionLend);
        tx.account_id = order.sender_id;
        tx.token_id = order.lend_token_id;
        tx.amount = order.lend_amt;
        tx.nonce = order.nonce;
        tx.fee0 = order.fee_rate;
        tx.args[1] = Fr::from(order.maturity_time);
        tx.args[2] = Fr::from(order.expire_time);
        tx.args[3] = Fr::from(order.interest);
        tx.args[7] = Fr::from(order.epoch);
        tx.sig = sig;
        tx.meta = TxMeta::PlaceOrder {
            order_id,
            locked_amt: None,
            maturity_time: order.maturity_time,
        };
        tx
    }

    /// Place a borrow-side auction order resting at `order_id`.
    pub fn auction_borrow(order_id: OrderId, order: &AuctionBorrowOrder, sig: Signature) -> Self {
        let mut tx = Self::empty(TxKind::AuctionBorrow);
        tx.account_id = order.sender_id;
        tx.token_id = order.collateral_token_id;
        tx.amount = order.collateral_amt;
        tx.nonce = order.nonce;
        tx.fee0 = order.fee_rate;
        tx.args[1] = Fr::from(order.maturity_time);
        tx.args[2] = Fr::from(order.expire_time);
        tx.args[3] = Fr::from(order.interest);
        tx.args[4] = Fr::from(order.borrow_token_id);
        tx.args[5] = Fr::from(order.borrow_amt);
        tx.args[7] = Fr::from(order.epoch);
        tx.sig = sig;
        tx.meta = TxMeta::PlaceOrder {
            order_id,
            locked_amt: None,
            maturity_time: order.maturity_time,
        };
        tx
    }

    fn secondary_order(
        kind: TxKind,
        order_id: OrderId,
        order: &SecondaryOrder,
        current_time: Timestamp,
        sig: Signature,
    ) -> Self {
        let mut tx = Self::empty(kind);
        tx.account_id = order.sender_id;
        tx.token_id = order.sell_token_id;
        tx.amount = order.sell_amt;
        tx.nonce = order.nonce;
        tx.fee0 = order.taker_fee;
        tx.fee1 = if kind == TxKind::SecondLimitOrder { order.maker_fee } else { 0 };
        tx.args[1] = Fr::from(order.maturity_time);
        tx.args[2] = Fr::from(order.expire_time);
        tx.args[4] = Fr::from(order.buy_token_id);
        tx.args[5] = Fr::from(order.buy_amt);
        tx.args[7] = Fr::from(order.epoch);
        tx.args[8] = Fr::from(matches!(order.side, Side::Sell) as u8);
        tx.sig = sig;

        let is_sell = matches!(order.side, Side::Sell);
        let (mq, bq) = if is_sell {
            (order.sell_amt, order.buy_amt)
        } else {
            (order.buy_amt, order.sell_amt)
        };
        let days_from_expire =
            crate::types::span_days(order.expire_time, order.maturity_time);
        let days_from_now = crate::types::span_days(current_time, order.maturity_time);
        let max_fee_rate = tx.fee0.max(tx.fee1);
        let locked_amt = crate::fees::calc_secondary_locked_amt(
            kind == TxKind::SecondLimitOrder,
            is_sell,
            mq,
            bq,
            days_from_now,
            days_from_expire,
            max_fee_rate,
        );
        tx.meta = TxMeta::PlaceOrder {
            order_id,
            locked_amt: Some(locked_amt),
            maturity_time: order.maturity_time,
        };
        tx.bond_token_id = if is_sell { order.sell_token_id } else { order.buy_token_id };
        tx.fee_token_id = if is_sell { order.buy_token_id } else { order.sell_token_id };
        tx
    }

    /// Place a secondary-market limit order resting at `order_id`.
    pub fn second_limit_order(
        order_id: OrderId,
        order: &SecondaryOrder,
        current_time: Timestamp,
        sig: Signature,
    ) -> Self {
        Self::secondary_order(TxKind::SecondLimitOrder, order_id, order, current_time, sig)
    }

    /// Place a secondary-market market order; it is matched immediately
    /// and never rests in the order tree.
    pub fn second_market_order(
        order_id: OrderId,
        order: &SecondaryOrder,
        current_time: Timestamp,
        sig: Signature,
    ) -> Self {
        Self::secondary_order(TxKind::SecondMarketOrder, order_id, order, current_time, sig)
    }

    /// Cancel the order resting at `order_id`.
    pub fn cancel_order(
        order_id: OrderId,
        sender_id: AccountId,
        order_tx_id: u64,
        order_num: u64,
        pub_key: (Fr, Fr),
        sig: Signature,
    ) -> Self {
        let mut tx = Self::empty(TxKind::CancelOrder);
        tx.account_id = sender_id;
        tx.args[1] = Fr::from(order_tx_id);
        tx.args[2] = Fr::from(order_num);
        tx.sig = sig;
        tx.meta = TxMeta::CancelOrder { order_id, pub_key };
        tx
    }

    /// Open an auction match on the borrow order at `order_id`.
    pub fn auction_start(order_id: OrderId) -> Self {
        let mut tx = Self::empty(TxKind::AuctionStart);
        tx.meta = TxMeta::StartMatch { order_id };
        tx
    }

    /// Fill the lend order at `order_id` inside an open auction match.
    pub fn auction_match(order_id: OrderId, fill: &AuctionFill) -> Self {
        let mut tx = Self::empty(TxKind::AuctionMatch);
        tx.meta = TxMeta::AuctionMatch {
            order_id,
            full_matched: fill.full_matched,
            matched_lend_amt: fill.matched_lend_amt,
            matched_bond_amt: fill.matched_bond_amt,
            bond_token_id: fill.bond_token_id,
            fee_token_id: fill.fee_token_id,
            fee_amt: fill.fee_amt,
        };
        tx
    }

    /// Settle the borrower side of the held auction order.
    pub fn auction_end(order_id: OrderId, settle: &AuctionSettle) -> Self {
        let mut tx = Self::empty(TxKind::AuctionEnd);
        tx.meta = TxMeta::AuctionEnd {
            order_id,
            full_matched: settle.full_matched,
            matched_collateral_amt: settle.matched_collateral_amt,
            matched_borrow_amt: settle.matched_borrow_amt,
            matched_debt_amt: settle.matched_debt_amt,
            bond_token_id: settle.bond_token_id,
            fee_token_id: settle.fee_token_id,
            fee_amt: settle.fee_amt,
        };
        tx
    }

    /// Open a secondary match on the limit taker order at `order_id`.
    pub fn second_limit_start(order_id: OrderId) -> Self {
        let mut tx = Self::empty(TxKind::SecondLimitStart);
        tx.meta = TxMeta::StartMatch { order_id };
        tx
    }

    /// Fill the resting maker order at `order_id` against the held taker.
    pub fn second_exchange(kind: TxKind, order_id: OrderId, fill: &SecondaryFill) -> Self {
        debug_assert!(matches!(
            kind,
            TxKind::SecondLimitExchange | TxKind::SecondMarketExchange
        ));
        let mut tx = Self::empty(kind);
        tx.meta = TxMeta::MatchStep {
            order_id,
            full_matched: fill.full_matched,
            matched_sell_amt: fill.matched_sell_amt,
            matched_buy_amt: fill.matched_buy_amt,
            fee_token_id: fill.fee_token_id,
            fee_amt: fill.fee_amt,
        };
        tx
    }

    /// Settle the held taker order and close the secondary match.
    pub fn second_end(kind: TxKind, order_id: OrderId, fill: &SecondaryFill) -> Self {
        debug_assert!(matches!(kind, TxKind::SecondLimitEnd | TxKind::SecondMarketEnd));
        let mut tx = Self::empty(kind);
        tx.meta = TxMeta::MatchStep {
            order_id,
            full_matched: fill.full_matched,
            matched_sell_amt: fill.matched_sell_amt,
            matched_buy_amt: fill.matched_buy_amt,
            fee_token_id: fill.fee_token_id,
            fee_amt: fill.fee_amt,
        };
        tx
    }

    /// Advance the smaller nullifier epoch.
    pub fn increase_epoch() -> Self {
        Self::empty(TxKind::IncreaseEpoch)
    }

    /// Register bond token `bond_token_id` settling into `base_token_id`
    /// at `maturity_time`.
    pub fn create_bond_token(
        bond_token_id: TokenId,
        maturity_time: Timestamp,
        base_token_id: TokenId,
    ) -> Self {
        let mut tx = Self::empty(TxKind::CreateBondToken);
        tx.token_id = bond_token_id;
        tx.args[1] = Fr::from(maturity_time);
        tx.args[4] = Fr::from(base_token_id);
        tx
    }

    /// Withdraw the accrued fee balance of `token_id`.
    pub fn withdraw_fee(token_id: TokenId) -> Self {
        let mut tx = Self::empty(TxKind::WithdrawFee);
        tx.token_id = token_id;
        tx
    }

    /// Install the admin address and its public key.
    pub fn set_admin(ts_addr: Fr, pub_key: (Fr, Fr)) -> Self {
        let mut tx = Self::empty(TxKind::SetAdminAddr);
        tx.args[6] = ts_addr;
        tx.meta = TxMeta::SetAdmin { pub_key };
        tx
    }
}

/// Parameters of a lend-side auction order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuctionLendOrder {
    /// Placing account.
    pub sender_id: AccountId,
    /// Token being lent.
    pub lend_token_id: TokenId,
    /// Amount being lent.
    pub lend_amt: Amount,
    /// Order nonce.
    pub nonce: u64,
    /// Lender fee rate.
    pub fee_rate: Amount,
    /// Maturity of the bond being auctioned.
    pub maturity_time: Timestamp,
    /// Expiry of the order.
    pub expire_time: Timestamp,
    /// Minimum acceptable interest, scaled by 10^8.
    pub interest: Amount,
    /// Epoch the order binds its nullifier to.
    pub epoch: u64,
}

/// Parameters of a borrow-side auction order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuctionBorrowOrder {
    /// Placing account.
    pub sender_id: AccountId,
    /// Token posted as collateral.
    pub collateral_token_id: TokenId,
    /// Collateral amount locked by the placement.
    pub collateral_amt: Amount,
    /// Order nonce.
    pub nonce: u64,
    /// Borrower fee rate.
    pub fee_rate: Amount,
    /// Maturity of the bond being auctioned.
    pub maturity_time: Timestamp,
    /// Expiry of the order.
    pub expire_time: Timestamp,
    /// Maximum acceptable interest, scaled by 10^8.
    pub interest: Amount,
    /// Token being borrowed.
    pub borrow_token_id: TokenId,
    /// Amount being borrowed.
    pub borrow_amt: Amount,
    /// Epoch the order binds its nullifier to.
    pub epoch: u64,
}

/// Parameters of a secondary-market order (limit or market).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecondaryOrder {
    /// Placing account.
    pub sender_id: AccountId,
    /// Token sold.
    pub sell_token_id: TokenId,
    /// Amount sold.
    pub sell_amt: Amount,
    /// Order nonce.
    pub nonce: u64,
    /// Taker fee rate.
    pub taker_fee: Amount,
    /// Maker fee rate; ignored for market orders.
    pub maker_fee: Amount,
    /// Maturity of the traded bond.
    pub maturity_time: Timestamp,
    /// Expiry of the order.
    pub expire_time: Timestamp,
    /// Token bought.
    pub buy_token_id: TokenId,
    /// Amount bought.
    pub buy_amt: Amount,
    /// Epoch the order binds its nullifier to.
    pub epoch: u64,
    /// Which side of the bond the placer takes.
    pub side: Side,
}

/// One lend-order fill supplied to [`TxRequest::auction_match`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuctionFill {
    /// Whether this fill exhausts the lend order.
    pub full_matched: bool,
    /// Lend amount matched.
    pub matched_lend_amt: Amount,
    /// Bond amount credited to the lender.
    pub matched_bond_amt: Amount,
    /// Bond token minted to the lender.
    pub bond_token_id: TokenId,
    /// Token the lender fee is charged in.
    pub fee_token_id: TokenId,
    /// Lender fee.
    pub fee_amt: Amount,
}

/// Borrower-side settlement supplied to [`TxRequest::auction_end`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuctionSettle {
    /// Whether the settlement exhausts the borrow amount.
    pub full_matched: bool,
    /// Collateral consumed.
    pub matched_collateral_amt: Amount,
    /// Borrowed amount credited.
    pub matched_borrow_amt: Amount,
    /// Debt recorded for pubdata.
    pub matched_debt_amt: Amount,
    /// Bond token of the match.
    pub bond_token_id: TokenId,
    /// Token the borrower fee is charged in.
    pub fee_token_id: TokenId,
    /// Borrower fee.
    pub fee_amt: Amount,
}

/// One secondary-market fill supplied to the exchange/end builders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecondaryFill {
    /// Whether this fill exhausts the order's sell amount.
    pub full_matched: bool,
    /// Sell-side amount matched.
    pub matched_sell_amt: Amount,
    /// Buy-side amount matched.
    pub matched_buy_amt: Amount,
    /// Token the fee is charged in.
    pub fee_token_id: TokenId,
    /// Fee charged.
    pub fee_amt: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_tuple_layout() {
        let sig = Signature::empty();
        let tx = TxRequest::transfer(7, 3, 250, 4, 9, sig);
        let msg = tx.encode_message();
        assert_eq!(msg[0], Fr::from(TxKind::Transfer as u8));
        assert_eq!(msg[1], Fr::from(7u32));
        assert_eq!(msg[2], Fr::from(3u16));
        assert_eq!(msg[3], Fr::from(250u64));
        assert_eq!(msg[4], Fr::from(4u64));
        assert_eq!(msg[7], Fr::from(9u32));
        assert!(msg[8..].iter().all(|f| f.is_zero()));
    }

    #[test]
    fn placement_and_admin_classes() {
        assert!(TxKind::AuctionLend.is_order_placement());
        assert!(TxKind::SecondMarketOrder.is_order_placement());
        assert!(!TxKind::CancelOrder.is_order_placement());
        assert!(TxKind::AuctionMatch.is_admin());
        assert!(TxKind::Noop.is_admin());
        assert!(!TxKind::Transfer.is_admin());
        assert!(!TxKind::AuctionLend.is_admin());
    }

    #[test]
    fn secondary_sell_order_locks_sell_amount() {
        let order = SecondaryOrder {
            sender_id: 101,
            sell_token_id: 40,
            sell_amt: 5_000,
            nonce: 1,
            taker_fee: 0,
            maker_fee: 0,
            maturity_time: 86_400 * 800,
            expire_time: 86_400 * 700,
            buy_token_id: 2,
            buy_amt: 4_800,
            epoch: 1,
            side: Side::Sell,
        };
        let tx = TxRequest::second_limit_order(9, &order, 86_400 * 600, Signature::empty());
        match tx.meta {
            TxMeta::PlaceOrder { locked_amt: Some(l), order_id, .. } => {
                assert_eq!(l, 5_000);
                assert_eq!(order_id, 9);
            }
            ref other => panic!("unexpected meta: {other:?}"),
        }
        // sell side: fee charged in the buy token, bond is the sell token
        assert_eq!(tx.fee_token_id, 2);
        assert_eq!(tx.bond_token_id, 40);
        assert_eq!(tx.args[8], Fr::one());
    }
}

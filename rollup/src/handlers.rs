//! Per-kind transaction handlers.
//!
//! Every handler produces the same witness shape: two account/token
//! bracket pairs, one order bracket, one nullifier bracket, one fee
//! bracket and one bond bracket (the caller supplies no-op pairs for
//! the trees a kind leaves alone). Balance moves go through [`Delta`]
//! so under- and overflow fail before any tree is touched.

use tenor_primitives::FieldHasher;

use crate::account::{ts_addr_of, RollupAccount};
use crate::chunk::ChunkExtras;
use crate::error::{RollupError, RollupResult};
use crate::fees::{borrow_fee, lend_fee, secondary_fee};
use crate::leaves::{BondLeaf, OrderLeaf};
use crate::state::RollupState;
use crate::tx::{TxKind, TxMeta, TxRequest};
use crate::types::{span_days, AccountId, Amount, Delta, OrderId, TokenId, BURN_ACCOUNT};

fn meta_err(req: &TxRequest) -> RollupError {
    RollupError::InvalidMetadata { kind: req.kind }
}

fn ctx_err(req: &TxRequest, detail: &'static str) -> RollupError {
    RollupError::MatchContext { kind: req.kind, detail }
}

impl<H: FieldHasher> RollupState<H> {
    pub(crate) fn dispatch(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        match req.kind {
            TxKind::Noop => self.do_system_noop(req),
            TxKind::Register => self.do_register(req),
            TxKind::Deposit => self.do_deposit(req),
            TxKind::ForceWithdraw => self.do_force_withdraw(req),
            TxKind::Transfer => self.do_transfer(req),
            TxKind::Withdraw => self.do_withdraw(req),
            TxKind::AuctionLend | TxKind::AuctionBorrow => self.do_auction_order(req),
            TxKind::AuctionStart => self.do_auction_start(req),
            TxKind::AuctionMatch => self.do_auction_match(req),
            TxKind::AuctionEnd => self.do_auction_end(req),
            TxKind::SecondLimitOrder => self.do_second_limit_order(req),
            TxKind::SecondMarketOrder => self.do_second_market_order(req),
            TxKind::SecondLimitStart => self.do_second_limit_start(req),
            TxKind::SecondLimitExchange | TxKind::SecondMarketExchange => {
                self.do_second_exchange(req)
            }
            TxKind::SecondLimitEnd | TxKind::SecondMarketEnd => self.do_second_end(req),
            TxKind::CancelOrder => self.do_cancel_order(req),
            TxKind::IncreaseEpoch => self.do_increase_epoch(req),
            TxKind::CreateBondToken => self.do_create_bond_token(req),
            TxKind::Redeem => self.do_redeem(req),
            TxKind::WithdrawFee => self.do_withdraw_fee(req),
            TxKind::SetAdminAddr => self.do_set_admin_addr(req),
        }
    }

    fn extras_for(&self, req: &TxRequest) -> ChunkExtras {
        ChunkExtras {
            matched_time: req.matched_time.unwrap_or(self.current_time),
            ..ChunkExtras::default()
        }
    }

    fn use_request_sig(&mut self, req: &TxRequest) {
        self.tx.sig_r = [req.sig.r8.0, req.sig.r8.1];
        self.tx.sig_s = req.sig.s;
    }

    fn use_account_key(&mut self, id: AccountId) -> RollupResult<()> {
        let key = self.existing_account(id)?.pub_key();
        self.tx.ts_pub_key = [key.0, key.1];
        Ok(())
    }

    /// The shared shape of kinds that touch no account, order or token:
    /// two no-op pairs on the burn account and one on order slot zero.
    fn noop_brackets(&mut self) -> RollupResult<()> {
        self.account_and_token_before(BURN_ACCOUNT, 0)?;
        self.account_and_token_after(BURN_ACCOUNT, 0)?;
        self.account_and_token_before(BURN_ACCOUNT, 0)?;
        self.account_and_token_after(BURN_ACCOUNT, 0)?;
        self.order_before(0)?;
        self.order_after(0)
    }

    fn do_system_noop(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        self.noop_brackets()?;
        Ok(self.extras_for(req))
    }

    fn do_register(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        let TxMeta::Register { pub_key } = req.meta else {
            return Err(meta_err(req));
        };
        let id = req.receiver_id();
        let mut account =
            RollupAccount::new(id, self.config.token_tree_height, true)?;
        account.set_pub_key(pub_key);
        if req.token_id != 0 && req.amount > 0 {
            account.apply_token_delta(req.token_id, Delta::Add(req.amount), Delta::None)?;
        }

        self.account_and_token_before(id, req.token_id)?;
        self.add_account(id, account)?;
        self.account_and_token_after(id, req.token_id)?;
        self.account_and_token_before(id, req.token_id)?;
        self.account_and_token_after(id, req.token_id)?;
        self.order_before(0)?;
        self.order_after(0)?;

        self.tx.ts_pub_key = [pub_key.0, pub_key.1];
        Ok(self.extras_for(req))
    }

    fn do_deposit(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        let id = req.receiver_id();
        self.existing_account(id)?;

        self.account_and_token_before(id, req.token_id)?;
        self.update_account_token(id, req.token_id, Delta::Add(req.amount), Delta::None)?;
        self.account_and_token_after(id, req.token_id)?;
        self.account_and_token_before(id, req.token_id)?;
        self.account_and_token_after(id, req.token_id)?;
        self.order_before(0)?;
        self.order_after(0)?;

        self.use_account_key(id)?;
        Ok(self.extras_for(req))
    }

    fn do_transfer(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        let sender = req.account_id;
        let receiver = req.receiver_id();

        self.account_and_token_before(sender, req.token_id)?;
        self.update_account_token(sender, req.token_id, Delta::Sub(req.amount), Delta::None)?;
        self.consume_nonce(sender, req.nonce)?;
        self.account_and_token_after(sender, req.token_id)?;

        self.account_and_token_before(receiver, req.token_id)?;
        self.update_account_token(receiver, req.token_id, Delta::Add(req.amount), Delta::None)?;
        self.account_and_token_after(receiver, req.token_id)?;
        self.order_before(0)?;
        self.order_after(0)?;

        self.use_account_key(sender)?;
        self.use_request_sig(req);
        Ok(self.extras_for(req))
    }

    fn do_withdraw(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        let sender = req.account_id;

        self.account_and_token_before(sender, req.token_id)?;
        self.update_account_token(sender, req.token_id, Delta::Sub(req.amount), Delta::None)?;
        self.consume_nonce(sender, req.nonce)?;
        self.account_and_token_after(sender, req.token_id)?;
        self.account_and_token_before(sender, req.token_id)?;
        self.account_and_token_after(sender, req.token_id)?;
        self.order_before(0)?;
        self.order_after(0)?;

        self.use_account_key(sender)?;
        self.use_request_sig(req);
        Ok(self.extras_for(req))
    }

    fn do_force_withdraw(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        let id = req.receiver_id();
        let full_amt = self.existing_account(id)?.token_leaf(req.token_id).amount;

        self.account_and_token_before(id, req.token_id)?;
        self.update_account_token(id, req.token_id, Delta::Sub(full_amt), Delta::None)?;
        self.account_and_token_after(id, req.token_id)?;
        self.account_and_token_before(id, req.token_id)?;
        self.account_and_token_after(id, req.token_id)?;
        self.order_before(0)?;
        self.order_after(0)?;

        self.use_account_key(id)?;
        self.use_request_sig(req);
        Ok(ChunkExtras { full_amt, ..self.extras_for(req) })
    }

    fn do_redeem(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        let sender = req.account_id;
        // the registry resolves which underlying the bond settles into
        let base_token_id = self.bond_tree.registered_leaf(req.token_id)?.base_token_id;
        self.existing_account(sender)?;

        self.bond_before(req.token_id)?;
        self.bond_after(req.token_id)?;

        self.account_before(sender)?;
        self.token_before(sender, req.token_id)?;
        self.consume_nonce(sender, req.nonce)?;
        self.update_account_token(sender, req.token_id, Delta::Sub(req.amount), Delta::None)?;
        self.token_after(sender, req.token_id)?;
        self.token_before(sender, base_token_id)?;
        self.update_account_token(sender, base_token_id, Delta::Add(req.amount), Delta::None)?;
        self.token_after(sender, base_token_id)?;
        self.account_after(sender)?;
        self.account_before(sender)?;
        self.account_after(sender)?;

        self.order_before(0)?;
        self.order_after(0)?;

        self.use_account_key(sender)?;
        self.use_request_sig(req);
        Ok(self.extras_for(req))
    }

    /// Places the order built from `req`, writing its anti-replay hash
    /// into the epoch's nullifier tree, and optionally the order tree.
    fn place_order(
        &mut self,
        req: &TxRequest,
        order_id: OrderId,
        locked_amt: Amount,
        rest_in_tree: bool,
    ) -> RollupResult<OrderLeaf> {
        let mut order = OrderLeaf::from_request(req);
        order.order_tx_id = self.latest_tx_id();
        order.locked_amt = locked_amt;

        let tree = self.nullifier_tree_for_epoch(order.epoch());
        let hash = order.encode_nullifier_hash::<H>();
        let (leaf_id, elem_id) = self.nullifier_trees[tree].prepare_insert(hash)?;

        self.order_before(order_id)?;
        self.nullifier_before(tree, elem_id, leaf_id)?;
        self.nullifier_trees[tree].commit_insert(hash)?;
        if rest_in_tree {
            self.order_tree.set_leaf(order_id, order.clone())?;
        }
        self.nullifier_after(tree, leaf_id)?;
        self.order_after(order_id)?;
        Ok(order)
    }

    fn do_auction_order(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        let TxMeta::PlaceOrder { order_id, .. } = req.meta else {
            return Err(meta_err(req));
        };
        let sender = req.account_id;
        self.existing_account(sender)?;

        let days = span_days(self.current_time, req.maturity_time());
        let lock_amt = if req.kind == TxKind::AuctionLend {
            req.amount + lend_fee(req.fee0, req.amount, days)
        } else {
            req.amount
        };

        self.account_and_token_before(sender, req.token_id)?;
        self.update_account_token(
            sender,
            req.token_id,
            Delta::Sub(lock_amt),
            Delta::Add(lock_amt),
        )?;
        self.account_and_token_after(sender, req.token_id)?;
        self.account_and_token_before(sender, req.token_id)?;
        self.account_and_token_after(sender, req.token_id)?;

        self.place_order(req, order_id, lock_amt, true)?;

        self.use_account_key(sender)?;
        self.use_request_sig(req);
        Ok(self.extras_for(req))
    }

    fn do_second_limit_order(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        let TxMeta::PlaceOrder { order_id, locked_amt: Some(locked_amt), .. } = req.meta
        else {
            return Err(meta_err(req));
        };
        let sender = req.account_id;
        self.existing_account(sender)?;

        self.account_and_token_before(sender, req.token_id)?;
        self.update_account_token(
            sender,
            req.token_id,
            Delta::Sub(locked_amt),
            Delta::Add(locked_amt),
        )?;
        self.account_and_token_after(sender, req.token_id)?;
        self.account_and_token_before(sender, req.token_id)?;
        self.account_and_token_after(sender, req.token_id)?;

        self.place_order(req, order_id, locked_amt, true)?;

        self.use_account_key(sender)?;
        self.use_request_sig(req);
        Ok(self.extras_for(req))
    }

    fn do_second_market_order(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        let TxMeta::PlaceOrder { order_id, locked_amt: Some(locked_amt), .. } = req.meta
        else {
            return Err(meta_err(req));
        };
        let sender = req.account_id;
        self.existing_account(sender)?;

        // a market order is matched within the block; nothing is locked
        // and the order never rests in the tree
        self.account_and_token_before(sender, req.token_id)?;
        self.account_and_token_after(sender, req.token_id)?;
        self.account_and_token_before(sender, req.token_id)?;
        self.account_and_token_after(sender, req.token_id)?;

        let order = self.place_order(req, order_id, locked_amt, false)?;
        self.held_taker_order = Some((order_id, order));

        self.use_account_key(sender)?;
        self.use_request_sig(req);
        Ok(self.extras_for(req))
    }

    fn do_second_limit_start(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        let TxMeta::StartMatch { order_id } = req.meta else {
            return Err(meta_err(req));
        };
        let order = self.order_tree.live_leaf(order_id)?;
        let sender = order.account_id;
        let sell_token = order.token_id;

        self.account_and_token_before(sender, sell_token)?;
        self.account_and_token_after(sender, sell_token)?;
        self.account_and_token_before(sender, sell_token)?;
        self.account_and_token_after(sender, sell_token)?;

        self.order_before(order_id)?;
        self.order_tree.remove_leaf(order_id)?;
        self.order_after(order_id)?;

        let tx_offset = (self.latest_tx_id() - order.order_tx_id) as u32;
        self.use_account_key(sender)?;
        self.held_taker_order = Some((order_id, order));
        Ok(ChunkExtras { tx_offset, ..self.extras_for(req) })
    }

    fn do_second_exchange(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        let TxMeta::MatchStep {
            order_id,
            full_matched,
            matched_sell_amt,
            matched_buy_amt,
            fee_token_id,
            fee_amt,
        } = req.meta
        else {
            return Err(meta_err(req));
        };
        let mut maker = self.order_tree.live_leaf(order_id)?;
        let sell_token = maker.token_id;
        let buy_token = maker.buy_token_id();
        let is_sell = maker.is_sell();

        // fees are charged in the base token at the maker's rate
        let base_token = if is_sell { buy_token } else { sell_token };
        if fee_token_id != base_token {
            return Err(RollupError::InvalidRequest { kind: req.kind, detail: "fee token" });
        }
        let matched_mq = if is_sell { matched_sell_amt } else { matched_buy_amt };
        let matched_bq = if is_sell { matched_buy_amt } else { matched_sell_amt };
        let days = span_days(self.current_time, maker.maturity_time());
        if fee_amt != secondary_fee(maker.fee1, matched_mq, days) {
            return Err(RollupError::InvalidRequest { kind: req.kind, detail: "fee amount" });
        }
        let fee_for_seller = if is_sell { fee_amt } else { 0 };
        let fee_for_buyer = if is_sell { 0 } else { fee_amt };

        let ori_locked = maker.locked_amt;
        let new_locked = ori_locked
            .checked_sub(matched_mq + fee_for_buyer)
            .ok_or_else(|| ctx_err(req, "locked amount underflow"))?;

        self.order_before(order_id)?;
        maker.acc1 += matched_mq;
        maker.acc2 += matched_bq;
        maker.locked_amt = new_locked;
        if full_matched {
            self.order_tree.remove_leaf(order_id)?;
        } else {
            self.order_tree.set_leaf(order_id, maker.clone())?;
        }
        self.order_after(order_id)?;

        let maker_id = maker.account_id;
        self.account_before(maker_id)?;
        self.token_before(maker_id, buy_token)?;
        self.update_account_token(
            maker_id,
            buy_token,
            Delta::signed(matched_buy_amt, fee_for_seller),
            Delta::None,
        )?;
        self.token_after(maker_id, buy_token)?;
        self.token_before(maker_id, sell_token)?;
        self.update_account_token(
            maker_id,
            sell_token,
            if full_matched { Delta::Add(new_locked) } else { Delta::None },
            if full_matched {
                Delta::Sub(ori_locked)
            } else {
                Delta::Sub(matched_mq + fee_for_buyer)
            },
        )?;
        self.token_after(maker_id, sell_token)?;
        self.account_after(maker_id)?;
        self.account_before(maker_id)?;
        self.account_after(maker_id)?;

        self.fee_before(fee_token_id)?;
        self.fee_tree.credit(fee_token_id, fee_amt)?;
        self.fee_after(fee_token_id)?;

        self.use_account_key(maker_id)?;
        Ok(ChunkExtras {
            tx_offset: (self.latest_tx_id() - maker.order_tx_id) as u32,
            maker_buy_amt: maker.buy_amount(),
            ..self.extras_for(req)
        })
    }

    fn do_second_end(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        let TxMeta::MatchStep {
            order_id,
            full_matched,
            matched_sell_amt,
            matched_buy_amt,
            fee_token_id,
            fee_amt,
        } = req.meta
        else {
            return Err(meta_err(req));
        };
        let (held_id, mut taker) = self
            .held_taker_order
            .take()
            .ok_or_else(|| ctx_err(req, "no taker order held"))?;
        if held_id != order_id {
            return Err(ctx_err(req, "held order id mismatch"));
        }
        let sell_token = taker.token_id;
        let buy_token = taker.buy_token_id();
        let is_sell = taker.is_sell();

        let base_token = if is_sell { buy_token } else { sell_token };
        if fee_token_id != base_token {
            return Err(RollupError::InvalidRequest { kind: req.kind, detail: "fee token" });
        }
        let matched_mq = if is_sell { matched_sell_amt } else { matched_buy_amt };
        let days = span_days(self.current_time, taker.maturity_time());
        if fee_amt != secondary_fee(taker.fee0, matched_mq, days) {
            return Err(RollupError::InvalidRequest { kind: req.kind, detail: "fee amount" });
        }
        let fee_for_buyer = if is_sell { fee_amt } else { 0 };
        let fee_for_seller = if is_sell { 0 } else { fee_amt };

        // a market taker never locked anything and settles from its
        // spendable balance instead
        let is_market = taker.kind == TxKind::SecondMarketOrder;
        let ori_locked = taker.locked_amt;
        let new_locked = if is_market {
            0
        } else {
            ori_locked
                .checked_sub(matched_sell_amt + fee_for_seller)
                .ok_or_else(|| ctx_err(req, "locked amount underflow"))?
        };

        // the taker left the order tree when the match opened (or, for a
        // market order, never entered it); only the held copy is updated
        self.order_before(order_id)?;
        taker.acc1 += matched_sell_amt;
        taker.acc2 += matched_buy_amt;
        taker.locked_amt = new_locked;
        self.order_after(order_id)?;

        let taker_id = taker.account_id;
        self.account_before(taker_id)?;
        self.token_before(taker_id, buy_token)?;
        self.update_account_token(
            taker_id,
            buy_token,
            Delta::signed(matched_buy_amt, fee_for_buyer),
            Delta::None,
        )?;
        self.token_after(taker_id, buy_token)?;
        self.token_before(taker_id, sell_token)?;
        if is_market {
            self.update_account_token(
                taker_id,
                sell_token,
                Delta::Sub(matched_sell_amt + fee_for_seller),
                Delta::None,
            )?;
        } else {
            self.update_account_token(
                taker_id,
                sell_token,
                if full_matched { Delta::Add(new_locked) } else { Delta::None },
                if full_matched {
                    Delta::Sub(ori_locked)
                } else {
                    Delta::Sub(matched_sell_amt + fee_for_seller)
                },
            )?;
        }
        self.token_after(taker_id, sell_token)?;
        self.account_after(taker_id)?;
        self.account_before(taker_id)?;
        self.account_after(taker_id)?;

        self.fee_before(fee_token_id)?;
        self.fee_tree.credit(fee_token_id, fee_amt)?;
        self.fee_after(fee_token_id)?;

        self.use_account_key(taker_id)?;
        Ok(ChunkExtras {
            tx_offset: (self.latest_tx_id() - taker.order_tx_id) as u32,
            ..self.extras_for(req)
        })
    }

    fn do_auction_start(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        let TxMeta::StartMatch { order_id } = req.meta else {
            return Err(meta_err(req));
        };
        let order = self.order_tree.live_leaf(order_id)?;
        if order.kind != TxKind::AuctionBorrow {
            return Err(ctx_err(req, "not a borrow order"));
        }
        self.matched_lend_interest = 0;
        let sender = order.account_id;
        let sell_token = order.token_id;

        self.account_and_token_before(sender, sell_token)?;
        self.account_and_token_after(sender, sell_token)?;
        self.account_and_token_before(sender, sell_token)?;
        self.account_and_token_after(sender, sell_token)?;

        self.order_before(order_id)?;
        self.order_tree.remove_leaf(order_id)?;
        self.order_after(order_id)?;

        let extras = ChunkExtras {
            tx_offset: (self.latest_tx_id() - order.order_tx_id) as u32,
            ori_matched_interest: order.interest(),
            ..self.extras_for(req)
        };
        self.use_account_key(sender)?;
        self.held_auction_order = Some((order_id, order));
        Ok(extras)
    }

    fn do_auction_match(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        let TxMeta::AuctionMatch {
            order_id,
            full_matched,
            matched_lend_amt,
            matched_bond_amt,
            bond_token_id,
            fee_token_id,
            fee_amt,
        } = req.meta
        else {
            return Err(meta_err(req));
        };
        let borrow_maturity = self
            .held_auction_order
            .as_ref()
            .map(|(_, o)| o.maturity_time())
            .ok_or_else(|| ctx_err(req, "no auction in progress"))?;
        let mut lend = self.order_tree.live_leaf(order_id)?;
        // the cleared interest is the worst lend rate matched so far
        self.matched_lend_interest = self.matched_lend_interest.max(lend.interest());

        if fee_token_id != lend.token_id {
            return Err(RollupError::InvalidRequest { kind: req.kind, detail: "fee token" });
        }
        let days = span_days(self.current_time, borrow_maturity);
        if fee_amt != lend_fee(lend.fee0, matched_lend_amt, days) {
            return Err(RollupError::InvalidRequest { kind: req.kind, detail: "fee amount" });
        }
        let ori_locked = lend.locked_amt;
        let new_locked = ori_locked
            .checked_sub(matched_lend_amt + fee_amt)
            .ok_or_else(|| ctx_err(req, "locked amount underflow"))?;

        self.order_before(order_id)?;
        lend.acc1 += matched_lend_amt;
        lend.acc2 += matched_bond_amt;
        lend.locked_amt = new_locked;
        if full_matched != (lend.acc1 == lend.amount) {
            return Err(ctx_err(req, "full match flag"));
        }
        if full_matched {
            self.order_tree.remove_leaf(order_id)?;
        } else {
            self.order_tree.set_leaf(order_id, lend.clone())?;
        }
        self.order_after(order_id)?;

        let lender = lend.account_id;
        let lend_token = lend.token_id;
        self.account_before(lender)?;
        self.token_before(lender, bond_token_id)?;
        self.update_account_token(lender, bond_token_id, Delta::Add(matched_bond_amt), Delta::None)?;
        self.token_after(lender, bond_token_id)?;
        self.token_before(lender, lend_token)?;
        self.update_account_token(
            lender,
            lend_token,
            if full_matched { Delta::Add(new_locked) } else { Delta::None },
            if full_matched {
                Delta::Sub(ori_locked)
            } else {
                Delta::Sub(matched_lend_amt + fee_amt)
            },
        )?;
        self.token_after(lender, lend_token)?;
        self.account_after(lender)?;
        self.account_before(lender)?;
        self.account_after(lender)?;

        self.fee_before(fee_token_id)?;
        self.fee_tree.credit(fee_token_id, fee_amt)?;
        self.fee_after(fee_token_id)?;

        self.use_account_key(lender)?;
        Ok(ChunkExtras {
            tx_offset: (self.latest_tx_id() - lend.order_tx_id) as u32,
            ..self.extras_for(req)
        })
    }

    fn do_auction_end(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        let TxMeta::AuctionEnd {
            order_id,
            full_matched,
            matched_collateral_amt,
            matched_borrow_amt,
            matched_debt_amt,
            bond_token_id,
            fee_token_id,
            fee_amt,
        } = req.meta
        else {
            return Err(meta_err(req));
        };
        let (held_id, mut borrow) = self
            .held_auction_order
            .take()
            .ok_or_else(|| ctx_err(req, "no auction in progress"))?;
        if held_id != order_id {
            return Err(ctx_err(req, "held order id mismatch"));
        }
        let borrow_token = borrow.buy_token_id();
        let collateral_token = borrow.token_id;
        if fee_token_id != borrow_token {
            return Err(RollupError::InvalidRequest { kind: req.kind, detail: "fee token" });
        }
        let days = span_days(self.current_time, borrow.maturity_time());
        let expected_fee =
            borrow_fee(borrow.fee0, matched_borrow_amt, self.matched_lend_interest, days);
        if fee_amt != expected_fee {
            return Err(RollupError::InvalidRequest { kind: req.kind, detail: "fee amount" });
        }
        let ori_locked = borrow.locked_amt;
        let new_locked = ori_locked
            .checked_sub(matched_collateral_amt)
            .ok_or_else(|| ctx_err(req, "locked amount underflow"))?;

        // a partial settlement returns the remainder to the book
        self.order_before(order_id)?;
        borrow.acc1 += matched_collateral_amt;
        borrow.acc2 += matched_borrow_amt;
        borrow.locked_amt = new_locked;
        if full_matched != (borrow.acc2 == borrow.buy_amount()) {
            return Err(ctx_err(req, "full match flag"));
        }
        if full_matched {
            self.order_tree.remove_leaf(order_id)?;
        } else {
            self.order_tree.set_leaf(order_id, borrow.clone())?;
        }
        self.order_after(order_id)?;

        let borrower = borrow.account_id;
        self.account_before(borrower)?;
        self.token_before(borrower, borrow_token)?;
        self.update_account_token(
            borrower,
            borrow_token,
            Delta::signed(matched_borrow_amt, fee_amt),
            Delta::None,
        )?;
        self.token_after(borrower, borrow_token)?;
        self.token_before(borrower, collateral_token)?;
        self.update_account_token(
            borrower,
            collateral_token,
            if full_matched { Delta::Add(new_locked) } else { Delta::None },
            if full_matched {
                Delta::Sub(ori_locked)
            } else {
                Delta::Sub(matched_collateral_amt)
            },
        )?;
        self.token_after(borrower, collateral_token)?;
        self.account_after(borrower)?;
        self.account_before(borrower)?;
        self.account_after(borrower)?;

        self.fee_before(fee_token_id)?;
        self.fee_tree.credit(fee_token_id, fee_amt)?;
        self.fee_after(fee_token_id)?;

        self.use_account_key(borrower)?;
        Ok(ChunkExtras {
            tx_offset: (self.latest_tx_id() - borrow.order_tx_id) as u32,
            borrower_account_id: borrower,
            collateral_token_id: collateral_token,
            collateral_amt: matched_collateral_amt,
            bond_token_id,
            debt_amt: matched_debt_amt,
            ..self.extras_for(req)
        })
    }

    fn do_cancel_order(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        let TxMeta::CancelOrder { order_id, pub_key } = req.meta else {
            return Err(meta_err(req));
        };
        let order = self.order_tree.live_leaf(order_id)?;
        if req.args[1].low_u64() != order.order_tx_id {
            return Err(RollupError::InvalidRequest { kind: req.kind, detail: "order tx id" });
        }
        let owner = order.account_id;
        let unlock_token = order.token_id;
        let unlock_amt = order.locked_amt;

        self.account_and_token_before(owner, unlock_token)?;
        self.update_account_token(
            owner,
            unlock_token,
            Delta::Add(unlock_amt),
            Delta::Sub(unlock_amt),
        )?;
        self.account_and_token_after(owner, unlock_token)?;
        self.account_and_token_before(owner, unlock_token)?;
        self.account_and_token_after(owner, unlock_token)?;

        self.order_before(order_id)?;
        self.order_tree.remove_leaf(order_id)?;
        self.order_after(order_id)?;

        self.tx.ts_pub_key = [pub_key.0, pub_key.1];
        self.use_request_sig(req);
        Ok(self.extras_for(req))
    }

    fn do_increase_epoch(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        self.noop_brackets()?;
        let (lo, hi) = (self.nullifier_trees[0].epoch(), self.nullifier_trees[1].epoch());
        if lo < hi {
            self.nullifier_trees[0].rollover(lo + 2)?;
        } else {
            self.nullifier_trees[1].rollover(hi + 2)?;
        }
        Ok(self.extras_for(req))
    }

    fn do_create_bond_token(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        self.bond_before(req.token_id)?;
        self.bond_tree.register(
            req.token_id,
            BondLeaf {
                base_token_id: req.trade_token_id(),
                maturity_time: req.maturity_time(),
            },
        )?;
        self.bond_after(req.token_id)?;

        self.noop_brackets()?;
        Ok(self.extras_for(req))
    }

    fn do_withdraw_fee(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        let token: TokenId = req.token_id;
        if self.fee_tree.leaf(token).amount == 0 {
            return Err(RollupError::FeeLeafNotFound(token));
        }
        self.fee_before(token)?;
        let full_amt = self.fee_tree.drain(token)?;
        self.fee_after(token)?;

        self.noop_brackets()?;
        Ok(ChunkExtras { full_amt, ..self.extras_for(req) })
    }

    fn do_set_admin_addr(&mut self, req: &TxRequest) -> RollupResult<ChunkExtras> {
        let TxMeta::SetAdmin { pub_key } = req.meta else {
            return Err(meta_err(req));
        };
        if ts_addr_of::<H>(pub_key) != req.ts_addr() {
            return Err(RollupError::InvalidRequest { kind: req.kind, detail: "admin address" });
        }
        self.admin_pub_key = pub_key;
        self.admin_ts_addr = req.ts_addr();

        self.noop_brackets()?;
        Ok(self.extras_for(req))
    }
}

#[cfg(test)]
mod tests {
    use tenor_primitives::testing::MixHasher;
    use tenor_primitives::Fr;

    use super::*;
    use crate::config::RollupConfig;

    fn running_state() -> RollupState<MixHasher> {
        let mut state = RollupState::new(RollupConfig::default()).unwrap();
        state.begin_block(86_400 * 500).unwrap();
        state
    }

    #[test]
    fn register_assigns_sequential_ids() {
        let mut state = running_state();
        let key = (Fr::from(11u64), Fr::from(12u64));
        let addr = ts_addr_of::<MixHasher>(key);
        state
            .apply_transaction(&TxRequest::register(100, 1, 5_000, addr, key))
            .unwrap();
        assert_eq!(state.account(100).unwrap().token_leaf(1).amount, 5_000);

        let err = state
            .apply_transaction(&TxRequest::register(102, 0, 0, addr, key))
            .unwrap_err();
        assert!(matches!(
            err,
            RollupError::RegisterSlotMismatch { expected: 101, got: 102 }
        ));
    }

    #[test]
    fn deposit_requires_a_registered_account() {
        let mut state = running_state();
        let err = state
            .apply_transaction(&TxRequest::deposit(200, 1, 50))
            .unwrap_err();
        assert!(matches!(err, RollupError::AccountNotFound(200)));
    }

    #[test]
    fn withdraw_fee_rejects_an_empty_leaf() {
        let mut state = running_state();
        let err = state
            .apply_transaction(&TxRequest::withdraw_fee(3))
            .unwrap_err();
        assert!(matches!(err, RollupError::FeeLeafNotFound(3)));
    }

    #[test]
    fn increase_epoch_advances_the_smaller_tree() {
        let mut state = running_state();
        state.apply_transaction(&TxRequest::increase_epoch()).unwrap();
        assert_eq!(state.nullifier_trees[0].epoch(), 3);
        assert_eq!(state.nullifier_trees[1].epoch(), 2);
        state.apply_transaction(&TxRequest::increase_epoch()).unwrap();
        assert_eq!(state.nullifier_trees[1].epoch(), 4);
    }
}

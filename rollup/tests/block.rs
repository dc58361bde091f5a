//! Whole-block scenarios driving the engine through its public API.

use std::sync::Arc;

use tenor_primitives::testing::{MixHasher, MixSigner};
use tenor_primitives::{FieldSigner, Fr, Signature};
use tenor_rollup::account::ts_addr_of;
use tenor_rollup::state::RollupStatus;
use tenor_rollup::tx::{
    AuctionBorrowOrder, AuctionFill, AuctionLendOrder, AuctionSettle, SecondaryFill,
    SecondaryOrder, Side,
};
use tenor_rollup::witness::BlockWitness;
use tenor_rollup::{RollupConfig, RollupError, RollupState, TxKind, TxRequest};

type State = RollupState<MixHasher>;

const DAY: u64 = 86_400;
const T0: u64 = DAY * 1_000;
const MATURITY: u64 = DAY * 1_365;
const EXPIRE: u64 = DAY * 1_100;

fn init_logger() {
    let _ = pretty_env_logger::try_init();
}

fn new_state() -> State {
    RollupState::new(RollupConfig::default()).unwrap()
}

fn key_of(seed: u64) -> (Fr, Fr) {
    MixSigner::new(seed).public_key()
}

fn run_block(state: &mut State, txs: &[TxRequest]) -> BlockWitness {
    state.begin_block(T0).unwrap();
    for tx in txs {
        state.apply_transaction(tx).unwrap();
    }
    state.finish_block().unwrap()
}

fn assert_block_shape(block: &BlockWitness) {
    let config = RollupConfig::default();
    assert_eq!(block.reqs.len(), config.num_txs_per_batch);
    assert_eq!(block.o_chunks.len(), config.num_chunks_per_batch);
    assert_eq!(block.is_critical_chunk.len(), config.num_chunks_per_batch);
    let timeline = config.num_txs_per_batch + 1;
    for flow in [
        &block.account_root_flow,
        &block.order_root_flow,
        &block.fee_root_flow,
        &block.bond_token_root_flow,
        &block.admin_ts_addr_flow,
    ] {
        assert_eq!(flow.len(), timeline);
    }
    for i in 0..2 {
        assert_eq!(block.nullifier_root_flow[i].len(), timeline);
        assert_eq!(block.epoch_flow[i].len(), timeline);
    }
    for req in &block.reqs {
        assert_eq!(req.req_data.len(), 17);
        assert_eq!(req.r_chunks.len(), 5);
        // every before has a matching after
        assert_eq!(req.account.ori_account_leaf.len(), req.account.new_account_leaf.len());
        assert_eq!(req.account.ori_token_leaf.len(), req.account.new_token_leaf.len());
        assert_eq!(req.order.ori_order_leaf.len(), req.order.new_order_leaf.len());
        assert_eq!(req.fee.ori_fee_leaf.len(), req.fee.new_fee_leaf.len());
        assert_eq!(req.bond.ori_bond_token_leaf.len(), req.bond.new_bond_token_leaf.len());
    }
}

#[test]
fn register_deposit_transfer_withdraw_lifecycle() {
    init_logger();
    let mut state = new_state();
    let root0 = state.state_root();
    let key_a = key_of(1);
    let key_b = key_of(2);

    let block1 = run_block(
        &mut state,
        &[
            TxRequest::register(100, 0, 0, ts_addr_of::<MixHasher>(key_a), key_a),
            TxRequest::register(101, 0, 0, ts_addr_of::<MixHasher>(key_b), key_b),
            TxRequest::deposit(100, 1, 1_000),
        ],
    );
    assert_block_shape(&block1);
    assert_eq!(block1.block_number, 1);
    assert_eq!(block1.ori_tx_num, Fr::zero());
    assert_eq!(state.status(), RollupStatus::Idle);
    assert_eq!(state.latest_tx_id(), 3);

    // register and deposit move balance across the bridge
    assert_eq!(block1.reqs[0].is_critical_chunk[0], Fr::one());
    assert_eq!(block1.reqs[2].is_critical_chunk[0], Fr::one());
    // the deposit witness verifies against the receiver's key
    assert_eq!(block1.reqs[2].ts_pub_key, [key_a.0, key_a.1]);

    let block2 = run_block(
        &mut state,
        &[
            TxRequest::transfer(100, 1, 250, 0, 101, Signature::empty()),
            TxRequest::withdraw(101, 1, 100, 0, Signature::empty()),
        ],
    );
    assert_block_shape(&block2);
    assert_eq!(block2.ori_tx_num, Fr::from(3u64));
    // transfers stay inside the rollup, withdrawals leave it
    assert_eq!(block2.reqs[0].is_critical_chunk[0], Fr::zero());
    assert_eq!(block2.reqs[1].is_critical_chunk[0], Fr::one());

    let a = state.account(100).unwrap();
    let b = state.account(101).unwrap();
    assert_eq!(a.token_leaf(1).amount, 750);
    assert_eq!(b.token_leaf(1).amount, 150);
    assert_eq!(a.nonce(), 1);
    assert_eq!(b.nonce(), 1);
    assert_ne!(state.state_root(), root0);
}

#[test]
fn insufficient_balance_rejects_the_transfer() {
    init_logger();
    let mut state = new_state();
    let key = key_of(3);
    run_block(
        &mut state,
        &[TxRequest::register(100, 1, 50, ts_addr_of::<MixHasher>(key), key)],
    );

    state.begin_block(T0).unwrap();
    let err = state
        .apply_transaction(&TxRequest::transfer(100, 1, 80, 0, 0, Signature::empty()))
        .unwrap_err();
    assert!(matches!(err, RollupError::BalanceUnderflow { account: 100, token: 1 }));
}

#[test]
fn force_withdraw_drains_the_full_balance() {
    init_logger();
    let mut state = new_state();
    let key = key_of(4);
    let block = run_block(
        &mut state,
        &[
            TxRequest::register(100, 1, 77_000, ts_addr_of::<MixHasher>(key), key),
            TxRequest::force_withdraw(100, 1),
        ],
    );
    assert_eq!(state.account(100).unwrap().token_leaf(1).amount, 0);
    assert_eq!(block.reqs[1].is_critical_chunk[0], Fr::one());
}

#[test]
fn auction_full_match_settles_both_sides() {
    init_logger();
    let mut state = new_state();
    let lender_key = key_of(5);
    let borrower_key = key_of(6);

    run_block(
        &mut state,
        &[
            TxRequest::register(100, 1, 1_000_000, ts_addr_of::<MixHasher>(lender_key), lender_key),
            TxRequest::register(101, 2, 500_000, ts_addr_of::<MixHasher>(borrower_key), borrower_key),
            TxRequest::create_bond_token(5, MATURITY, 1),
        ],
    );

    let lend = AuctionLendOrder {
        sender_id: 100,
        lend_token_id: 1,
        lend_amt: 100_000,
        nonce: 0,
        fee_rate: 1_000_000,
        maturity_time: MATURITY,
        expire_time: EXPIRE,
        interest: 105_000_000,
        epoch: 1,
    };
    let borrow = AuctionBorrowOrder {
        sender_id: 101,
        collateral_token_id: 2,
        collateral_amt: 200_000,
        nonce: 0,
        fee_rate: 2_000_000,
        maturity_time: MATURITY,
        expire_time: EXPIRE,
        interest: 105_000_000,
        borrow_token_id: 1,
        borrow_amt: 100_000,
        epoch: 1,
    };
    run_block(
        &mut state,
        &[
            TxRequest::auction_lend(1, &lend, Signature::empty()),
            TxRequest::auction_borrow(2, &borrow, Signature::empty()),
            TxRequest::auction_start(2),
        ],
    );
    // one lend-fee year at 1% on the lent amount is locked on top
    let lender = state.account(100).unwrap();
    assert_eq!(lender.token_leaf(1).amount, 899_000);
    assert_eq!(lender.token_leaf(1).locked, 101_000);
    assert_eq!(state.account(101).unwrap().token_leaf(2).locked, 200_000);

    let block3 = run_block(
        &mut state,
        &[
            TxRequest::auction_match(
                1,
                &AuctionFill {
                    full_matched: true,
                    matched_lend_amt: 100_000,
                    matched_bond_amt: 105_000,
                    bond_token_id: 5,
                    fee_token_id: 1,
                    fee_amt: 1_000,
                },
            ),
            TxRequest::auction_end(
                2,
                &AuctionSettle {
                    full_matched: true,
                    matched_collateral_amt: 200_000,
                    matched_borrow_amt: 100_000,
                    matched_debt_amt: 105_000,
                    bond_token_id: 5,
                    fee_token_id: 1,
                    fee_amt: 100,
                },
            ),
            TxRequest::withdraw_fee(1),
        ],
    );
    assert_block_shape(&block3);

    // lender: lock fully released, bond credit at the agreed interest
    let lender = state.account(100).unwrap();
    assert_eq!(lender.token_leaf(1).amount, 899_000);
    assert_eq!(lender.token_leaf(1).locked, 0);
    assert_eq!(lender.token_leaf(5).amount, 105_000);

    // borrower: principal minus fee in, collateral lock consumed
    let borrower = state.account(101).unwrap();
    assert_eq!(borrower.token_leaf(1).amount, 99_900);
    assert_eq!(borrower.token_leaf(2).amount, 300_000);
    assert_eq!(borrower.token_leaf(2).locked, 0);

    // both fees accrued to token 1 and were drained together
    assert_eq!(block3.reqs[0].fee.new_fee_leaf[0], vec![Fr::from(1_000u64)]);
    assert_eq!(block3.reqs[1].fee.new_fee_leaf[0], vec![Fr::from(1_100u64)]);
    assert_eq!(block3.reqs[2].is_critical_chunk[0], Fr::one());
    state.begin_block(T0).unwrap();
    let err = state.apply_transaction(&TxRequest::withdraw_fee(1)).unwrap_err();
    assert!(matches!(err, RollupError::FeeLeafNotFound(1)));
}

#[test]
fn market_taker_fills_a_resting_limit_order() {
    init_logger();
    let mut state = new_state();
    let maker_key = key_of(7);
    let taker_key = key_of(8);
    run_block(
        &mut state,
        &[
            TxRequest::register(100, 5, 1_000_000, ts_addr_of::<MixHasher>(maker_key), maker_key),
            TxRequest::register(101, 1, 1_000_000, ts_addr_of::<MixHasher>(taker_key), taker_key),
        ],
    );

    let maker_order = SecondaryOrder {
        sender_id: 100,
        sell_token_id: 5,
        sell_amt: 100_000,
        nonce: 0,
        taker_fee: 1_000_000,
        maker_fee: 1_000_000,
        maturity_time: MATURITY,
        expire_time: EXPIRE,
        buy_token_id: 1,
        buy_amt: 95_000,
        epoch: 1,
        side: Side::Sell,
    };
    let taker_order = SecondaryOrder {
        sender_id: 101,
        sell_token_id: 1,
        sell_amt: 95_000,
        nonce: 0,
        taker_fee: 1_000_000,
        maker_fee: 0,
        maturity_time: MATURITY,
        expire_time: EXPIRE,
        buy_token_id: 5,
        buy_amt: 100_000,
        epoch: 1,
        side: Side::Buy,
    };
    let block2 = run_block(
        &mut state,
        &[
            TxRequest::second_limit_order(1, &maker_order, T0, Signature::empty()),
            TxRequest::second_market_order(2, &taker_order, T0, Signature::empty()),
            TxRequest::second_exchange(
                TxKind::SecondMarketExchange,
                1,
                &SecondaryFill {
                    full_matched: true,
                    matched_sell_amt: 100_000,
                    matched_buy_amt: 95_000,
                    fee_token_id: 1,
                    fee_amt: 1_000,
                },
            ),
        ],
    );
    assert_block_shape(&block2);
    // placements burn a real nullifier slot, the fill does not
    for (i, touched) in [(0, true), (1, true), (2, false)] {
        let flow = &block2.reqs[i].nullifier.nullifier_root_flow[0];
        assert_eq!(flow[0] != flow[1], touched);
    }
    // the market taker's balance is untouched until settlement
    assert_eq!(state.account(101).unwrap().token_leaf(1).amount, 1_000_000);
    // maker: sell lock released, buy credit net of the maker fee
    let maker = state.account(100).unwrap();
    assert_eq!(maker.token_leaf(5).amount, 900_000);
    assert_eq!(maker.token_leaf(5).locked, 0);
    assert_eq!(maker.token_leaf(1).amount, 94_000);

    run_block(
        &mut state,
        &[TxRequest::second_end(
            TxKind::SecondMarketEnd,
            2,
            &SecondaryFill {
                full_matched: true,
                matched_sell_amt: 95_000,
                matched_buy_amt: 100_000,
                fee_token_id: 1,
                fee_amt: 1_000,
            },
        )],
    );
    // taker settles from spendable balance: price plus taker fee out,
    // bonds in
    let taker = state.account(101).unwrap();
    assert_eq!(taker.token_leaf(1).amount, 904_000);
    assert_eq!(taker.token_leaf(1).locked, 0);
    assert_eq!(taker.token_leaf(5).amount, 100_000);
}

#[test]
fn cancel_returns_the_locked_balance() {
    init_logger();
    let mut state = new_state();
    let key = key_of(9);
    run_block(
        &mut state,
        &[TxRequest::register(100, 5, 1_000_000, ts_addr_of::<MixHasher>(key), key)],
    );

    let order = SecondaryOrder {
        sender_id: 100,
        sell_token_id: 5,
        sell_amt: 100_000,
        nonce: 0,
        taker_fee: 1_000_000,
        maker_fee: 1_000_000,
        maturity_time: MATURITY,
        expire_time: EXPIRE,
        buy_token_id: 1,
        buy_amt: 95_000,
        epoch: 1,
        side: Side::Sell,
    };
    // the placement is global transaction 3 (block 1 was padded to 3)
    run_block(
        &mut state,
        &[TxRequest::second_limit_order(1, &order, T0, Signature::empty())],
    );
    assert_eq!(state.account(100).unwrap().token_leaf(5).locked, 100_000);

    run_block(
        &mut state,
        &[TxRequest::cancel_order(1, 100, 3, 0, key, Signature::empty())],
    );
    let leaf = state.account(100).unwrap().token_leaf(5);
    assert_eq!(leaf.amount, 1_000_000);
    assert_eq!(leaf.locked, 0);
}

#[test]
fn cancel_rejects_a_stale_order_tx_id() {
    init_logger();
    let mut state = new_state();
    let key = key_of(10);
    run_block(
        &mut state,
        &[TxRequest::register(100, 5, 1_000_000, ts_addr_of::<MixHasher>(key), key)],
    );
    let order = SecondaryOrder {
        sender_id: 100,
        sell_token_id: 5,
        sell_amt: 100_000,
        nonce: 0,
        taker_fee: 0,
        maker_fee: 0,
        maturity_time: MATURITY,
        expire_time: EXPIRE,
        buy_token_id: 1,
        buy_amt: 95_000,
        epoch: 1,
        side: Side::Sell,
    };
    run_block(
        &mut state,
        &[TxRequest::second_limit_order(1, &order, T0, Signature::empty())],
    );

    state.begin_block(T0).unwrap();
    let err = state
        .apply_transaction(&TxRequest::cancel_order(1, 100, 99, 0, key, Signature::empty()))
        .unwrap_err();
    assert!(matches!(
        err,
        RollupError::InvalidRequest { kind: TxKind::CancelOrder, .. }
    ));
}

#[test]
fn bond_tokens_register_once_and_redeem_into_their_base() {
    init_logger();
    let mut state = new_state();
    let key = key_of(11);
    run_block(
        &mut state,
        &[
            TxRequest::register(100, 5, 50_000, ts_addr_of::<MixHasher>(key), key),
            TxRequest::create_bond_token(5, MATURITY, 1),
            TxRequest::redeem(100, 5, 20_000, 0, Signature::empty()),
        ],
    );
    let account = state.account(100).unwrap();
    assert_eq!(account.token_leaf(5).amount, 30_000);
    assert_eq!(account.token_leaf(1).amount, 20_000);
    assert_eq!(account.nonce(), 1);

    state.begin_block(T0).unwrap();
    let err = state
        .apply_transaction(&TxRequest::redeem(100, 6, 1, 1, Signature::empty()))
        .unwrap_err();
    assert!(matches!(err, RollupError::UnknownBondToken(6)));
    let err = state
        .apply_transaction(&TxRequest::create_bond_token(5, MATURITY, 2))
        .unwrap_err();
    assert!(matches!(err, RollupError::BondTokenExists(5)));
}

#[test]
fn admin_kinds_are_signed_once_the_admin_key_is_installed() {
    init_logger();
    let mut state = new_state();
    let signer = MixSigner::new(12);
    let admin_key = signer.public_key();
    let admin_addr = ts_addr_of::<MixHasher>(admin_key);
    state.set_admin_signer(Arc::new(signer));

    let block1 = run_block(&mut state, &[TxRequest::set_admin(admin_addr, admin_key)]);
    // padding no-ops are admin-signed as well
    assert_eq!(block1.reqs[1].ts_pub_key, [admin_key.0, admin_key.1]);
    assert_ne!(block1.reqs[1].sig_s, Fr::zero());
    assert_eq!(block1.admin_ts_addr_flow[0], Fr::zero());
    assert_eq!(block1.admin_ts_addr_flow[1], admin_addr);

    let user_key = key_of(13);
    let block2 = run_block(
        &mut state,
        &[TxRequest::register(100, 0, 0, ts_addr_of::<MixHasher>(user_key), user_key)],
    );
    assert_eq!(block2.reqs[0].ts_pub_key, [admin_key.0, admin_key.1]);
    assert_ne!(block2.reqs[0].sig_s, Fr::zero());
}

#[test]
fn admin_install_without_a_signer_fails() {
    init_logger();
    let mut state = new_state();
    let admin_key = key_of(14);
    let admin_addr = ts_addr_of::<MixHasher>(admin_key);

    state.begin_block(T0).unwrap();
    let err = state
        .apply_transaction(&TxRequest::set_admin(admin_addr, admin_key))
        .unwrap_err();
    assert!(matches!(err, RollupError::MissingAdminSigner));
}

#[test]
fn admin_address_must_match_the_key() {
    init_logger();
    let mut state = new_state();
    let admin_key = key_of(15);
    state.begin_block(T0).unwrap();
    let err = state
        .apply_transaction(&TxRequest::set_admin(Fr::from(123u64), admin_key))
        .unwrap_err();
    assert!(matches!(
        err,
        RollupError::InvalidRequest { kind: TxKind::SetAdminAddr, .. }
    ));
}

#[test]
fn empty_blocks_are_padded_and_overfull_blocks_rejected() {
    init_logger();
    let mut state = new_state();
    let block = run_block(&mut state, &[]);
    assert_block_shape(&block);
    assert!(block.reqs.iter().all(|r| r.req_data[0] == Fr::zero()));
    assert_eq!(state.latest_tx_id(), 3);

    state.begin_block(T0).unwrap();
    for _ in 0..4 {
        state.apply_transaction(&TxRequest::noop()).unwrap();
    }
    let err = state.finish_block().unwrap_err();
    assert!(matches!(err, RollupError::BatchOverflow { got: 4, max: 3 }));
}

#[test]
fn identical_histories_reach_identical_roots() {
    init_logger();
    let key = key_of(16);
    let build = || {
        let mut state = new_state();
        run_block(
            &mut state,
            &[
                TxRequest::register(100, 1, 500, ts_addr_of::<MixHasher>(key), key),
                TxRequest::deposit(100, 2, 800),
            ],
        );
        state.state_root()
    };
    assert_eq!(build(), build());
    assert_ne!(build(), new_state().state_root());
}

//! Pubdata packing.
//!
//! Every applied transaction serialises to a byte payload (an 8-bit kind
//! tag followed by kind-specific fields) which is split into 12-byte
//! chunks, each read back as one field element. Two views exist of the
//! same payload: `r_chunks` is the fixed five-chunk shape the circuit
//! consumes for every transaction, `o_chunks` is the minimal chunk run
//! that lands on L1 as calldata.
//!
//! Amounts inside order payloads travel in a 40-bit floating form, a
//! 35-bit mantissa with the count of stripped trailing decimal zeros in
//! the top five bits.

use tenor_primitives::Fr;

use crate::tx::{TxKind, TxRequest};
use crate::types::{AccountId, Amount, Timestamp, TokenId};

/// Bytes per pubdata chunk.
pub const CHUNK_BYTES: usize = 12;
/// Fixed chunk count of the circuit's per-transaction view.
pub const R_CHUNKS_PER_TX: usize = 5;

const MANTISSA_BITS: u32 = 35;

/// Packs an amount into the 40-bit floating form. Trailing decimal
/// zeros move into the exponent, so round figures survive the 35-bit
/// mantissa limit.
pub fn amount_to_tx_amount(amount: Amount) -> u64 {
    if amount == 0 {
        return 0;
    }
    let mut mantissa = amount;
    let mut exp = 0u64;
    while mantissa % 10 == 0 {
        mantissa /= 10;
        exp += 1;
    }
    debug_assert!(mantissa < 1 << MANTISSA_BITS);
    mantissa as u64 | (exp << MANTISSA_BITS)
}

/// Inverse of [`amount_to_tx_amount`].
pub fn tx_amount_to_amount(packed: u64) -> Amount {
    let mantissa = packed & ((1 << MANTISSA_BITS) - 1);
    let exp = packed >> MANTISSA_BITS;
    Amount::from(mantissa) * (10 as Amount).pow(exp as u32)
}

/// Handler outputs the payload needs beyond the request fields.
#[derive(Clone, Debug, Default)]
pub struct ChunkExtras {
    /// Chunk offset of the referenced placement, for match steps.
    pub tx_offset: u32,
    /// Timestamp recorded for the step.
    pub matched_time: Timestamp,
    /// Full balance drained by force/fee withdrawals.
    pub full_amt: Amount,
    /// Maker's matched buy amount, for exchange steps.
    pub maker_buy_amt: Amount,
    /// Borrow order's original interest, echoed by the auction opener.
    pub ori_matched_interest: Amount,
    /// Borrower account settled by the auction close.
    pub borrower_account_id: AccountId,
    /// Collateral token of the settled borrow order.
    pub collateral_token_id: TokenId,
    /// Collateral consumed by the settlement.
    pub collateral_amt: Amount,
    /// Bond token of the settlement.
    pub bond_token_id: TokenId,
    /// Debt recorded by the settlement.
    pub debt_amt: Amount,
}

/// Packed pubdata of one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxChunks {
    /// Fixed five-chunk circuit view, right-padded with zero bytes.
    pub r_chunks: [Fr; R_CHUNKS_PER_TX],
    /// Minimal chunk run committed to L1.
    pub o_chunks: Vec<Fr>,
    /// Whether L1 must replay this payload (balance enters or leaves
    /// the rollup, or the token set changes).
    pub is_critical: bool,
}

struct Packer {
    buf: Vec<u8>,
}

impl Packer {
    fn new(kind: TxKind) -> Self {
        Self { buf: vec![kind as u8] }
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn u40(&mut self, v: u64) {
        debug_assert!(v < 1 << 40);
        self.buf.extend_from_slice(&v.to_be_bytes()[3..]);
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn u128(&mut self, v: u128) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn addr(&mut self, v: Fr) {
        // low 160 bits of the element
        self.buf.extend_from_slice(&v.to_be_bytes()[12..]);
    }

    fn finish(mut self, critical: bool) -> TxChunks {
        let o_len = self.buf.len().div_ceil(CHUNK_BYTES) * CHUNK_BYTES;
        self.buf.resize(R_CHUNKS_PER_TX * CHUNK_BYTES, 0);
        let chunks: Vec<Fr> = self
            .buf
            .chunks(CHUNK_BYTES)
            .map(Fr::from_be_bytes)
            .collect();
        let mut r_chunks = [Fr::zero(); R_CHUNKS_PER_TX];
        r_chunks.copy_from_slice(&chunks);
        TxChunks {
            r_chunks,
            o_chunks: chunks[..o_len / CHUNK_BYTES].to_vec(),
            is_critical: critical,
        }
    }
}

/// Serialises one applied transaction into its pubdata chunks.
pub fn pack(req: &TxRequest, extras: &ChunkExtras) -> TxChunks {
    let mut p = Packer::new(req.kind);
    let amt40 = amount_to_tx_amount(req.amount);
    match req.kind {
        TxKind::Noop | TxKind::IncreaseEpoch | TxKind::SetAdminAddr => {
            p.finish(false)
        }
        TxKind::Register => {
            p.u32(req.receiver_id());
            p.addr(req.ts_addr());
            p.finish(true)
        }
        TxKind::Deposit => {
            p.u32(req.receiver_id());
            p.u16(req.token_id);
            p.u128(req.amount);
            p.finish(true)
        }
        TxKind::ForceWithdraw => {
            p.u32(req.receiver_id());
            p.u16(req.token_id);
            p.u128(extras.full_amt);
            p.finish(true)
        }
        TxKind::Transfer => {
            p.u32(req.account_id);
            p.u16(req.token_id);
            p.u40(amt40);
            p.u32(req.receiver_id());
            p.finish(false)
        }
        TxKind::Withdraw => {
            p.u32(req.account_id);
            p.u16(req.token_id);
            p.u128(req.amount);
            p.finish(true)
        }
        TxKind::AuctionLend => {
            p.u32(req.account_id);
            p.u16(req.token_id);
            p.u40(amt40);
            p.u40(amount_to_tx_amount(req.fee0));
            p.u32(req.maturity_time() as u32);
            p.u32(extras.matched_time as u32);
            p.finish(false)
        }
        TxKind::AuctionBorrow => {
            p.u32(req.account_id);
            p.u16(req.token_id);
            p.u40(amt40);
            p.u40(amount_to_tx_amount(req.fee0));
            p.u40(amount_to_tx_amount(req.trade_amount()));
            p.u32(extras.matched_time as u32);
            p.finish(false)
        }
        TxKind::AuctionStart => {
            p.u32(extras.tx_offset);
            p.u40(amount_to_tx_amount(extras.ori_matched_interest));
            p.finish(false)
        }
        TxKind::AuctionMatch => {
            p.u32(extras.tx_offset);
            p.finish(false)
        }
        TxKind::AuctionEnd => {
            p.u32(extras.borrower_account_id);
            p.u16(extras.collateral_token_id);
            p.u128(extras.collateral_amt);
            p.u16(extras.bond_token_id);
            p.u128(extras.debt_amt);
            p.u32(extras.matched_time as u32);
            p.finish(true)
        }
        TxKind::SecondLimitOrder => {
            p.u32(req.account_id);
            p.u16(req.token_id);
            p.u40(amt40);
            p.u40(amount_to_tx_amount(req.fee0));
            p.u40(amount_to_tx_amount(req.fee1));
            p.u16(req.trade_token_id());
            p.u40(amount_to_tx_amount(req.trade_amount()));
            p.u32(req.expire_time() as u32);
            p.u32(extras.matched_time as u32);
            p.finish(false)
        }
        TxKind::SecondMarketOrder => {
            p.u32(req.account_id);
            p.u16(req.token_id);
            p.u40(amt40);
            p.u40(amount_to_tx_amount(req.fee0));
            p.u16(req.trade_token_id());
            p.u40(amount_to_tx_amount(req.trade_amount()));
            p.u32(req.expire_time() as u32);
            p.finish(false)
        }
        TxKind::SecondLimitStart => {
            p.u32(extras.tx_offset);
            p.finish(false)
        }
        TxKind::SecondLimitExchange | TxKind::SecondMarketExchange => {
            p.u32(extras.tx_offset);
            p.u40(amount_to_tx_amount(extras.maker_buy_amt));
            p.finish(false)
        }
        TxKind::SecondLimitEnd | TxKind::SecondMarketEnd => {
            p.u32(extras.matched_time as u32);
            p.finish(false)
        }
        TxKind::CancelOrder => {
            p.u64(req.args[1].low_u64());
            p.finish(false)
        }
        TxKind::CreateBondToken => {
            p.u32(req.maturity_time() as u32);
            p.u16(req.trade_token_id());
            p.u16(req.token_id);
            p.finish(true)
        }
        TxKind::Redeem => {
            p.u32(req.account_id);
            p.u16(req.token_id);
            p.u128(req.amount);
            p.finish(false)
        }
        TxKind::WithdrawFee => {
            p.u16(req.token_id);
            p.u128(extras.full_amt);
            p.finish(true)
        }
    }
}

/// Hex string of a block's concatenated `o_chunks`, as submitted to L1.
pub fn pubdata_hex(o_chunks: &[Fr]) -> String {
    let mut bytes = Vec::with_capacity(o_chunks.len() * CHUNK_BYTES);
    for chunk in o_chunks {
        bytes.extend_from_slice(&chunk.to_be_bytes()[32 - CHUNK_BYTES..]);
    }
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floating_amount_round_trips() {
        for amt in [0u128, 1, 999, 120_000, 5 * 10u128.pow(20)] {
            assert_eq!(tx_amount_to_amount(amount_to_tx_amount(amt)), amt);
        }
        // round trillion packs into five mantissa digits
        let packed = amount_to_tx_amount(1_200_000_000_000);
        assert_eq!(packed & ((1 << 35) - 1), 12);
        assert_eq!(packed >> 35, 11);
    }

    #[test]
    fn deposit_payload_shape() {
        let chunks = pack(&TxRequest::deposit(3, 7, 1_000), &ChunkExtras::default());
        assert!(chunks.is_critical);
        assert_eq!(chunks.o_chunks.len(), 2);
        // tag 2, receiver 3 in the first five payload bytes
        let head = chunks.r_chunks[0].to_be_bytes();
        assert_eq!(&head[20..25], &[2, 0, 0, 0, 3]);
        // padding chunks are zero
        assert!(chunks.r_chunks[2..].iter().all(|c| c.is_zero()));
    }

    #[test]
    fn order_payloads_use_minimal_chunk_runs() {
        let extras = ChunkExtras::default();
        let mut tx = TxRequest::noop();
        tx.kind = TxKind::SecondMarketOrder;
        assert_eq!(pack(&tx, &extras).o_chunks.len(), 3);
        tx.kind = TxKind::SecondLimitOrder;
        assert_eq!(pack(&tx, &extras).o_chunks.len(), 4);
        tx.kind = TxKind::AuctionEnd;
        assert_eq!(pack(&tx, &extras).o_chunks.len(), 4);
        tx.kind = TxKind::CancelOrder;
        assert_eq!(pack(&tx, &extras).o_chunks.len(), 1);
    }

    #[test]
    fn noop_is_a_single_zero_chunk() {
        let chunks = pack(&TxRequest::noop(), &ChunkExtras::default());
        assert_eq!(chunks.o_chunks, vec![Fr::zero()]);
        assert!(!chunks.is_critical);
        assert_eq!(pubdata_hex(&chunks.o_chunks), format!("0x{}", "00".repeat(12)));
    }
}

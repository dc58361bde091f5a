//! Fee and price arithmetic.
//!
//! All rates and interest values are fixed-point with eight decimal
//! places ([`INTEREST_ONE`] is 1.0). Intermediate products run in
//! `U256` so that `amount * rate * days` cannot overflow `u128`.

use ethereum_types::U256;

use crate::types::{Amount, DAYS_PER_YEAR, INTEREST_ONE};

fn to_u256(v: Amount) -> U256 {
    U256::from(v)
}

fn to_amount(v: U256) -> Amount {
    v.low_u128()
}

/// Fee charged to a lender on a matched auction fill:
/// `rate * days * amount / (1e8 * 365)`.
pub fn lend_fee(fee_rate: Amount, matched_amt: Amount, days: u128) -> Amount {
    let num = to_u256(fee_rate) * U256::from(days) * to_u256(matched_amt);
    let den = U256::from(INTEREST_ONE) * U256::from(DAYS_PER_YEAR);
    to_amount(num / den)
}

/// Fee charged to a borrower on settlement:
/// `amount * rate * days * |interest - 1| / (1e8 * 1e8 * 365)`.
pub fn borrow_fee(fee_rate: Amount, matched_amt: Amount, interest: Amount, days: u128) -> Amount {
    let spread = interest.abs_diff(INTEREST_ONE);
    let num =
        to_u256(matched_amt) * to_u256(fee_rate) * U256::from(days) * to_u256(spread);
    let den =
        U256::from(INTEREST_ONE) * U256::from(INTEREST_ONE) * U256::from(DAYS_PER_YEAR);
    to_amount(num / den)
}

/// Fee charged on a secondary-market fill:
/// `main_qty * rate * days / (365 * 1e8)`.
pub fn secondary_fee(fee_rate: Amount, main_qty: Amount, days: u128) -> Amount {
    let num = to_u256(main_qty) * to_u256(fee_rate) * U256::from(days);
    let den = U256::from(DAYS_PER_YEAR) * U256::from(INTEREST_ONE);
    to_amount(num / den)
}

/// Base quantity implied by a partial fill, keeping the annualised yield
/// of the original `mq_price`/`bq_price` quote constant:
/// `365 * mq * bq_price / (mq_price * days + (365 - days) * bq_price)`.
pub fn calc_bq(mq: Amount, mq_price: Amount, bq_price: Amount, days: u128) -> Amount {
    let num = U256::from(DAYS_PER_YEAR) * to_u256(mq) * to_u256(bq_price);
    let den = to_u256(mq_price) * U256::from(days)
        + (U256::from(DAYS_PER_YEAR) - U256::from(days)) * to_u256(bq_price);
    to_amount(num / den)
}

/// Balance locked when a secondary order is placed.
///
/// A seller locks the bond quantity itself. A buyer locks the base
/// quantity (re-priced to the order's expiry for limit orders, so a
/// fill on the last valid day is still covered) plus the worst-case
/// fee at the higher of the two rates.
pub fn calc_secondary_locked_amt(
    is_limit: bool,
    is_sell: bool,
    mq: Amount,
    bq: Amount,
    days_from_now: u128,
    days_from_expire: u128,
    max_fee_rate: Amount,
) -> Amount {
    if is_sell {
        return mq;
    }
    let base = if is_limit {
        calc_bq(mq, mq, bq, days_from_expire)
    } else {
        bq
    };
    base + secondary_fee(max_fee_rate, mq, days_from_now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lend_fee_scales_with_days() {
        // 1% rate, 365 days: exactly 1% of the amount.
        assert_eq!(lend_fee(1_000_000, 50_000, 365), 500);
        // half the term, half the fee
        assert_eq!(lend_fee(1_000_000, 50_000, 182), 249);
    }

    #[test]
    fn borrow_fee_uses_interest_spread() {
        // interest 1.05, spread 0.05; 2% rate over the full year.
        let fee = borrow_fee(2_000_000, 1_000_000, 105_000_000, 365);
        assert_eq!(fee, 1_000_000u128 * 2 / 100 * 5 / 100);
        // interest below par gives the same spread
        assert_eq!(borrow_fee(2_000_000, 1_000_000, 95_000_000, 365), fee);
    }

    #[test]
    fn calc_bq_interpolates_towards_par() {
        // quote: 100 bond for 95 base over a year
        assert_eq!(calc_bq(100, 100, 95, 365), 95);
        // at maturity the bond trades at par
        assert_eq!(calc_bq(100, 100, 95, 0), 100);
        let mid = calc_bq(100, 100, 95, 180);
        assert!(mid > 95 && mid < 100);
    }

    #[test]
    fn buy_side_lock_covers_price_and_fee() {
        let locked = calc_secondary_locked_amt(
            false,
            false,
            1_000_000,
            950_000,
            365,
            300,
            1_000_000,
        );
        // market buy: bq plus one year of 1% fee on mq
        assert_eq!(locked, 950_000 + 10_000);
        // sell lock is the bond quantity regardless of prices
        assert_eq!(
            calc_secondary_locked_amt(true, true, 1_000_000, 950_000, 365, 300, 1_000_000),
            1_000_000
        );
    }
}

//! Scalar aliases and small helpers shared across the engine.

use std::fmt;

/// Account leaf index in the account tree.
pub type AccountId = u32;

/// Token identifier; also the leaf index inside a token subtree.
pub type TokenId = u16;

/// Token amount in base units.
pub type Amount = u128;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Order leaf index in the order tree.
pub type OrderId = u64;

/// System account that absorbs the no-op account brackets and burnt
/// balances. Reserved at genesis along with the other system slots.
pub const BURN_ACCOUNT: AccountId = 0;

/// Interest denominator: an interest of `1.0x` is stored as `10^8`.
pub const INTEREST_ONE: u128 = 100_000_000;

/// Days per year used by every fee formula.
pub const DAYS_PER_YEAR: u128 = 365;

/// Seconds per day used when converting maturity spans to days.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// A signed adjustment to an unsigned balance.
///
/// Balances are `u128` and every handler knows statically whether it is
/// crediting or debiting, so adjustments carry their sign symbolically
/// instead of squeezing through a signed integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delta {
    /// Credit by the given amount.
    Add(Amount),
    /// Debit by the given amount.
    Sub(Amount),
    /// Leave the balance untouched.
    None,
}

impl Delta {
    /// Net adjustment of a credit and a debit applied together, such as
    /// a matched amount with a fee taken out of it.
    pub fn signed(add: Amount, sub: Amount) -> Self {
        if add >= sub {
            Delta::Add(add - sub)
        } else {
            Delta::Sub(sub - add)
        }
    }

    /// Applies the adjustment, returning `None` on underflow or overflow.
    pub fn apply(self, value: Amount) -> Option<Amount> {
        match self {
            Delta::Add(x) => value.checked_add(x),
            Delta::Sub(x) => value.checked_sub(x),
            Delta::None => Some(value),
        }
    }

    /// Whether applying the adjustment can only fail by underflow.
    pub fn is_debit(self) -> bool {
        matches!(self, Delta::Sub(_))
    }
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delta::Add(x) => write!(f, "+{x}"),
            Delta::Sub(x) => write!(f, "-{x}"),
            Delta::None => write!(f, "+0"),
        }
    }
}

/// Number of whole days between two timestamps, truncating.
///
/// Fee accrual prorates by whole days only; a span shorter than a day
/// accrues nothing.
pub fn span_days(from: Timestamp, to: Timestamp) -> u128 {
    u128::from(to.saturating_sub(from) / SECONDS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_apply() {
        assert_eq!(Delta::Add(5).apply(10), Some(15));
        assert_eq!(Delta::Sub(5).apply(10), Some(5));
        assert_eq!(Delta::Sub(11).apply(10), None);
        assert_eq!(Delta::None.apply(10), Some(10));
        assert_eq!(Delta::Add(1).apply(Amount::MAX), None);
    }

    #[test]
    fn span_days_truncates() {
        assert_eq!(span_days(0, 0), 0);
        assert_eq!(span_days(0, SECONDS_PER_DAY - 1), 0);
        assert_eq!(span_days(0, SECONDS_PER_DAY), 1);
        assert_eq!(span_days(0, 2 * SECONDS_PER_DAY - 1), 1);
        assert_eq!(span_days(100, 100 + 30 * SECONDS_PER_DAY), 30);
        // A maturity already in the past accrues nothing.
        assert_eq!(span_days(500, 100), 0);
    }
}

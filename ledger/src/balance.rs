//! Balance adjustments.
//!
//! Stored balances move by `balance = balance - delta`: a positive delta debits the
//! account and a negative delta credits it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signed amount subtracted from a stored balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BalanceDelta(Decimal);

impl BalanceDelta {
    /// Delta that takes `amount` out of the account.
    pub fn debit(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Delta that puts `amount` into the account.
    pub fn credit(amount: Decimal) -> Self {
        Self(-amount)
    }

    /// Raw delta as bound into `balance - $delta`.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Balance after applying this delta.
    pub fn apply(&self, balance: Decimal) -> Decimal {
        balance - self.0
    }
}

impl fmt::Display for BalanceDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_sign_negative() {
            write!(f, "+{}", -self.0)
        } else {
            write!(f, "-{}", self.0)
        }
    }
}

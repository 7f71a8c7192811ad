//! Money helpers. The ledger is single-currency with two-decimal semantics.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places of the ledger currency.
pub const MONEY_DECIMAL_PLACES: u32 = 2;

/// Flat fee rate applied to customer-initiated transfers (10%).
pub fn fee_rate() -> Decimal {
    Decimal::new(1, 1)
}

/// Round an amount to the ledger's precision (half away from zero).
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Nominal plus fee of one customer-initiated transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    /// Amount the recipient side is owed.
    pub nominal: Decimal,
    /// Fee kept by the platform.
    pub fee: Decimal,
    /// Least balance the sender must hold, `nominal × (1 + rate)` before rounding.
    pub required: Decimal,
}

impl Charge {
    /// Charge for a fee-bearing transfer.
    pub fn with_fee(nominal: Decimal) -> Self {
        let nominal = round_money(nominal);
        Self {
            nominal,
            fee: round_money(nominal * fee_rate()),
            required: nominal * (Decimal::ONE + fee_rate()),
        }
    }

    /// Charge for a fee-free movement (system credits, payouts).
    pub fn without_fee(nominal: Decimal) -> Self {
        let nominal = round_money(nominal);
        Self {
            nominal,
            fee: Decimal::ZERO,
            required: nominal,
        }
    }

    /// Total leaving the sender: `nominal + fee`.
    pub fn total(&self) -> Decimal {
        self.nominal + self.fee
    }

    /// Check if a balance covers the charge. The rounded fee never lowers the bar.
    pub fn is_covered_by(&self, balance: Decimal) -> bool {
        balance >= self.required
    }
}

impl fmt::Display for Charge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (+{} fee)", self.nominal, self.fee)
    }
}

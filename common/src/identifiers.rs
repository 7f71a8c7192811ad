//! Identifier types for payment entities.

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from string.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw id.
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            /// Raw value.
            pub fn value(&self) -> u64 {
                self.0
            }

            /// Value as stored in a signed BIGINT column.
            pub fn as_i64(&self) -> i64 {
                self.0 as i64
            }

            /// Rebuild from a signed BIGINT column.
            pub fn from_i64(v: i64) -> Self {
                Self(v as u64)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a monetary account.
    AccountId
);

uuid_id!(
    /// Identifier of a customer profile.
    CustomerId
);

uuid_id!(
    /// Identifier of a merchant profile.
    MerchantId
);

snowflake_id!(
    /// Time-ordered identifier of a ledger transaction.
    TransactionId
);

snowflake_id!(
    /// Identifier of a settlement row.
    SettlementId
);

snowflake_id!(
    /// Identifier of a beneficiary payout. Zero is reserved for "no beneficiary".
    BeneficiaryId
);

impl BeneficiaryId {
    /// The sentinel carried by pending settlements.
    pub const NONE: BeneficiaryId = BeneficiaryId(0);

    /// Check if this is the pending sentinel.
    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

/// Snowflake epoch: 2020-08-01T00:00:00Z in milliseconds.
pub const SNOWFLAKE_EPOCH_MS: i64 = 1_596_240_000_000;

const MACHINE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// Largest machine id that fits the layout.
pub const MAX_MACHINE_ID: u16 = (1 << MACHINE_BITS) - 1;

#[derive(Debug)]
struct SnowflakeState {
    last_ms: i64,
    sequence: u64,
}

/// 64-bit time-ordered id generator.
///
/// Layout, high to low: 41 bits of milliseconds since [`SNOWFLAKE_EPOCH_MS`],
/// 10 bits of machine id, 12 bits of per-millisecond sequence.
#[derive(Debug)]
pub struct SnowflakeGenerator {
    machine_id: u64,
    state: Mutex<SnowflakeState>,
}

impl SnowflakeGenerator {
    /// Create a generator for a machine id. Ids above [`MAX_MACHINE_ID`] are masked.
    pub fn new(machine_id: u16) -> Self {
        Self {
            machine_id: u64::from(machine_id & MAX_MACHINE_ID),
            state: Mutex::new(SnowflakeState {
                last_ms: 0,
                sequence: 0,
            }),
        }
    }

    /// Machine id baked into every id.
    pub fn machine_id(&self) -> u16 {
        self.machine_id as u16
    }

    /// Generate the next id. Strictly increasing within one generator.
    pub fn next_id(&self) -> u64 {
        let mut state = self.state.lock();

        // A clock that steps backwards keeps counting on the last seen millisecond.
        let mut now = current_ms().max(state.last_ms);

        if now == state.last_ms {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                while now <= state.last_ms {
                    std::hint::spin_loop();
                    now = current_ms();
                }
            }
        } else {
            state.sequence = 0;
        }

        state.last_ms = now;

        let elapsed = (now - SNOWFLAKE_EPOCH_MS).max(0) as u64;
        (elapsed << (MACHINE_BITS + SEQUENCE_BITS))
            | (self.machine_id << SEQUENCE_BITS)
            | state.sequence
    }

    /// Generate a transaction id.
    pub fn transaction_id(&self) -> TransactionId {
        TransactionId(self.next_id())
    }

    /// Generate a settlement id.
    pub fn settlement_id(&self) -> SettlementId {
        SettlementId(self.next_id())
    }

    /// Generate a beneficiary id.
    pub fn beneficiary_id(&self) -> BeneficiaryId {
        BeneficiaryId(self.next_id())
    }
}

impl Default for SnowflakeGenerator {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Extract the millisecond timestamp (unix epoch) from a snowflake id.
pub fn snowflake_timestamp_ms(id: u64) -> i64 {
    (id >> (MACHINE_BITS + SEQUENCE_BITS)) as i64 + SNOWFLAKE_EPOCH_MS
}

fn current_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snowflake_monotonic() {
        let gen = SnowflakeGenerator::new(7);
        let mut last = 0;
        for _ in 0..10_000 {
            let id = gen.next_id();
            assert!(id > last);
            last = id;
        }
    }

    #[test]
    fn test_snowflake_layout() {
        let gen = SnowflakeGenerator::new(42);
        let before = Utc::now().timestamp_millis();
        let id = gen.next_id();
        let after = Utc::now().timestamp_millis();

        assert_eq!((id >> SEQUENCE_BITS) & u64::from(MAX_MACHINE_ID), 42);
        let ts = snowflake_timestamp_ms(id);
        assert!(ts >= before && ts <= after);
        // Fits a signed BIGINT column.
        assert!(id < i64::MAX as u64);
    }

    #[test]
    fn test_machine_id_masked() {
        let gen = SnowflakeGenerator::new(u16::MAX);
        assert_eq!(gen.machine_id(), MAX_MACHINE_ID);
    }

    #[test]
    fn test_uuid_id_roundtrip() {
        let id = AccountId::new();
        let parsed = AccountId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(AccountId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn test_beneficiary_sentinel() {
        assert!(BeneficiaryId::NONE.is_none());
        assert!(!BeneficiaryId::new(5).is_none());
        assert_eq!(TransactionId::from_i64(99).value(), 99);
    }
}

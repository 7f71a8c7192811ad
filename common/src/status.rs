//! Entity kinds and statuses, with the integer codes they are stored as.

use serde::{Deserialize, Serialize};

/// Kind of monetary account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    /// Account owned by a customer.
    Customer,
    /// Account owned by a merchant.
    Merchant,
}

impl AccountType {
    /// Stored code.
    pub fn code(&self) -> i16 {
        match self {
            AccountType::Customer => 1,
            AccountType::Merchant => 2,
        }
    }

    /// Decode a stored code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(AccountType::Customer),
            2 => Some(AccountType::Merchant),
            _ => None,
        }
    }
}

/// Kind of ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// Customer to customer transfer.
    PeerToPeer,
    /// Customer to merchant payment, settled later.
    PeerToBusiness,
    /// System movement on a merchant account (beneficiary payout).
    MerchantSystem,
    /// System-issued credit.
    System,
}

impl TransactionKind {
    /// Stored code.
    pub fn code(&self) -> i16 {
        match self {
            TransactionKind::PeerToPeer => 1,
            TransactionKind::PeerToBusiness => 2,
            TransactionKind::MerchantSystem => 3,
            TransactionKind::System => 9,
        }
    }

    /// Decode a stored code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(TransactionKind::PeerToPeer),
            2 => Some(TransactionKind::PeerToBusiness),
            3 => Some(TransactionKind::MerchantSystem),
            9 => Some(TransactionKind::System),
            _ => None,
        }
    }

    /// Check if the recipient of this kind is a customer (names are encrypted).
    pub fn has_customer_recipient(&self) -> bool {
        matches!(self, TransactionKind::PeerToPeer | TransactionKind::System)
    }

    /// Check if the sender of this kind is the system account.
    pub fn is_system_issued(&self) -> bool {
        matches!(self, TransactionKind::MerchantSystem | TransactionKind::System)
    }
}

/// Transaction lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Cancelled,
    Void,
}

impl TransactionStatus {
    /// Stored code.
    pub fn code(&self) -> i16 {
        match self {
            TransactionStatus::Pending => 0,
            TransactionStatus::Success => 1,
            TransactionStatus::Cancelled => 2,
            TransactionStatus::Void => 9,
        }
    }

    /// Decode a stored code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(TransactionStatus::Pending),
            1 => Some(TransactionStatus::Success),
            2 => Some(TransactionStatus::Cancelled),
            9 => Some(TransactionStatus::Void),
            _ => None,
        }
    }

    /// Check if this is a final state.
    pub fn is_final(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

/// Beneficiary payout status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BeneficiaryStatus {
    Pending,
    Confirmed,
}

impl BeneficiaryStatus {
    /// Stored code.
    pub fn code(&self) -> i16 {
        match self {
            BeneficiaryStatus::Pending => 0,
            BeneficiaryStatus::Confirmed => 1,
        }
    }

    /// Decode a stored code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(BeneficiaryStatus::Pending),
            1 => Some(BeneficiaryStatus::Confirmed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_roundtrip() {
        for kind in [
            TransactionKind::PeerToPeer,
            TransactionKind::PeerToBusiness,
            TransactionKind::MerchantSystem,
            TransactionKind::System,
        ] {
            assert_eq!(TransactionKind::from_code(kind.code().into()), Some(kind));
        }
        assert_eq!(TransactionKind::from_code(4), None);
        assert_eq!(TransactionStatus::from_code(9), Some(TransactionStatus::Void));
        assert_eq!(AccountType::from_code(3), None);
    }

    #[test]
    fn test_kind_helpers() {
        assert!(TransactionKind::System.has_customer_recipient());
        assert!(!TransactionKind::PeerToBusiness.has_customer_recipient());
        assert!(TransactionKind::MerchantSystem.is_system_issued());
        assert!(!TransactionStatus::Pending.is_final());
    }
}

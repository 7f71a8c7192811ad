//! Settlement and beneficiary (payout) records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sp_payment_common::{
    AccountId, BeneficiaryId, BeneficiaryStatus, MerchantId, SettlementId, TransactionId,
};

/// An amount owed to a merchant from one P2B transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: SettlementId,
    pub transaction_id: TransactionId,
    pub merchant_id: MerchantId,
    /// Joined merchant name.
    pub merchant_name: Option<String>,
    /// [`BeneficiaryId::NONE`] until a payout claims it.
    pub beneficiary_id: BeneficiaryId,
    pub amount: Decimal,
    pub settlement_date: DateTime<Utc>,
}

impl Settlement {
    /// Check if no payout has claimed this settlement yet.
    pub fn is_pending(&self) -> bool {
        self.beneficiary_id.is_none()
    }
}

/// List filter for settlements.
#[derive(Debug, Clone, Default)]
pub struct SettlementFilter {
    pub merchant_id: Option<MerchantId>,
    pub beneficiary_id: Option<BeneficiaryId>,
}

impl SettlementFilter {
    /// Check if a record passes this filter.
    pub fn matches(&self, settlement: &Settlement) -> bool {
        self.merchant_id.map_or(true, |m| settlement.merchant_id == m)
            && self
                .beneficiary_id
                .map_or(true, |b| settlement.beneficiary_id == b)
    }
}

/// A payout of pending settlements to a merchant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beneficiary {
    pub id: BeneficiaryId,
    pub merchant_id: MerchantId,
    /// Joined merchant name.
    pub merchant_name: Option<String>,
    pub amount: Decimal,
    pub withdrawal_date: Option<DateTime<Utc>>,
    pub status: BeneficiaryStatus,
}

/// Everything the atomic payout unit needs.
#[derive(Debug, Clone)]
pub struct PayoutRequest {
    pub beneficiary_id: BeneficiaryId,
    pub merchant_id: MerchantId,
    /// Account the payout is taken from.
    pub merchant_account: AccountId,
    /// Sender of the recorded merchant-system transaction.
    pub system_account: AccountId,
    pub transaction_id: TransactionId,
    pub requested_at: DateTime<Utc>,
}

impl PayoutRequest {
    /// Description of the merchant-system transaction written by the payout.
    pub fn description(&self) -> String {
        format!("beneficiary {} withdrawal", self.beneficiary_id)
    }
}

/// List filter for beneficiaries.
#[derive(Debug, Clone, Default)]
pub struct BeneficiaryFilter {
    pub merchant_id: Option<MerchantId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_and_filter() {
        let merchant = MerchantId::new();
        let mut s = Settlement {
            id: SettlementId::new(10),
            transaction_id: TransactionId::new(9),
            merchant_id: merchant,
            merchant_name: None,
            beneficiary_id: BeneficiaryId::NONE,
            amount: Decimal::new(100, 0),
            settlement_date: Utc::now(),
        };
        assert!(s.is_pending());

        let pending = SettlementFilter {
            merchant_id: Some(merchant),
            beneficiary_id: Some(BeneficiaryId::NONE),
        };
        assert!(pending.matches(&s));

        s.beneficiary_id = BeneficiaryId::new(77);
        assert!(!s.is_pending());
        assert!(!pending.matches(&s));
        assert!(SettlementFilter::default().matches(&s));
    }

    #[test]
    fn test_payout_description() {
        let req = PayoutRequest {
            beneficiary_id: BeneficiaryId::new(42),
            merchant_id: MerchantId::new(),
            merchant_account: AccountId::new(),
            system_account: AccountId::new(),
            transaction_id: TransactionId::new(43),
            requested_at: Utc::now(),
        };
        assert_eq!(req.description(), "beneficiary 42 withdrawal");
    }
}

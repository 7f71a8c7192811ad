//! Transaction records and list filters.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sp_payment_common::{
    AccountId, Charge, MerchantId, SettlementId, TransactionId, TransactionKind, TransactionStatus,
};

use crate::account::OwnerName;

/// A stored transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Snowflake id.
    pub id: TransactionId,
    /// Sender account (the system account for system-issued kinds).
    pub sender_id: AccountId,
    /// Recipient account.
    pub recipient_id: AccountId,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub nominal: Decimal,
    pub fee: Decimal,
    pub datetime: DateTime<Utc>,
    pub description: String,
    /// Sender display name, absent for system-issued kinds.
    pub sender_name: Option<OwnerName>,
    /// Recipient display name.
    pub recipient_name: Option<OwnerName>,
}

impl Transaction {
    /// Check if `account` is on either side of this transaction.
    pub fn involves(&self, account: AccountId) -> bool {
        self.sender_id == account || self.recipient_id == account
    }
}

/// A transaction ready to be written.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub id: TransactionId,
    pub sender_id: AccountId,
    pub recipient_id: AccountId,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub charge: Charge,
    pub datetime: DateTime<Utc>,
    pub description: String,
}

impl NewTransaction {
    /// Record as it reads back after insertion, without joined names.
    pub fn to_record(&self) -> Transaction {
        Transaction {
            id: self.id,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            kind: self.kind,
            status: self.status,
            nominal: self.charge.nominal,
            fee: self.charge.fee,
            datetime: self.datetime,
            description: self.description.clone(),
            sender_name: None,
            recipient_name: None,
        }
    }
}

/// The settlement that accompanies a P2B transaction.
#[derive(Debug, Clone)]
pub struct NewSettlement {
    pub id: SettlementId,
    pub merchant_id: MerchantId,
    pub amount: Decimal,
    pub settlement_date: DateTime<Utc>,
}

/// List filter for transactions.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Matches either sender or recipient.
    pub account_id: Option<AccountId>,
    /// Any of these kinds; empty matches every kind.
    pub kinds: Vec<TransactionKind>,
    /// Inclusive, on the transaction date.
    pub date_from: Option<NaiveDate>,
    /// Inclusive, on the transaction date.
    pub date_to: Option<NaiveDate>,
    /// Case-insensitive match on the description.
    pub keyword: Option<String>,
}

impl TransactionFilter {
    /// Check if a record passes this filter.
    pub fn matches(&self, trx: &Transaction) -> bool {
        let date = trx.datetime.date_naive();

        self.account_id.map_or(true, |id| trx.involves(id))
            && (self.kinds.is_empty() || self.kinds.contains(&trx.kind))
            && self.date_from.map_or(true, |from| date >= from)
            && self.date_to.map_or(true, |to| date <= to)
            && self.keyword.as_deref().map_or(true, |kw| {
                trx.description.to_lowercase().contains(&kw.to_lowercase())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn trx(sender: AccountId, recipient: AccountId) -> Transaction {
        NewTransaction {
            id: TransactionId::new(1),
            sender_id: sender,
            recipient_id: recipient,
            kind: TransactionKind::PeerToPeer,
            status: TransactionStatus::Success,
            charge: Charge::with_fee(Decimal::new(100, 0)),
            datetime: Utc.with_ymd_and_hms(2024, 5, 10, 3, 0, 0).unwrap(),
            description: "Lunch money".to_string(),
        }
        .to_record()
    }

    #[test]
    fn test_filter_account_either_side() {
        let (a, b, c) = (AccountId::new(), AccountId::new(), AccountId::new());
        let t = trx(a, b);

        assert!(TransactionFilter { account_id: Some(a), ..Default::default() }.matches(&t));
        assert!(TransactionFilter { account_id: Some(b), ..Default::default() }.matches(&t));
        assert!(!TransactionFilter { account_id: Some(c), ..Default::default() }.matches(&t));
    }

    #[test]
    fn test_filter_dates_and_keyword() {
        let t = trx(AccountId::new(), AccountId::new());
        let day = NaiveDate::from_ymd_opt(2024, 5, 10);

        let f = TransactionFilter { date_from: day, date_to: day, ..Default::default() };
        assert!(f.matches(&t));

        let f = TransactionFilter {
            date_from: NaiveDate::from_ymd_opt(2024, 5, 11),
            ..Default::default()
        };
        assert!(!f.matches(&t));

        let f = TransactionFilter { keyword: Some("LUNCH".to_string()), ..Default::default() };
        assert!(f.matches(&t));

        let f = TransactionFilter { kinds: vec![TransactionKind::System], ..Default::default() };
        assert!(!f.matches(&t));

        let f = TransactionFilter {
            kinds: vec![TransactionKind::System, TransactionKind::PeerToPeer],
            ..Default::default()
        };
        assert!(f.matches(&t));
    }

    #[test]
    fn test_to_record_carries_charge() {
        let t = trx(AccountId::new(), AccountId::new());
        assert_eq!(t.nominal, Decimal::new(100, 0));
        assert_eq!(t.fee, Decimal::new(10, 0));
    }
}

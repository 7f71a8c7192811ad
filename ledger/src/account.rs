//! Account records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sp_payment_common::{AccountId, AccountType};

/// Display name of an account owner as stored.
///
/// Customer names are encrypted at rest, merchant names are plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnerName {
    Sealed(Vec<u8>),
    Plain(String),
}

/// A monetary account as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account identifier.
    pub id: AccountId,
    /// Identity (user) id of the owner.
    pub owner_id: String,
    /// Customer or merchant account.
    pub account_type: AccountType,
    /// Current balance.
    pub balance: Decimal,
    /// Encrypted account number.
    pub account_no: Vec<u8>,
    /// Keyed hash of the plaintext account number.
    pub account_no_hash: Vec<u8>,
    /// Argon2 hash of the PIN.
    pub pin: String,
    /// Row integrity stamp.
    pub row_hash: Option<Vec<u8>>,
    /// Owner display name, joined from the owner's profile.
    pub owner_name: Option<OwnerName>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Ciphertexts covered by the row stamp, in field order.
    pub fn sealed_fields(&self) -> [&[u8]; 1] {
        [self.account_no.as_slice()]
    }

    /// Check if the account is owned by the given identity.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }
}

/// Encrypted account number with its lookup hash and the row stamp over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedNumber {
    pub account_no: Vec<u8>,
    pub account_no_hash: Vec<u8>,
    pub row_hash: Vec<u8>,
}

/// A new account ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub id: AccountId,
    pub owner_id: String,
    pub account_type: AccountType,
    pub number: SealedNumber,
    pub pin: String,
}

impl NewAccount {
    /// Record as it reads back after insertion.
    pub fn to_record(&self, created_at: DateTime<Utc>) -> Account {
        Account {
            id: self.id,
            owner_id: self.owner_id.clone(),
            account_type: self.account_type,
            balance: Decimal::ZERO,
            account_no: self.number.account_no.clone(),
            account_no_hash: self.number.account_no_hash.clone(),
            pin: self.pin.clone(),
            row_hash: Some(self.number.row_hash.clone()),
            owner_name: None,
            created_at,
        }
    }
}

/// Result of inserting an account.
#[derive(Debug, Clone)]
pub enum CreateAccountOutcome {
    Created(Account),
    /// Another live account already holds this account-number hash.
    NumberTaken,
}

/// Mutable account fields. Balance is only ever moved by the ledger engine.
#[derive(Debug, Clone)]
pub struct AccountUpdate {
    pub id: AccountId,
    /// Replacement account number.
    pub number: Option<SealedNumber>,
    /// Replacement PIN hash.
    pub pin: Option<String>,
}

/// Single-account lookup. Every set field must match.
#[derive(Debug, Clone, Default)]
pub struct AccountQuery {
    pub id: Option<AccountId>,
    pub owner_id: Option<String>,
    pub account_no_hash: Option<Vec<u8>>,
}

impl AccountQuery {
    /// Look up by id.
    pub fn by_id(id: AccountId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    /// Look up by owner.
    pub fn by_owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            ..Default::default()
        }
    }

    /// Look up by account-number hash.
    pub fn by_number_hash(hash: Vec<u8>) -> Self {
        Self {
            account_no_hash: Some(hash),
            ..Default::default()
        }
    }

    /// Additionally require the owner.
    pub fn owned_by(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Check if a record satisfies this lookup.
    pub fn matches(&self, account: &Account) -> bool {
        self.id.map_or(true, |id| account.id == id)
            && self.owner_id.as_deref().map_or(true, |o| account.owner_id == o)
            && self
                .account_no_hash
                .as_deref()
                .map_or(true, |h| account.account_no_hash == h)
    }
}

/// List filter for accounts.
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub owner_id: Option<String>,
    pub account_type: Option<AccountType>,
    /// Case-insensitive match on merchant names.
    pub keyword: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account {
            id: AccountId::new(),
            owner_id: "u1".to_string(),
            account_type: AccountType::Customer,
            balance: Decimal::ZERO,
            account_no: vec![1, 2, 3],
            account_no_hash: vec![9, 9],
            pin: String::new(),
            row_hash: None,
            owner_name: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_query_matches() {
        let acc = account();

        assert!(AccountQuery::by_id(acc.id).matches(&acc));
        assert!(AccountQuery::by_id(acc.id).owned_by("u1").matches(&acc));
        assert!(!AccountQuery::by_id(acc.id).owned_by("u2").matches(&acc));
        assert!(AccountQuery::by_number_hash(vec![9, 9]).matches(&acc));
        assert!(!AccountQuery::by_number_hash(vec![9]).matches(&acc));
        assert!(AccountQuery::default().matches(&acc));
    }

    #[test]
    fn test_sealed_fields() {
        let acc = account();
        assert_eq!(acc.sealed_fields(), [&[1u8, 2, 3][..]]);
        assert!(acc.is_owned_by("u1"));
    }
}

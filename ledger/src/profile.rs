//! Customer and merchant profile records. Sensitive fields are held as ciphertext.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sp_payment_common::{CustomerId, MerchantId};

/// A customer profile as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    /// Identity (user) id.
    pub user_id: String,
    pub legal_name: Vec<u8>,
    pub phone: Vec<u8>,
    pub email: Vec<u8>,
    pub birthdate: Vec<u8>,
    pub address: Vec<u8>,
    pub photo_profile: String,
    pub row_hash: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// Ciphertexts covered by the row stamp, in field order.
    pub fn sealed_fields(&self) -> [&[u8]; 5] {
        [
            self.legal_name.as_slice(),
            self.phone.as_slice(),
            self.email.as_slice(),
            self.birthdate.as_slice(),
            self.address.as_slice(),
        ]
    }
}

/// A merchant profile as stored. Only the PIC contact fields are encrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merchant {
    pub id: MerchantId,
    /// Identity (user) id.
    pub user_id: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub pic_name: Vec<u8>,
    pub pic_email: Vec<u8>,
    pub pic_phone: Vec<u8>,
    pub photo_profile: String,
    pub row_hash: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

impl Merchant {
    /// Ciphertexts covered by the row stamp, in field order.
    pub fn sealed_fields(&self) -> [&[u8]; 3] {
        [
            self.pic_name.as_slice(),
            self.pic_email.as_slice(),
            self.pic_phone.as_slice(),
        ]
    }
}

/// Single-profile lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileKey<I> {
    Id(I),
    User(String),
}

impl ProfileKey<CustomerId> {
    /// Check if a customer matches this key.
    pub fn matches(&self, customer: &Customer) -> bool {
        match self {
            ProfileKey::Id(id) => customer.id == *id,
            ProfileKey::User(user) => customer.user_id == *user,
        }
    }
}

impl ProfileKey<MerchantId> {
    /// Check if a merchant matches this key.
    pub fn matches(&self, merchant: &Merchant) -> bool {
        match self {
            ProfileKey::Id(id) => merchant.id == *id,
            ProfileKey::User(user) => merchant.user_id == *user,
        }
    }
}

/// List filter for profiles.
#[derive(Debug, Clone, Default)]
pub struct ProfileFilter {
    /// Case-insensitive match on merchant names. Customer names are encrypted and
    /// cannot be searched.
    pub keyword: Option<String>,
}

impl ProfileFilter {
    /// Check if a merchant passes this filter.
    pub fn matches_merchant(&self, merchant: &Merchant) -> bool {
        self.keyword.as_deref().map_or(true, |kw| {
            merchant.name.to_lowercase().contains(&kw.to_lowercase())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merchant() -> Merchant {
        Merchant {
            id: MerchantId::new(),
            user_id: "m-1".to_string(),
            name: "Kopi Kenangan".to_string(),
            phone: "021".to_string(),
            email: "shop@example.com".to_string(),
            address: "Jl. Sudirman".to_string(),
            pic_name: vec![1],
            pic_email: vec![2],
            pic_phone: vec![3],
            photo_profile: String::new(),
            row_hash: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_merchant_sealed_order() {
        let m = merchant();
        assert_eq!(m.sealed_fields(), [&[1u8][..], &[2u8][..], &[3u8][..]]);
    }

    #[test]
    fn test_keys_and_filter() {
        let m = merchant();
        assert!(ProfileKey::<MerchantId>::User("m-1".to_string()).matches(&m));
        assert!(ProfileKey::Id(m.id).matches(&m));
        assert!(!ProfileKey::<MerchantId>::User("m-2".to_string()).matches(&m));

        let f = ProfileFilter { keyword: Some("kopi".to_string()) };
        assert!(f.matches_merchant(&m));
        let f = ProfileFilter { keyword: Some("bakery".to_string()) };
        assert!(!f.matches_merchant(&m));
    }
}

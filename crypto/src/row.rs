//! Row-level protocol: encrypt each sensitive field with its own IV, concatenate the
//! ciphertexts in a fixed field order, and keep one keyed hash over that concatenation
//! as the row's integrity stamp.

use std::fmt;

use crate::encryption::{self, validate_key};
use crate::hash::{keyed_hash, verify_keyed_hash};
use crate::{CryptoError, Result};

/// Outcome of checking a stored row stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampStatus {
    /// Stamp matches the stored ciphertexts.
    Valid,
    /// Stamp present but does not match.
    Mismatch,
    /// Row carries no stamp.
    Missing,
}

impl StampStatus {
    /// Check if the row can be trusted.
    pub fn is_valid(&self) -> bool {
        matches!(self, StampStatus::Valid)
    }
}

/// Keys of the Field Crypto Layer, constructed once from configuration.
#[derive(Clone)]
pub struct FieldCipher {
    db_key: Vec<u8>,
    hash_key: Vec<u8>,
}

impl FieldCipher {
    /// Create a cipher from the field encryption key and the keyed-hash key.
    pub fn new(db_key: Vec<u8>, hash_key: Vec<u8>) -> Result<Self> {
        validate_key(&db_key)?;
        if hash_key.is_empty() {
            return Err(CryptoError::InvalidKey("hash key is empty".to_string()));
        }
        Ok(Self { db_key, hash_key })
    }

    /// Encrypt a single field.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        encryption::encrypt(plaintext, &self.db_key)
    }

    /// Decrypt a single field.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>> {
        encryption::decrypt(blob, &self.db_key)
    }

    /// Decrypt a field that holds text.
    pub fn decrypt_string(&self, blob: &[u8]) -> Result<String> {
        String::from_utf8(self.decrypt(blob)?)
            .map_err(|_| CryptoError::DecryptionFailed("field is not valid UTF-8".to_string()))
    }

    /// Keyed lookup hash of a value (used for account numbers).
    pub fn lookup_hash(&self, value: &[u8]) -> Result<Vec<u8>> {
        keyed_hash(value, &self.hash_key)
    }

    /// Start sealing a new row.
    pub fn sealer(&self) -> RowSealer<'_> {
        RowSealer {
            cipher: self,
            buffer: Vec::new(),
        }
    }

    /// Recompute the stamp over stored ciphertexts (in field order) and compare.
    pub fn verify_stamp(&self, ciphertexts: &[&[u8]], stamp: Option<&[u8]>) -> StampStatus {
        let stamp = match stamp {
            Some(s) if !s.is_empty() => s,
            _ => return StampStatus::Missing,
        };

        let message = ciphertexts.concat();
        if verify_keyed_hash(&message, &self.hash_key, stamp) {
            StampStatus::Valid
        } else {
            StampStatus::Mismatch
        }
    }
}

impl fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldCipher")
            .field("db_key", &format_args!("<{} bytes>", self.db_key.len()))
            .field("hash_key", &format_args!("<{} bytes>", self.hash_key.len()))
            .finish()
    }
}

/// Accumulates the ciphertexts of one row while its fields are encrypted.
pub struct RowSealer<'a> {
    cipher: &'a FieldCipher,
    buffer: Vec<u8>,
}

impl RowSealer<'_> {
    /// Encrypt the next field and append its ciphertext to the running buffer.
    pub fn seal(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let ciphertext = self.cipher.encrypt(plaintext)?;
        self.buffer.extend_from_slice(&ciphertext);
        Ok(ciphertext)
    }

    /// Compute the row stamp over everything sealed so far.
    pub fn finish(self) -> Result<Vec<u8>> {
        keyed_hash(&self.buffer, &self.cipher.hash_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cipher() -> FieldCipher {
        FieldCipher::new(vec![9u8; 32], b"row-hash-key".to_vec()).unwrap()
    }

    fn sealed_row(cipher: &FieldCipher) -> (Vec<Vec<u8>>, Vec<u8>) {
        let mut sealer = cipher.sealer();
        let fields = vec![
            sealer.seal(b"Jane Doe").unwrap(),
            sealer.seal(b"+62 811 000").unwrap(),
            sealer.seal(b"jane@example.com").unwrap(),
        ];
        (fields, sealer.finish().unwrap())
    }

    #[test]
    fn test_seal_and_verify() {
        let cipher = cipher();
        let (fields, stamp) = sealed_row(&cipher);
        let refs: Vec<&[u8]> = fields.iter().map(|f| f.as_slice()).collect();

        assert_eq!(cipher.verify_stamp(&refs, Some(&stamp)), StampStatus::Valid);
        assert_eq!(cipher.decrypt_string(&fields[0]).unwrap(), "Jane Doe");
    }

    #[test]
    fn test_field_order_matters() {
        let cipher = cipher();
        let (fields, stamp) = sealed_row(&cipher);
        let swapped: Vec<&[u8]> = vec![&fields[1], &fields[0], &fields[2]];

        assert_eq!(cipher.verify_stamp(&swapped, Some(&stamp)), StampStatus::Mismatch);
    }

    #[test]
    fn test_missing_stamp() {
        let cipher = cipher();
        let (fields, _) = sealed_row(&cipher);
        let refs: Vec<&[u8]> = fields.iter().map(|f| f.as_slice()).collect();

        assert_eq!(cipher.verify_stamp(&refs, None), StampStatus::Missing);
        assert_eq!(cipher.verify_stamp(&refs, Some(&[])), StampStatus::Missing);
    }

    #[test]
    fn test_invalid_keys_rejected() {
        assert!(FieldCipher::new(vec![0u8; 10], b"k".to_vec()).is_err());
        assert!(FieldCipher::new(vec![0u8; 32], Vec::new()).is_err());
    }

    #[test]
    fn test_debug_hides_keys() {
        let out = format!("{:?}", cipher());
        assert!(out.contains("<32 bytes>"));
        assert!(!out.contains("row-hash-key"));
    }

    proptest! {
        #[test]
        fn prop_bit_flip_detected(field in 0usize..3, byte in 0usize..32, bit in 0u8..8) {
            let cipher = cipher();
            let (mut fields, stamp) = sealed_row(&cipher);

            let target = &mut fields[field];
            let idx = byte % target.len();
            target[idx] ^= 1 << bit;

            let refs: Vec<&[u8]> = fields.iter().map(|f| f.as_slice()).collect();
            prop_assert_eq!(cipher.verify_stamp(&refs, Some(&stamp)), StampStatus::Mismatch);
        }
    }
}

//! sp-payment Field Crypto Layer
//!
//! Symmetric encryption of sensitive fields, keyed-hash row stamps and PIN hashing.

pub mod encryption;
pub mod hash;
pub mod pin;
pub mod row;

pub use encryption::{decrypt, encrypt, IV_LEN};
pub use hash::{keyed_hash, verify_keyed_hash, KEYED_HASH_LEN};
pub use pin::{hash_pin, verify_pin};
pub use row::{FieldCipher, RowSealer, StampStatus};

use sp_payment_common::PaymentError;

/// Errors from cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Entropy source unavailable: {0}")]
    EntropyUnavailable(String),

    #[error("Malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("PIN hashing failed: {0}")]
    PinHashFailed(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;

impl From<CryptoError> for PaymentError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::MalformedCiphertext(_) | CryptoError::DecryptionFailed(_) => {
                PaymentError::DataIntegrity("field".to_string())
            }
            other => PaymentError::Unknown(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sp_payment_common::ErrorKind;

    #[test]
    fn test_error_mapping() {
        let err: PaymentError = CryptoError::DecryptionFailed("bad padding".into()).into();
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);

        let err: PaymentError = CryptoError::EntropyUnavailable("no rng".into()).into();
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }
}

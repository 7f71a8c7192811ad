//! Keyed hashing (HMAC-SHA512).

use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::{CryptoError, Result};

type HmacSha512 = Hmac<Sha512>;

/// Digest length in bytes.
pub const KEYED_HASH_LEN: usize = 64;

/// Compute HMAC-SHA512 of `msg` under `key`.
pub fn keyed_hash(msg: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    mac.update(msg);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Verify a digest in constant time.
pub fn verify_keyed_hash(msg: &[u8], key: &[u8], digest: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha512::new_from_slice(key) else {
        return false;
    };
    mac.update(msg);
    mac.verify_slice(digest).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2.
        let digest = keyed_hash(b"what do ya want for nothing?", b"Jefe").unwrap();
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();

        assert_eq!(digest.len(), KEYED_HASH_LEN);
        assert!(
            hex.starts_with("164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea250554")
        );
    }

    #[test]
    fn test_verify() {
        let digest = keyed_hash(b"12345678", b"hash-key").unwrap();

        assert!(verify_keyed_hash(b"12345678", b"hash-key", &digest));
        assert!(!verify_keyed_hash(b"12345679", b"hash-key", &digest));
        assert!(!verify_keyed_hash(b"12345678", b"other-key", &digest));
        assert!(!verify_keyed_hash(b"12345678", b"hash-key", &digest[..32]));
        assert!(!verify_keyed_hash(b"12345678", b"hash-key", &[]));
    }
}

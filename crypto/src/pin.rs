//! PIN hashing (Argon2id, PHC string format).

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;

use crate::{CryptoError, Result};

/// Hash a PIN with a random salt.
pub fn hash_pin(pin: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(pin.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CryptoError::PinHashFailed(e.to_string()))
}

/// Verify a PIN against a stored hash. A malformed stored hash never verifies.
pub fn verify_pin(pin: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(pin.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_pin("123456").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_pin("123456", &hash));
        assert!(!verify_pin("654321", &hash));
    }

    #[test]
    fn test_salted() {
        assert_ne!(hash_pin("123456").unwrap(), hash_pin("123456").unwrap());
    }

    #[test]
    fn test_malformed_hash() {
        assert!(!verify_pin("123456", ""));
        assert!(!verify_pin("123456", "plaintext"));
    }
}

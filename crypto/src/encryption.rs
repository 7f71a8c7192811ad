//! AES-CBC field encryption.
//!
//! Output layout is `ciphertext || iv`: the IV is appended so decryption can split
//! it deterministically from the tail.

use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

use crate::{CryptoError, Result};

/// Length of the initialization vector (one AES block).
pub const IV_LEN: usize = 16;

const BLOCK_LEN: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Check that a key selects one of AES-128/192/256.
pub fn validate_key(key: &[u8]) -> Result<()> {
    match key.len() {
        16 | 24 | 32 => Ok(()),
        n => Err(CryptoError::InvalidKey(format!(
            "AES key must be 16, 24 or 32 bytes, got {}",
            n
        ))),
    }
}

/// Encrypt one field with a fresh random IV, PKCS#7 padded.
///
/// # Arguments
/// * `plaintext` - Field bytes, may be empty or non-UTF-8
/// * `key` - 16, 24 or 32 byte AES key (32 selects AES-256)
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    validate_key(key)?;

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng()
        .try_fill_bytes(&mut iv)
        .map_err(|e| CryptoError::EntropyUnavailable(e.to_string()))?;

    let init_err = |e: cbc::cipher::InvalidLength| CryptoError::InvalidKey(e.to_string());

    let mut out = match key.len() {
        16 => Aes128CbcEnc::new_from_slices(key, &iv)
            .map_err(init_err)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        24 => Aes192CbcEnc::new_from_slices(key, &iv)
            .map_err(init_err)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        _ => Aes256CbcEnc::new_from_slices(key, &iv)
            .map_err(init_err)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
    };

    out.extend_from_slice(&iv);
    Ok(out)
}

/// Decrypt a `ciphertext || iv` blob and strip the padding.
///
/// Invalid padding is an error, never a silent default: it means tampering or a
/// key mismatch.
pub fn decrypt(blob: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    validate_key(key)?;

    if blob.len() < IV_LEN + BLOCK_LEN || (blob.len() - IV_LEN) % BLOCK_LEN != 0 {
        return Err(CryptoError::MalformedCiphertext(format!(
            "unexpected length {}",
            blob.len()
        )));
    }

    let (ciphertext, iv) = blob.split_at(blob.len() - IV_LEN);
    let init_err = |e: cbc::cipher::InvalidLength| CryptoError::InvalidKey(e.to_string());

    let plaintext = match key.len() {
        16 => Aes128CbcDec::new_from_slices(key, iv)
            .map_err(init_err)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        24 => Aes192CbcDec::new_from_slices(key, iv)
            .map_err(init_err)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        _ => Aes256CbcDec::new_from_slices(key, iv)
            .map_err(init_err)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
    };

    plaintext.map_err(|_| CryptoError::DecryptionFailed("invalid padding".to_string()))
}

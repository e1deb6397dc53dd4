//! Cryptographic Primitive Layer: AEAD container format, key derivation,
//! password hashing, and checksums for data at rest.
//!
//! Container layout: `salt(64) || iv(16) || tag(16) || ciphertext(*)`. Salt
//! and IV are fresh random bytes on every [`encrypt`] call; the data key is
//! re-derived from the embedded salt on [`decrypt`], so the authoritative
//! per-user key never needs to be re-read from storage to decrypt an
//! individual blob.
//!
//! No version prefix is carried in the byte layout; see
//! [`CONTAINER_RESERVED_PREFIX`] and the design note in SPEC_FULL.md §9 for
//! the forward-looking option of adding one ahead of a future cipher or KDF
//! change.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Key, Nonce};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// AES-256-GCM with a 16-byte nonce, matching the container's `iv(16)` field.
type Cipher = AesGcm<Aes256, U16>;

/// Errors from the crypto layer.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// RNG or cipher construction failed.
    #[error("cryptographic operation failed: {0}")]
    CryptoFailure(String),
    /// AEAD tag verification failed, or the container was truncated.
    #[error("integrity check failed")]
    IntegrityFailure,
    /// Password hash parsing or verification failed for a reason other than
    /// a simple mismatch (malformed digest).
    #[error("password hash error: {0}")]
    PasswordHash(String),
    /// Underlying file I/O failed while streaming a checksum.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

const SALT_LEN: usize = 64;
const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;
/// Not reserved: the byte layout has no version prefix. Kept at `0` as a
/// documented non-reservation rather than silently omitted; see the design
/// note in SPEC_FULL.md §9.
pub const CONTAINER_RESERVED_PREFIX: usize = 0;
const PBKDF2_ITERATIONS: u32 = 100_000;
const DATA_KEY_LEN: usize = 32;
const READ_CHUNK: usize = 64 * 1024;

/// A 32-byte user file-encryption key, stored hex-encoded by the caller.
pub type UserKey = [u8; 32];

/// Generate a fresh 32-byte user key at registration time.
#[must_use]
pub fn generate_user_key() -> UserKey {
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

/// Derive the 32-byte AES-256-GCM data key from a user key and a per-container
/// salt via PBKDF2-HMAC-SHA-512, 100,000 iterations. Parameters are fixed at
/// the system level so a given `(user_key, salt)` pair always reproduces the
/// same data key.
#[must_use]
pub fn derive_data_key(user_key: &UserKey, salt: &[u8; SALT_LEN]) -> [u8; DATA_KEY_LEN] {
    let mut out = [0u8; DATA_KEY_LEN];
    pbkdf2::pbkdf2_hmac::<sha2::Sha512>(user_key, salt, PBKDF2_ITERATIONS, &mut out);
    out
}

/// Encrypt `plaintext` under `user_key`, returning the self-describing
/// container `salt(64) || iv(16) || tag(16) || ciphertext`.
pub fn encrypt(plaintext: &[u8], user_key: &UserKey) -> Result<Vec<u8>, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    rand::thread_rng().fill_bytes(&mut iv);

    let data_key = derive_data_key(user_key, &salt);
    let cipher = Cipher::new(Key::<Cipher>::from_slice(&data_key));
    let nonce = Nonce::<Cipher>::from_slice(&iv);
    let ct_and_tag = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::CryptoFailure(e.to_string()))?;

    // `aes-gcm` appends the tag after the ciphertext; the container format
    // wants it between IV and ciphertext so a streaming writer can reserve
    // the slot up front and back-fill it after the final block.
    let split = ct_and_tag.len() - TAG_LEN;
    let (ct, tag) = ct_and_tag.split_at(split);

    let mut out = Vec::with_capacity(SALT_LEN + IV_LEN + TAG_LEN + ct.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&iv);
    out.extend_from_slice(tag);
    out.extend_from_slice(ct);
    Ok(out)
}

/// Decrypt a container produced by [`encrypt`], verifying the embedded AEAD tag.
pub fn decrypt(container: &[u8], user_key: &UserKey) -> Result<Vec<u8>, CryptoError> {
    if container.len() < SALT_LEN + IV_LEN + TAG_LEN {
        return Err(CryptoError::IntegrityFailure);
    }
    let salt: [u8; SALT_LEN] = container[0..SALT_LEN].try_into().unwrap();
    let iv: [u8; IV_LEN] = container[SALT_LEN..SALT_LEN + IV_LEN].try_into().unwrap();
    let tag = &container[SALT_LEN + IV_LEN..SALT_LEN + IV_LEN + TAG_LEN];
    let ct = &container[SALT_LEN + IV_LEN + TAG_LEN..];

    let data_key = derive_data_key(user_key, &salt);
    let cipher = Cipher::new(Key::<Cipher>::from_slice(&data_key));
    let nonce = Nonce::<Cipher>::from_slice(&iv);

    // Re-assemble the ciphertext||tag ordering the `aead` crate expects.
    let mut ct_and_tag = Vec::with_capacity(ct.len() + TAG_LEN);
    ct_and_tag.extend_from_slice(ct);
    ct_and_tag.extend_from_slice(tag);

    cipher.decrypt(nonce, ct_and_tag.as_ref()).map_err(|_| CryptoError::IntegrityFailure)
}

/// SHA-256 of `bytes`, lowercase hex-encoded.
#[must_use]
pub fn hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Streaming SHA-256 of the file at `path`, lowercase hex-encoded.
pub fn file_checksum(path: &Path) -> Result<String, CryptoError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hash a password with Argon2id (memory-hard, cost >= 12 equivalent work factor).
pub fn password_hash(password: &str) -> Result<String, CryptoError> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CryptoError::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a password against a digest produced by [`password_hash`].
pub fn password_verify(password: &str, digest: &str) -> Result<bool, CryptoError> {
    let parsed = PasswordHash::new(digest).map_err(|e| CryptoError::PasswordHash(e.to_string()))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

/// Generate `n` cryptographically strong random bytes.
#[must_use]
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut out = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut out);
    out
}

/// Generate a 32-byte random share token, hex-encoded.
#[must_use]
pub fn generate_share_token() -> String {
    hex::encode(random_bytes(32))
}

/// A byte offset into the on-disk container layout, for documentation and tests.
pub mod layout {
    /// Offset range of the PBKDF2 salt.
    pub const SALT: std::ops::Range<usize> = 0..64;
    /// Offset range of the AES-GCM IV/nonce.
    pub const IV: std::ops::Range<usize> = 64..80;
    /// Offset range of the AES-GCM authentication tag.
    pub const TAG: std::ops::Range<usize> = 80..96;
    /// Fixed-width header length before the ciphertext begins.
    pub const HEADER_LEN: usize = 96;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = generate_user_key();
        let plaintext = b"the quick brown fox jumps over the lazy dog";
        let container = encrypt(plaintext, &key).unwrap();
        let recovered = decrypt(&container, &key).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn wrong_key_fails_integrity() {
        let key = generate_user_key();
        let other = generate_user_key();
        let container = encrypt(b"secret", &key).unwrap();
        assert!(matches!(decrypt(&container, &other), Err(CryptoError::IntegrityFailure)));
    }

    #[test]
    fn single_byte_mutation_fails_integrity() {
        let key = generate_user_key();
        let mut container = encrypt(b"secret payload", &key).unwrap();
        let last = container.len() - 1;
        container[last] ^= 0x01;
        assert!(matches!(decrypt(&container, &key), Err(CryptoError::IntegrityFailure)));
    }

    #[test]
    fn container_layout_matches_spec() {
        let key = generate_user_key();
        let plaintext = vec![0x41u8; 1024];
        let container = encrypt(&plaintext, &key).unwrap();
        assert_eq!(container.len(), layout::HEADER_LEN + plaintext.len());
        assert_eq!(&container[layout::SALT].len(), &64);
        assert_eq!(&container[layout::IV].len(), &16);
        assert_eq!(&container[layout::TAG].len(), &16);
    }

    #[test]
    fn truncated_container_fails_cleanly() {
        let key = generate_user_key();
        assert!(matches!(decrypt(&[0u8; 10], &key), Err(CryptoError::IntegrityFailure)));
    }

    #[test]
    fn checksum_consistency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");
        let data = vec![0x41u8; 1024];
        std::fs::write(&path, &data).unwrap();
        assert_eq!(file_checksum(&path).unwrap(), hash(&data));
    }

    #[test]
    fn password_round_trip() {
        let digest = password_hash("Aa1!aaaa").unwrap();
        assert!(password_verify("Aa1!aaaa", &digest).unwrap());
        assert!(!password_verify("wrong", &digest).unwrap());
    }

    #[test]
    fn derive_data_key_is_reproducible() {
        let key = generate_user_key();
        let salt = [7u8; 64];
        assert_eq!(derive_data_key(&key, &salt), derive_data_key(&key, &salt));
    }
}

//! AES-256-GCM symmetric key.
//!
//! Two layouts are supported. The combined form is
//! `nonce (12 bytes) || ciphertext || tag (16 bytes)`, used for session
//! messages. The detached form returns the nonce separately, used for
//! selective-disclosure payloads that carry `{data, nonce}` side by side.
//! A fresh random nonce is drawn for every encryption.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;

use crate::hash::sha256;
use crate::PrimitivesError;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Algorithm label carried next to detached ciphertexts.
pub const ALGORITHM: &str = "AES-256-GCM";

/// A 32-byte AES-256-GCM key.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey {
    key: [u8; KEY_LEN],
}

impl SymmetricKey {
    /// Create a key from exactly 32 bytes.
    ///
    /// # Returns
    /// `Ok(SymmetricKey)`, or `InvalidKeyLength` for any other length.
    pub fn new(key: &[u8]) -> Result<Self, PrimitivesError> {
        let key: [u8; KEY_LEN] = key.try_into().map_err(|_| PrimitivesError::InvalidKeyLength {
            expected: KEY_LEN,
            got: key.len(),
        })?;
        Ok(SymmetricKey { key })
    }

    /// Wrap an existing 32-byte array.
    pub fn from_array(key: [u8; KEY_LEN]) -> Self {
        SymmetricKey { key }
    }

    /// Generate a random key.
    pub fn new_random() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut key);
        SymmetricKey { key }
    }

    /// Derive a key deterministically from a passphrase: `SHA-256(passphrase)`.
    pub fn from_passphrase(passphrase: &str) -> Self {
        SymmetricKey {
            key: sha256(passphrase.as_bytes()),
        }
    }

    /// Raw key bytes.
    pub fn to_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key))
    }

    /// Encrypt into the combined `nonce || ciphertext || tag` layout.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, PrimitivesError> {
        let (nonce, ciphertext) = self.encrypt_detached(plaintext)?;
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt the combined layout produced by [`SymmetricKey::encrypt`].
    ///
    /// Fails on truncated input or when the authentication tag does not match.
    pub fn decrypt(&self, message: &[u8]) -> Result<Vec<u8>, PrimitivesError> {
        if message.len() < NONCE_LEN + TAG_LEN {
            return Err(PrimitivesError::DecryptionError(format!(
                "ciphertext too short: {} bytes",
                message.len()
            )));
        }
        let (nonce, ciphertext) = message.split_at(NONCE_LEN);
        self.decrypt_detached(nonce, ciphertext)
    }

    /// Encrypt and return `(nonce, ciphertext || tag)` separately.
    pub fn encrypt_detached(
        &self,
        plaintext: &[u8],
    ) -> Result<([u8; NONCE_LEN], Vec<u8>), PrimitivesError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| PrimitivesError::EncryptionError(e.to_string()))?;
        Ok((nonce, ciphertext))
    }

    /// Decrypt a detached `(nonce, ciphertext || tag)` pair.
    pub fn decrypt_detached(
        &self,
        nonce: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, PrimitivesError> {
        if nonce.len() != NONCE_LEN {
            return Err(PrimitivesError::DecryptionError(format!(
                "nonce must be {} bytes, got {}",
                NONCE_LEN,
                nonce.len()
            )));
        }
        if ciphertext.len() < TAG_LEN {
            return Err(PrimitivesError::DecryptionError(
                "ciphertext shorter than the authentication tag".to_string(),
            ));
        }
        self.cipher()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| PrimitivesError::DecryptionError("authentication failed".to_string()))
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

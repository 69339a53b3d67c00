//! secp256k1 private key.
//!
//! Wraps the k256 signing key and adds hex import/export, message signing,
//! and ECDH shared-point computation.

use std::fmt;

use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::ProjectivePoint;
use rand::rngs::OsRng;

use crate::ec::public_key::PublicKey;
use crate::ec::signature::Signature;
use crate::hash::sha256;
use crate::PrimitivesError;

/// Length of a serialized private key in bytes.
const PRIVATE_KEY_BYTES_LEN: usize = 32;

/// A secp256k1 private key for signing and key agreement.
#[derive(Clone)]
pub struct PrivateKey {
    inner: SigningKey,
}

impl PrivateKey {
    /// Generate a new random private key using the OS random number generator.
    pub fn new() -> Self {
        PrivateKey {
            inner: SigningKey::random(&mut OsRng),
        }
    }

    /// Create a private key from a raw 32-byte scalar.
    ///
    /// # Arguments
    /// * `bytes` - A 32-byte slice representing the private key scalar.
    ///
    /// # Returns
    /// `Ok(PrivateKey)` if the bytes represent a valid scalar on secp256k1,
    /// or an error if the scalar is zero, out of range, or the wrong length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        if bytes.len() != PRIVATE_KEY_BYTES_LEN {
            return Err(PrimitivesError::InvalidKeyLength {
                expected: PRIVATE_KEY_BYTES_LEN,
                got: bytes.len(),
            });
        }
        let inner = SigningKey::from_slice(bytes)
            .map_err(|e| PrimitivesError::InvalidPrivateKey(e.to_string()))?;
        Ok(PrivateKey { inner })
    }

    /// Create a private key from a 64-character hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitivesError> {
        if hex_str.is_empty() {
            return Err(PrimitivesError::InvalidPrivateKey(
                "private key hex is empty".to_string(),
            ));
        }
        let bytes = hex::decode(hex_str)?;
        Self::from_bytes(&bytes)
    }

    /// Serialize the private key as a 32-byte big-endian array.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_bytes().into()
    }

    /// Serialize the private key as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Derive the corresponding public key.
    pub fn pub_key(&self) -> PublicKey {
        PublicKey::from_k256_verifying_key(self.inner.verifying_key())
    }

    /// Sign a pre-computed 32-byte hash. The signature is low-S normalized.
    pub fn sign(&self, hash: &[u8]) -> Result<Signature, PrimitivesError> {
        Signature::sign(hash, self)
    }

    /// Sign arbitrary message bytes: ECDSA over SHA-256(message).
    pub fn sign_message(&self, message: &[u8]) -> Result<Signature, PrimitivesError> {
        self.sign(&sha256(message))
    }

    /// Compute the ECDH shared point with another party's public key.
    ///
    /// Both sides of a relationship obtain the same point:
    /// `a.derive_shared_secret(B) == b.derive_shared_secret(A)`.
    pub fn derive_shared_secret(&self, pub_key: &PublicKey) -> Result<PublicKey, PrimitivesError> {
        let their_point: ProjectivePoint = pub_key.to_projective_point();
        let scalar = *self.inner.as_nonzero_scalar().as_ref();
        let shared = (their_point * scalar).to_affine();
        PublicKey::from_bytes(shared.to_encoded_point(true).as_bytes())
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.inner
    }
}

impl Default for PrivateKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("pub_key", &self.pub_key().to_hex())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_HEX: &str = "0000000000000000000000000000000000000000000000000000000000000001";
    // 1 * G
    const GENERATOR_COMPRESSED: &str =
        "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    #[test]
    fn test_from_hex_and_pub_key() {
        let pk = PrivateKey::from_hex(KEY_HEX).unwrap();
        assert_eq!(pk.to_hex(), KEY_HEX);
        assert_eq!(pk.pub_key().to_hex(), GENERATOR_COMPRESSED);
    }

    #[test]
    fn test_rejects_bad_scalars() {
        assert!(PrivateKey::from_bytes(&[0u8; 32]).is_err());
        assert!(PrivateKey::from_bytes(&[1u8; 31]).is_err());
        assert!(PrivateKey::from_hex("").is_err());
        assert!(PrivateKey::from_hex("zz").is_err());
    }

    #[test]
    fn test_shared_secret_is_symmetric() {
        let alice = PrivateKey::new();
        let bob = PrivateKey::new();
        let ab = alice.derive_shared_secret(&bob.pub_key()).unwrap();
        let ba = bob.derive_shared_secret(&alice.pub_key()).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_debug_does_not_leak_scalar() {
        let pk = PrivateKey::from_hex(KEY_HEX).unwrap();
        let dbg = format!("{:?}", pk);
        assert!(!dbg.contains(KEY_HEX));
    }
}

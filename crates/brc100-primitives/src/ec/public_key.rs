//! secp256k1 public key.
//!
//! Supports compressed SEC1 serialization, P2PKH address generation,
//! and ECDSA verification.

use k256::ecdsa::VerifyingKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::ProjectivePoint;

use crate::ec::signature::Signature;
use crate::hash::{hash160, sha256};
use crate::PrimitivesError;

/// Length of a compressed public key in bytes (prefix + 32 byte x-coordinate).
const COMPRESSED_LEN: usize = 33;

/// Mainnet P2PKH version byte.
const MAINNET_P2PKH: u8 = 0x00;

/// A secp256k1 public key used to verify signatures and identify parties.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    inner: VerifyingKey,
}

impl PublicKey {
    /// Create a PublicKey from SEC1 encoded bytes (compressed or uncompressed).
    ///
    /// # Returns
    /// `Ok(PublicKey)` on success, or an error if the bytes don't represent a valid point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        if bytes.is_empty() {
            return Err(PrimitivesError::InvalidPublicKey(
                "public key is empty".to_string(),
            ));
        }
        let inner = VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|e| PrimitivesError::InvalidPublicKey(e.to_string()))?;
        Ok(PublicKey { inner })
    }

    /// Create a PublicKey from a hex-encoded SEC1 string.
    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitivesError> {
        let bytes = hex::decode(hex_str)?;
        Self::from_bytes(&bytes)
    }

    /// Serialize in compressed SEC1 format (33 bytes).
    pub fn to_compressed(&self) -> [u8; COMPRESSED_LEN] {
        let point = self.inner.to_encoded_point(true);
        let mut out = [0u8; COMPRESSED_LEN];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// Compressed SEC1 form as lowercase hex (66 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_compressed())
    }

    /// Mainnet P2PKH address (Base58Check of Hash160 of the compressed key).
    pub fn to_address(&self) -> String {
        let mut payload = Vec::with_capacity(21);
        payload.push(MAINNET_P2PKH);
        payload.extend_from_slice(&hash160(&self.to_compressed()));
        bs58::encode(payload).with_check().into_string()
    }

    /// Verify a signature over a pre-computed hash.
    pub fn verify(&self, hash: &[u8], sig: &Signature) -> bool {
        sig.verify(hash, self)
    }

    /// Verify a signature over SHA-256(message).
    pub fn verify_message(&self, message: &[u8], sig: &Signature) -> bool {
        self.verify(&sha256(message), sig)
    }

    pub(crate) fn from_k256_verifying_key(vk: &VerifyingKey) -> Self {
        PublicKey { inner: *vk }
    }

    pub(crate) fn to_projective_point(&self) -> ProjectivePoint {
        ProjectivePoint::from(*self.inner.as_affine())
    }

    pub(crate) fn verifying_key(&self) -> &VerifyingKey {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ec::PrivateKey;

    const GENERATOR_COMPRESSED: &str =
        "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    #[test]
    fn test_hex_roundtrip_and_address() {
        let pk = PublicKey::from_hex(GENERATOR_COMPRESSED).unwrap();
        assert_eq!(pk.to_hex(), GENERATOR_COMPRESSED);
        // Well-known address for the compressed generator point.
        assert_eq!(pk.to_address(), "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
    }

    #[test]
    fn test_rejects_invalid_points() {
        assert!(PublicKey::from_bytes(&[]).is_err());
        assert!(PublicKey::from_hex("02ff").is_err());
        assert!(PublicKey::from_hex("not hex").is_err());
    }

    #[test]
    fn test_verify_message() {
        let priv_key = PrivateKey::new();
        let sig = priv_key.sign_message(b"hello").unwrap();
        assert!(priv_key.pub_key().verify_message(b"hello", &sig));
        assert!(!priv_key.pub_key().verify_message(b"hellO", &sig));
    }
}

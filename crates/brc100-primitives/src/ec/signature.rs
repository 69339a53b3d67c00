//! ECDSA signature with DER serialization.
//!
//! Signing uses RFC6979 deterministic nonces over a pre-computed hash and
//! always yields low-S signatures per BIP-0062. Verification accepts high-S
//! encodings by normalizing them first.

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa;

use crate::ec::private_key::PrivateKey;
use crate::ec::public_key::PublicKey;
use crate::PrimitivesError;

/// An ECDSA signature on secp256k1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    inner: ecdsa::Signature,
}

impl Signature {
    /// Parse a DER-encoded signature.
    pub fn from_der(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        let inner = ecdsa::Signature::from_der(bytes)?;
        Ok(Signature { inner })
    }

    /// Parse a hex string of a DER-encoded signature.
    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitivesError> {
        let bytes = hex::decode(hex_str)?;
        Self::from_der(&bytes)
    }

    /// Serialize in DER format.
    pub fn to_der(&self) -> Vec<u8> {
        self.inner.to_der().as_bytes().to_vec()
    }

    /// DER encoding as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_der())
    }

    /// Sign a 32-byte message hash.
    ///
    /// # Arguments
    /// * `hash` - The message hash to sign. Must be 32 bytes.
    /// * `priv_key` - The private key to sign with.
    pub fn sign(hash: &[u8], priv_key: &PrivateKey) -> Result<Self, PrimitivesError> {
        if hash.len() != 32 {
            return Err(PrimitivesError::InvalidSignature(format!(
                "expected a 32-byte hash, got {} bytes",
                hash.len()
            )));
        }
        let sig: ecdsa::Signature = priv_key.signing_key().sign_prehash(hash)?;
        let inner = sig.normalize_s().unwrap_or(sig);
        Ok(Signature { inner })
    }

    /// Verify this signature against a message hash and public key.
    pub fn verify(&self, hash: &[u8], pub_key: &PublicKey) -> bool {
        let sig = self.inner.normalize_s().unwrap_or(self.inner);
        pub_key.verifying_key().verify_prehash(hash, &sig).is_ok()
    }
}

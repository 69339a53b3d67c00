//! Self-issued identity certificate with signing and verification.

use std::collections::BTreeMap;

use brc100_primitives::ec::{PrivateKey, PublicKey, Signature};
use brc100_primitives::util::{BsvWriter, VarInt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Certificate format version.
pub const CERTIFICATE_VERSION: &str = "1.0.0";
/// Issuer name used when none is configured.
pub const DEFAULT_ISSUER: &str = "Babbage-Browser-Wallet";
/// Selective-data marker of a field the subject agreed to disclose.
pub const DISCLOSED: &str = "disclosed";
/// Selective-data marker of a withheld field.
pub const HIDDEN: &str = "hidden";
/// Default validity period in days.
pub const DEFAULT_VALIDITY_DAYS: i64 = 365;

/// An identity certificate.
///
/// The signature covers the canonical encoding of every other field, so
/// any mutation must be followed by re-signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityCertificate {
    pub version: String,
    pub issuer: String,
    pub subject: String,
    /// Compressed signer public key, hex. Empty until signed.
    pub public_key: String,
    /// Field name -> [`DISCLOSED`] / [`HIDDEN`] marker or value.
    pub selective_data: BTreeMap<String, String>,
    /// Hex DER ECDSA signature. Empty until signed.
    pub signature: String,
    pub timestamp: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl IdentityCertificate {
    /// Serialize the certificate to its canonical binary form.
    ///
    /// Map entries are written in key order.
    pub fn to_binary(&self, include_signature: bool) -> Vec<u8> {
        let mut w = BsvWriter::new();
        w.write_var_bytes(self.version.as_bytes());
        w.write_var_bytes(self.issuer.as_bytes());
        w.write_var_bytes(self.subject.as_bytes());
        w.write_var_bytes(self.public_key.as_bytes());

        w.write_varint(VarInt::from(self.selective_data.len()));
        for (name, value) in &self.selective_data {
            w.write_var_bytes(name.as_bytes());
            w.write_var_bytes(value.as_bytes());
        }

        w.write_i64_le(self.timestamp.timestamp_millis());
        w.write_i64_le(self.expires_at.timestamp_millis());
        w.write_u8(u8::from(self.revoked));

        if include_signature {
            w.write_var_bytes(self.signature.as_bytes());
        }
        w.into_bytes()
    }

    /// Sign with a locally held key, setting `public_key` to match.
    pub fn sign_with(&mut self, key: &PrivateKey) -> Result<(), AuthError> {
        self.public_key = key.pub_key().to_hex();
        self.signature = key.sign_message(&self.to_binary(false))?.to_hex();
        Ok(())
    }

    /// Recompute the signed bytes and check the signature against `public_key`.
    pub fn verify_signature(&self) -> Result<(), AuthError> {
        if self.signature.is_empty() {
            return Err(AuthError::SignatureInvalid);
        }
        let pub_key = PublicKey::from_hex(&self.public_key)
            .map_err(|e| AuthError::IncompleteCertificate(format!("public key: {}", e)))?;
        let sig = Signature::from_hex(&self.signature).map_err(|_| AuthError::SignatureInvalid)?;
        if pub_key.verify_message(&self.to_binary(false), &sig) {
            Ok(())
        } else {
            Err(AuthError::SignatureInvalid)
        }
    }

    /// Whether `field` is present and marked disclosable.
    pub fn is_disclosed(&self, field: &str) -> bool {
        self.selective_data
            .get(field)
            .is_some_and(|v| v != HIDDEN)
    }

    /// Names of the disclosable fields.
    pub fn disclosed_fields(&self) -> impl Iterator<Item = &str> {
        self.selective_data
            .iter()
            .filter(|(_, v)| v.as_str() != HIDDEN)
            .map(|(k, _)| k.as_str())
    }
}

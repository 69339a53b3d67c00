//! Selective disclosure of identity fields.
//!
//! A disclosure contains exactly the requested fields. Missing and extra
//! fields are both violations and are reported together.

use std::collections::{BTreeMap, BTreeSet};

use brc100_primitives::ec::symmetric::{ALGORITHM, NONCE_LEN};
use brc100_primitives::ec::SymmetricKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::certificate::IdentityCertificate;
use crate::error::AuthError;

/// Field name -> whether the field passes.
pub type FieldMask = BTreeMap<String, bool>;

/// Return exactly the `requested` entries of `data`.
pub fn disclose<V: Clone>(
    data: &BTreeMap<String, V>,
    requested: &BTreeSet<String>,
) -> Result<BTreeMap<String, V>, AuthError> {
    let disclosed: BTreeMap<String, V> = requested
        .iter()
        .filter_map(|f| data.get(f).map(|v| (f.clone(), v.clone())))
        .collect();
    validate_disclosure(&disclosed, requested)?;
    Ok(disclosed)
}

/// Disclose from `data` only fields the certificate marks disclosable.
pub fn disclose_certified<V: Clone>(
    cert: &IdentityCertificate,
    data: &BTreeMap<String, V>,
    requested: &BTreeSet<String>,
) -> Result<BTreeMap<String, V>, AuthError> {
    let withheld: Vec<String> = requested
        .iter()
        .filter(|f| !cert.is_disclosed(f))
        .cloned()
        .collect();
    if !withheld.is_empty() {
        return Err(AuthError::DisclosureMismatch {
            missing: withheld,
            extra: Vec::new(),
        });
    }
    disclose(data, requested)
}

/// Check that the keys of `disclosed` equal `requested`.
pub fn validate_disclosure<V>(
    disclosed: &BTreeMap<String, V>,
    requested: &BTreeSet<String>,
) -> Result<(), AuthError> {
    let missing: Vec<String> = requested
        .iter()
        .filter(|f| !disclosed.contains_key(*f))
        .cloned()
        .collect();
    let extra: Vec<String> = disclosed
        .keys()
        .filter(|k| !requested.contains(*k))
        .cloned()
        .collect();
    if missing.is_empty() && extra.is_empty() {
        Ok(())
    } else {
        Err(AuthError::DisclosureMismatch { missing, extra })
    }
}

/// A mask that passes each of `fields`.
pub fn create_field_mask<I, S>(fields: I) -> FieldMask
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    fields.into_iter().map(|f| (f.into(), true)).collect()
}

/// Keep the entries of `data` the mask passes.
pub fn apply_field_mask<V: Clone>(data: &BTreeMap<String, V>, mask: &FieldMask) -> BTreeMap<String, V> {
    data.iter()
        .filter(|(k, _)| mask.get(*k).copied().unwrap_or(false))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// An AEAD-encrypted selective-disclosure payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedDisclosure {
    pub encrypted: bool,
    /// Hex ciphertext with the authentication tag appended.
    pub data: String,
    /// Hex 12-byte nonce.
    pub nonce: String,
    pub algorithm: String,
}

/// Key derived one-way from a passphrase, for callers without a prior key.
pub fn disclosure_key(passphrase: &str) -> SymmetricKey {
    SymmetricKey::from_passphrase(passphrase)
}

/// Serialize `payload` to JSON and encrypt it.
pub fn encrypt_selective<T: Serialize>(payload: &T, key: &SymmetricKey) -> Result<EncryptedDisclosure, AuthError> {
    let plaintext = serde_json::to_vec(payload)?;
    let (nonce, ciphertext) = key.encrypt_detached(&plaintext)?;
    Ok(EncryptedDisclosure {
        encrypted: true,
        data: hex::encode(ciphertext),
        nonce: hex::encode(nonce),
        algorithm: ALGORITHM.to_string(),
    })
}

/// Decrypt and deserialize a payload produced by [`encrypt_selective`].
pub fn decrypt_selective<T: DeserializeOwned>(
    payload: &EncryptedDisclosure,
    key: &SymmetricKey,
) -> Result<T, AuthError> {
    if !payload.encrypted || payload.algorithm != ALGORITHM {
        return Err(AuthError::MalformedInput(format!(
            "unsupported disclosure payload: {}",
            payload.algorithm
        )));
    }
    let nonce = hex::decode(&payload.nonce)?;
    if nonce.len() != NONCE_LEN {
        return Err(AuthError::MalformedInput("nonce must be 12 bytes".into()));
    }
    let ciphertext = hex::decode(&payload.data)?;
    let plaintext = key
        .decrypt_detached(&nonce, &ciphertext)
        .map_err(|_| AuthError::DecryptionFailed)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("email".to_string(), "a@example.com".to_string()),
            ("name".to_string(), "Alice".to_string()),
            ("country".to_string(), "NZ".to_string()),
        ])
    }

    #[test]
    fn test_validate_reports_both_directions() {
        let requested: BTreeSet<String> = ["email", "phone"].iter().map(|s| s.to_string()).collect();
        let disclosed = BTreeMap::from([
            ("email".to_string(), 1),
            ("name".to_string(), 2),
        ]);
        match validate_disclosure(&disclosed, &requested) {
            Err(AuthError::DisclosureMismatch { missing, extra }) => {
                assert_eq!(missing, vec!["phone"]);
                assert_eq!(extra, vec!["name"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_field_mask() {
        let mut mask = create_field_mask(["email", "name"]);
        mask.insert("name".into(), false);
        let masked = apply_field_mask(&data(), &mask);
        assert_eq!(masked.keys().collect::<Vec<_>>(), vec!["email"]);
    }

    #[test]
    fn test_tampered_payload_fails_decryption() {
        let key = disclosure_key("correct horse");
        let mut payload = encrypt_selective(&data(), &key).unwrap();
        let mut bytes = hex::decode(&payload.data).unwrap();
        bytes[0] ^= 1;
        payload.data = hex::encode(bytes);
        let res: Result<BTreeMap<String, String>, _> = decrypt_selective(&payload, &key);
        assert!(matches!(res, Err(AuthError::DecryptionFailed)));
    }
}

//! Tests for identity certificate issuance and validation.

use std::collections::BTreeMap;
use std::sync::Arc;

use brc100_auth::certificates::validation::{
    check_expiration, check_revocation, check_signature, check_structure,
};
use brc100_auth::certificates::{DISCLOSED, HIDDEN};
use brc100_auth::{AuthError, AuthorityConfig, CertificateAuthority, IdentityCertificate};
use brc100_primitives::ec::{PrivateKey, PublicKey, Signature};
use brc100_wallet::{AddressInfo, KeyHandle, LocalKeyService, WalletError, WalletKeyService};
use chrono::{Duration, Utc};

fn authority() -> (CertificateAuthority, PrivateKey) {
    let key = PrivateKey::new();
    let wallet = Arc::new(LocalKeyService::new(key.clone()));
    (CertificateAuthority::new(wallet, AuthorityConfig::default()), key)
}

/// A wallet whose signing key is unavailable.
struct LockedWallet {
    identity: PublicKey,
}

impl WalletKeyService for LockedWallet {
    fn current_address(&self) -> Result<AddressInfo, WalletError> {
        Ok(AddressInfo {
            address: self.identity.to_address(),
            public_key: self.identity.to_hex(),
        })
    }

    fn key_handle(&self, address: &str) -> Result<KeyHandle, WalletError> {
        Err(WalletError::KeyNotFound(address.to_string()))
    }

    fn sign(&self, _data: &[u8], _handle: &KeyHandle) -> Result<Signature, WalletError> {
        Err(WalletError::General("wallet is locked".into()))
    }

    fn identity_key(&self) -> Result<PublicKey, WalletError> {
        Ok(self.identity.clone())
    }
}

fn locked_wallet() -> Arc<LockedWallet> {
    Arc::new(LockedWallet {
        identity: PrivateKey::new().pub_key(),
    })
}

fn prefs() -> BTreeMap<String, bool> {
    BTreeMap::from([
        ("email".to_string(), true),
        ("name".to_string(), true),
        ("phone".to_string(), false),
    ])
}

#[test]
fn test_issue_marks_fields() {
    let (ca, _) = authority();
    let cert = ca.issue("alice", &prefs()).unwrap();
    assert_eq!(cert.version, "1.0.0");
    assert_eq!(cert.issuer, "Babbage-Browser-Wallet");
    assert_eq!(cert.selective_data["email"], DISCLOSED);
    assert_eq!(cert.selective_data["phone"], HIDDEN);
    assert!(cert.signature.is_empty());
    assert_eq!((cert.expires_at - cert.timestamp).num_days(), 365);
    // Unsigned certificates are structurally incomplete.
    assert!(matches!(check_structure(&cert), Err(AuthError::IncompleteCertificate(_))));
}

#[test]
fn test_signed_certificate_validates() {
    let (ca, key) = authority();
    let cert = ca.issue_signed("alice", &prefs()).unwrap();
    assert_eq!(cert.public_key, key.pub_key().to_hex());
    let status = ca.validate(&cert).unwrap();
    assert!(!status.expiring_soon);
    assert!(status.days_remaining >= 364);
}

#[test]
fn test_every_field_is_bound_by_the_signature() {
    let (ca, _) = authority();
    let signed = ca.issue_signed("alice", &prefs()).unwrap();

    let mutations: Vec<Box<dyn Fn(&mut IdentityCertificate)>> = vec![
        Box::new(|c: &mut IdentityCertificate| c.version = "2.0.0".into()),
        Box::new(|c: &mut IdentityCertificate| c.issuer = "someone-else".into()),
        Box::new(|c: &mut IdentityCertificate| c.subject = "mallory".into()),
        Box::new(|c: &mut IdentityCertificate| {
            c.selective_data.insert("phone".into(), DISCLOSED.into());
        }),
        Box::new(|c: &mut IdentityCertificate| c.timestamp = c.timestamp - Duration::seconds(1)),
        Box::new(|c: &mut IdentityCertificate| c.expires_at = c.expires_at + Duration::days(1)),
        Box::new(|c: &mut IdentityCertificate| c.revoked = true),
    ];

    for mutate in mutations {
        let mut cert = signed.clone();
        mutate(&mut cert);
        assert!(matches!(check_signature(&cert), Err(AuthError::SignatureInvalid)));
        ca.sign(&mut cert).unwrap();
        check_signature(&cert).unwrap();
    }
}

#[test]
fn test_signing_with_other_key_changes_public_key() {
    let (ca, _) = authority();
    let mut cert = ca.issue_signed("alice", &prefs()).unwrap();
    let other = PrivateKey::new();
    cert.sign_with(&other).unwrap();
    assert_eq!(cert.public_key, other.pub_key().to_hex());
    check_signature(&cert).unwrap();

    // Swapping only the public key breaks the binding.
    cert.public_key = PrivateKey::new().pub_key().to_hex();
    assert!(matches!(check_signature(&cert), Err(AuthError::SignatureInvalid)));
}

#[test]
fn test_revocation_is_signed_and_enforced() {
    let (ca, _) = authority();
    let mut cert = ca.issue_signed("alice", &prefs()).unwrap();
    let issued_at = cert.timestamp;
    ca.revoke(&mut cert).unwrap();
    assert!(cert.revoked);
    assert!(cert.timestamp >= issued_at);
    check_signature(&cert).unwrap();
    assert!(matches!(check_revocation(&cert), Err(AuthError::RevokedCertificate)));
    assert!(matches!(ca.validate(&cert), Err(AuthError::RevokedCertificate)));
}

#[test]
fn test_expiration_and_warning_window() {
    let (ca, _) = authority();
    let cert = ca.issue_signed("alice", &prefs()).unwrap();

    let near_end = cert.expires_at - Duration::days(10);
    let status = check_expiration(&cert, near_end, 30).unwrap();
    assert!(status.expiring_soon);
    assert_eq!(status.days_remaining, 10);

    let after = cert.expires_at + Duration::seconds(1);
    assert!(matches!(ca.validate_at(&cert, after), Err(AuthError::Expired(_))));
}

#[test]
fn test_validation_stops_at_first_failure() {
    let (ca, _) = authority();
    let mut cert = ca.issue_signed("alice", &prefs()).unwrap();
    cert.revoked = true;
    // Signature fails before revocation is looked at.
    assert!(matches!(ca.validate(&cert), Err(AuthError::SignatureInvalid)));

    let mut cert = ca.issue_signed("alice", &prefs()).unwrap();
    cert.expires_at = cert.timestamp;
    assert!(matches!(ca.validate_at(&cert, Utc::now()), Err(AuthError::IncompleteCertificate(_))));
}

#[test]
fn test_serde_roundtrip_keeps_signature_valid() {
    let (ca, _) = authority();
    let cert = ca.issue_signed("alice", &prefs()).unwrap();
    let json = serde_json::to_string(&cert).unwrap();
    assert!(json.contains("\"selectiveData\""));
    let back: IdentityCertificate = serde_json::from_str(&json).unwrap();
    check_signature(&back).unwrap();
}

#[test]
fn test_signing_without_key_fails() {
    let ca = CertificateAuthority::new(locked_wallet(), AuthorityConfig::default());
    let mut cert = ca.issue("alice", &prefs()).unwrap();
    assert!(matches!(ca.sign(&mut cert), Err(AuthError::SigningFailed(_))));
    assert!(cert.signature.is_empty());
    assert!(matches!(ca.issue_signed("alice", &prefs()), Err(AuthError::SigningFailed(_))));
}

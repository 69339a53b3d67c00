//! Tests for Type-42 key derivation and peer messages.

use brc100_auth::{AuthError, Type42Deriver};
use brc100_primitives::ec::PrivateKey;
use chrono::{Duration, Utc};
use proptest::prelude::*;

const WALLET_KEY: [u8; 32] = [0x11; 32];
const APP_KEY: [u8; 32] = [0x22; 32];

#[test]
fn test_encrypt_decrypt_roundtrip() {
    let keys = Type42Deriver::default().derive_keys(&WALLET_KEY, &APP_KEY).unwrap();
    let ct = keys.encrypt(b"hello").unwrap();
    assert_ne!(&ct[12..], b"hello");
    assert_eq!(keys.decrypt(&ct).unwrap(), b"hello");
}

#[test]
fn test_truncated_ciphertext_fails() {
    let keys = Type42Deriver::default().derive_keys(&WALLET_KEY, &APP_KEY).unwrap();
    let ct = keys.encrypt(b"hello").unwrap();
    assert!(matches!(keys.decrypt(&ct[..10]), Err(AuthError::DecryptionFailed)));
    assert!(matches!(keys.decrypt(&ct[..ct.len() - 1]), Err(AuthError::DecryptionFailed)));
}

#[test]
fn test_mac_sign_verify() {
    let keys = Type42Deriver::default().derive_keys(&WALLET_KEY, &APP_KEY).unwrap();
    let tag = keys.sign(b"payload");
    assert!(keys.verify(b"payload", &tag));
    assert!(!keys.verify(b"payload!", &tag));
    assert!(!keys.verify(b"payload", &tag[..31]));
}

#[test]
fn test_ecdh_both_sides_agree() {
    let deriver = Type42Deriver::default();
    let alice = PrivateKey::new();
    let bob = PrivateKey::new();
    let a = deriver.derive_keys_ecdh(&alice, &bob.pub_key()).unwrap();
    let b = deriver.derive_keys_ecdh(&bob, &alice.pub_key()).unwrap();
    assert_eq!(a.export().encryption_key, b.export().encryption_key);
    assert_eq!(a.export().signing_key, b.export().signing_key);

    let ct = a.encrypt(b"between us").unwrap();
    assert_eq!(b.decrypt(&ct).unwrap(), b"between us");
}

#[test]
fn test_p2p_message_roundtrip() {
    let deriver = Type42Deriver::default();
    let keys = deriver.derive_keys(&WALLET_KEY, &APP_KEY).unwrap();
    let msg = deriver.create_p2p_message(&keys, "ping");
    assert_eq!(msg.session_id, keys.session_id);
    deriver.verify_p2p_message(&keys, &msg).unwrap();
    assert_eq!(deriver.open_p2p_message(&keys, &msg).unwrap(), b"ping");

    let sealed = deriver.create_encrypted_p2p_message(&keys, b"secret").unwrap();
    assert!(sealed.encrypted);
    assert_eq!(deriver.open_p2p_message(&keys, &sealed).unwrap(), b"secret");
}

#[test]
fn test_stale_message_rejected_despite_valid_signature() {
    let deriver = Type42Deriver::default();
    let keys = deriver.derive_keys(&WALLET_KEY, &APP_KEY).unwrap();
    let six_minutes_ago = Utc::now() - Duration::minutes(6);
    let msg = deriver.create_p2p_message_at(&keys, "late", false, six_minutes_ago);
    match deriver.verify_p2p_message(&keys, &msg) {
        Err(AuthError::MessageTooOld { age_secs, max_secs }) => {
            assert!(age_secs >= 360);
            assert_eq!(max_secs, 300);
        }
        other => panic!("expected MessageTooOld, got {:?}", other),
    }
}

#[test]
fn test_restamped_or_edited_message_rejected() {
    let deriver = Type42Deriver::default();
    let keys = deriver.derive_keys(&WALLET_KEY, &APP_KEY).unwrap();
    let stale = deriver.create_p2p_message_at(&keys, "late", false, Utc::now() - Duration::minutes(6));

    let mut restamped = stale.clone();
    restamped.timestamp = Utc::now();
    assert!(matches!(
        deriver.verify_p2p_message(&keys, &restamped),
        Err(AuthError::SignatureInvalid)
    ));

    let mut edited = deriver.create_p2p_message(&keys, "pay 1");
    edited.content = "pay 100".into();
    assert!(matches!(
        deriver.verify_p2p_message(&keys, &edited),
        Err(AuthError::SignatureInvalid)
    ));
}

#[test]
fn test_message_from_other_relationship_rejected() {
    let deriver = Type42Deriver::default();
    let keys = deriver.derive_keys(&WALLET_KEY, &APP_KEY).unwrap();
    let other = deriver.derive_keys(&WALLET_KEY, &[0x33; 32]).unwrap();
    let mut msg = deriver.create_p2p_message(&other, "hi");
    assert!(deriver.verify_p2p_message(&keys, &msg).is_err());
    msg.session_id = keys.session_id.clone();
    assert!(matches!(
        deriver.verify_p2p_message(&keys, &msg),
        Err(AuthError::SignatureInvalid)
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn key_separation(
        wallet in prop::array::uniform32(any::<u8>()),
        app in prop::array::uniform32(any::<u8>()),
        other in prop::array::uniform32(any::<u8>()),
    ) {
        prop_assume!(app != other);
        let deriver = Type42Deriver::default();
        let a = deriver.derive_keys(&wallet, &app).unwrap().export();
        let again = deriver.derive_keys(&wallet, &app).unwrap().export();
        let b = deriver.derive_keys(&wallet, &other).unwrap().export();

        prop_assert_ne!(&a.encryption_key, &a.signing_key);
        prop_assert_eq!(&a.encryption_key, &again.encryption_key);
        prop_assert_eq!(&a.signing_key, &again.signing_key);
        prop_assert_ne!(&a.encryption_key, &b.encryption_key);
        prop_assert_ne!(&a.signing_key, &b.signing_key);
    }

    #[test]
    fn aead_roundtrip_with_derived_keys(msg in prop::collection::vec(any::<u8>(), 0..512)) {
        let keys = Type42Deriver::default().derive_keys(&WALLET_KEY, &APP_KEY).unwrap();
        let ct = keys.encrypt(&msg).unwrap();
        prop_assert_eq!(keys.decrypt(&ct).unwrap(), msg);
    }
}

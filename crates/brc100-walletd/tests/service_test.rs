//! Tests for the service facade: full authentication flows through the
//! response envelopes, key lifecycle, persistence and SPV verification.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use brc100_auth::certificates::DisclosureRequest;
use brc100_auth::handshake::handshake_signing_data;
use brc100_auth::utils::random_base64;
use brc100_auth::{ChallengeResponse, InitialRequest, Sweep, VerifyRequest};
use brc100_primitives::ec::{PrivateKey, PublicKey, Signature};
use brc100_wallet::{AddressInfo, KeyHandle, LocalKeyService, WalletError, WalletKeyService};
use brc100_walletd::api::{
    ChallengeRequest, CreateSessionRequest, IssueCertificateRequest, SelectiveDisclosureRequest, SpvVerifyRequest,
    Type42Request,
};
use brc100_walletd::{cors_preflight, Brc100Service, MemoryStateStore, StateStore, WalletdConfig};
use chrono::Utc;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn service_with(config: WalletdConfig) -> (Brc100Service, PrivateKey) {
    let key = PrivateKey::new();
    let wallet = Arc::new(LocalKeyService::new(key.clone()));
    (Brc100Service::new(&config, wallet).unwrap(), key)
}

fn service() -> (Brc100Service, PrivateKey) {
    service_with(WalletdConfig::default())
}

fn answer(key: &PrivateKey, challenge_id: &str, nonce: &str) -> ChallengeResponse {
    ChallengeResponse {
        challenge_id: challenge_id.to_string(),
        response: nonce.to_string(),
        signature: key.sign_message(nonce.as_bytes()).unwrap().to_hex(),
        wallet_address: key.pub_key().to_address(),
        public_key: key.pub_key().to_hex(),
    }
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

fn session_for(svc: &Brc100Service, domain: &str) -> String {
    svc.create_session(&CreateSessionRequest {
        app_domain: domain.to_string(),
        ..Default::default()
    })
    .into_result()
    .unwrap()
    .session_id
}

fn type42_request(session_id: &str) -> Type42Request {
    Type42Request {
        session_id: session_id.to_string(),
        wallet_public_key: "01".repeat(32),
        app_public_key: "02".repeat(32),
    }
}

#[test]
fn test_login_flow_end_to_end() {
    let (svc, key) = service();

    let issued = svc
        .issue_challenge(&ChallengeRequest {
            app_domain: "example.com".into(),
        })
        .into_result()
        .unwrap();
    assert_eq!(issued.challenge.len(), 64);

    let response = answer(&key, &issued.challenge_id, &issued.challenge);
    let verified = svc.verify_challenge(&response).into_result().unwrap();
    assert!(verified.authenticated);
    assert_eq!(verified.app_domain, "example.com");

    let replay = svc.verify_challenge(&response);
    assert!(!replay.success);
    assert!(replay.error.unwrap().contains("already solved"));

    let session = svc
        .create_session(&CreateSessionRequest {
            app_domain: "example.com".into(),
            permissions: BTreeSet::from(["identity".to_string()]),
            ..Default::default()
        })
        .into_result()
        .unwrap();
    assert_eq!(session.wallet_address, key.pub_key().to_address());
    assert_eq!(session.expires_at - session.created_at, chrono::Duration::hours(24));
    assert!(!session.authenticated);

    let authed = svc.authenticate_session(&session.session_id).into_result().unwrap();
    assert!(authed.authenticated);

    let derived = svc
        .derive_type42_keys(&type42_request(&session.session_id))
        .into_result()
        .unwrap();
    assert_eq!(derived.session_id, session.session_id);
    assert!(derived.keys.is_none());

    let msg = svc.encrypt_message(&session.session_id, "hello").into_result().unwrap();
    assert_ne!(msg.content, "hello");
    let plain = svc.decrypt_message(&session.session_id, &msg).into_result().unwrap();
    assert_eq!(plain, "hello");

    let status = svc.validate_session(&session.session_id).into_result().unwrap();
    assert!(status.valid);
    assert!(status.authenticated);
}

#[test]
fn test_wrong_signer_is_rejected() {
    let (svc, _) = service();
    let issued = svc
        .issue_challenge(&ChallengeRequest {
            app_domain: "example.com".into(),
        })
        .into_result()
        .unwrap();
    let imposter = PrivateKey::new();
    let mut response = answer(&imposter, &issued.challenge_id, &issued.challenge);
    response.signature = PrivateKey::new().sign_message(issued.challenge.as_bytes()).unwrap().to_hex();

    let result = svc.verify_challenge(&response);
    assert!(!result.success);
    assert!(!result.retryable);
}

#[test]
fn test_unsigned_response_does_not_authenticate() {
    let (svc, _) = service();
    let issued = svc
        .issue_challenge(&ChallengeRequest {
            app_domain: "example.com".into(),
        })
        .into_result()
        .unwrap();
    let unsigned = ChallengeResponse {
        challenge_id: issued.challenge_id.clone(),
        response: issued.challenge.clone(),
        signature: "x".into(),
        wallet_address: "bad".into(),
        public_key: String::new(),
    };
    assert!(!svc.verify_challenge(&unsigned).success);

    let key = PrivateKey::new();
    let mut forged = answer(&key, &issued.challenge_id, &issued.challenge);
    forged.signature = "x".into();
    assert!(!svc.verify_challenge(&forged).success);

    // The challenge was not consumed by the rejected attempts.
    let genuine = answer(&key, &issued.challenge_id, &issued.challenge);
    assert!(svc.verify_challenge(&genuine).into_result().unwrap().authenticated);
}

#[test]
fn test_unknown_session_is_invalid_not_an_error() {
    let (svc, _) = service();
    let status = svc.validate_session(&"ab".repeat(32)).into_result().unwrap();
    assert!(!status.valid);
    assert!(status.expires_at.is_none());
}

#[test]
fn test_key_material_is_withheld_unless_enabled() {
    let (svc, _) = service();
    let id = session_for(&svc, "example.com");
    let derived = svc.derive_type42_keys(&type42_request(&id)).into_result().unwrap();
    let json = serde_json::to_value(&derived).unwrap();
    assert!(json.get("keys").is_none());

    let mut config = WalletdConfig::default();
    config.type42.expose_key_material = true;
    let (svc, _) = service_with(config);
    let id = session_for(&svc, "example.com");
    let derived = svc.derive_type42_keys(&type42_request(&id)).into_result().unwrap();
    assert!(derived.keys.is_some());
}

#[test]
fn test_derivation_requires_live_session() {
    let (svc, _) = service();
    let result = svc.derive_type42_keys(&type42_request(&"cd".repeat(32)));
    assert!(!result.success);

    let id = session_for(&svc, "example.com");
    let mut bad = type42_request(&id);
    bad.app_public_key = "not hex".into();
    assert!(!svc.derive_type42_keys(&bad).success);
}

#[test]
fn test_revoking_session_drops_its_keys() {
    let (svc, _) = service();
    let id = session_for(&svc, "example.com");
    svc.derive_type42_keys(&type42_request(&id)).into_result().unwrap();
    let msg = svc.encrypt_message(&id, "before").into_result().unwrap();

    svc.revoke_session(&id).into_result().unwrap();
    assert!(!svc.encrypt_message(&id, "after").success);
    assert!(!svc.decrypt_message(&id, &msg).success);
    assert!(!svc.revoke_session(&id).success);
}

#[tokio::test]
async fn test_sweep_removes_expired_sessions_and_keys() {
    let mut config = WalletdConfig::default();
    config.session.lifetime_secs = 1;
    let (svc, _) = service_with(config);
    let id = session_for(&svc, "example.com");
    svc.derive_type42_keys(&type42_request(&id)).into_result().unwrap();
    let other = session_for(&svc, "other.com");

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let fresh = session_for(&svc, "other.com");

    assert_eq!(svc.sweep_expired().unwrap(), 2);
    assert!(!svc.encrypt_message(&id, "x").success);
    assert!(!svc.validate_session(&other).into_result().unwrap().valid);
    assert!(svc.validate_session(&fresh).into_result().unwrap().valid);
}

#[test]
fn test_certificate_bound_session_and_disclosure() {
    let (svc, key) = service();
    let cert = svc
        .issue_certificate(&IssueCertificateRequest {
            subject: "alice".into(),
            fields: BTreeMap::from([("name".to_string(), true), ("email".to_string(), false)]),
        })
        .into_result()
        .unwrap();
    assert_eq!(cert.public_key, key.pub_key().to_hex());

    let status = svc.validate_certificate(&cert).into_result().unwrap();
    assert!(status.valid);
    assert!(status.expiry.unwrap().days_remaining > 300);

    let session = svc
        .create_session(&CreateSessionRequest {
            app_domain: "example.com".into(),
            certificate_subject: Some("alice".into()),
            ..Default::default()
        })
        .into_result()
        .unwrap();
    assert_eq!(session.identity_certificate.as_deref(), Some(&cert));

    let identity: BTreeMap<String, Value> = BTreeMap::from([
        ("name".to_string(), json!("Alice")),
        ("email".to_string(), json!("alice@example.com")),
    ]);
    let request = |fields: &[&str]| SelectiveDisclosureRequest {
        subject: "alice".into(),
        request: DisclosureRequest {
            requested_fields: fields.iter().map(|f| f.to_string()).collect(),
            app_domain: "example.com".into(),
            purpose: "login".into(),
        },
        identity_data: identity.clone(),
    };

    let disclosed = svc.disclose_identity(&request(&["name"])).into_result().unwrap();
    assert_eq!(disclosed, BTreeMap::from([("name".to_string(), json!("Alice"))]));
    assert!(!svc.disclose_identity(&request(&["name", "email"])).success);

    let revoked = svc.revoke_certificate("alice").into_result().unwrap();
    assert!(revoked.revoked);
    let status = svc.validate_certificate(&revoked).into_result().unwrap();
    assert!(!status.valid);
    assert!(status.reason.is_some());
    assert!(!svc.disclose_identity(&request(&["name"])).success);
}

#[test]
fn test_revocation_reaches_bound_sessions() {
    let (svc, _) = service();
    svc.issue_certificate(&IssueCertificateRequest {
        subject: "alice".into(),
        fields: BTreeMap::from([("name".to_string(), true)]),
    })
    .into_result()
    .unwrap();
    let session = svc
        .create_session(&CreateSessionRequest {
            app_domain: "example.com".into(),
            certificate_subject: Some("alice".into()),
            ..Default::default()
        })
        .into_result()
        .unwrap();
    assert!(!session.identity_certificate.unwrap().revoked);

    svc.revoke_certificate("alice").into_result().unwrap();

    let bound = svc
        .get_session(&session.session_id)
        .into_result()
        .unwrap()
        .identity_certificate
        .unwrap();
    assert!(bound.revoked);
    assert_eq!(*bound, svc.get_certificate("alice").into_result().unwrap());
    let status = svc.validate_certificate(&bound).into_result().unwrap();
    assert!(!status.valid);

    // A restored service shares the revoked certificate too.
    let restored = service().0;
    restored.restore(svc.snapshot().unwrap()).unwrap();
    let bound = restored
        .get_session(&session.session_id)
        .into_result()
        .unwrap()
        .identity_certificate
        .unwrap();
    assert!(bound.revoked);
}

#[test]
fn test_unknown_certificate_subject() {
    let (svc, _) = service();
    let result = svc.create_session(&CreateSessionRequest {
        app_domain: "example.com".into(),
        certificate_subject: Some("nobody".into()),
        ..Default::default()
    });
    assert!(!result.success);
    assert!(!svc.get_certificate("nobody").success);
}

#[test]
fn test_handshake_through_service() {
    let (svc, key) = service();
    let peer = PrivateKey::new();
    let req = InitialRequest {
        identity_key: peer.pub_key().to_hex(),
        initial_nonce: random_base64(32),
        requested_certificates: None,
    };
    let resp = svc.handshake(&req).into_result().unwrap();
    assert_eq!(resp.identity_key, key.pub_key().to_hex());

    let data = handshake_signing_data(&resp.nonce, &req.initial_nonce);
    let second = VerifyRequest {
        identity_key: peer.pub_key().to_hex(),
        nonce: req.initial_nonce.clone(),
        your_nonce: resp.nonce.clone(),
        signature: peer.sign_message(&data).unwrap().to_hex(),
    };
    let authed = svc.complete_handshake(&second).into_result().unwrap();
    assert_eq!(authed.identity_key, peer.pub_key().to_hex());
    assert!(!svc.complete_handshake(&second).success);
}

#[test]
fn test_signing_failures_reported_in_envelope() {
    let svc = Brc100Service::new(&WalletdConfig::default(), locked_wallet()).unwrap();
    let peer = PrivateKey::new();
    let handshake = svc.handshake(&InitialRequest {
        identity_key: peer.pub_key().to_hex(),
        initial_nonce: random_base64(32),
        requested_certificates: None,
    });
    assert!(!handshake.success);
    assert!(!handshake.retryable);
    assert!(handshake.error.unwrap().starts_with("signing failed"));

    let issued = svc.issue_certificate(&IssueCertificateRequest {
        subject: "alice".into(),
        fields: BTreeMap::new(),
    });
    assert!(!issued.success);
    assert!(issued.error.unwrap().starts_with("signing failed"));
    assert!(!svc.get_certificate("alice").success);
}

#[test]
fn test_state_survives_restart() {
    let (svc, _) = service();
    let challenge = svc
        .issue_challenge(&ChallengeRequest {
            app_domain: "example.com".into(),
        })
        .into_result()
        .unwrap();
    let id = session_for(&svc, "example.com");
    svc.issue_certificate(&IssueCertificateRequest {
        subject: "alice".into(),
        fields: BTreeMap::from([("name".to_string(), true)]),
    })
    .into_result()
    .unwrap();

    let store = MemoryStateStore::new();
    store.save_state(&svc.snapshot().unwrap()).unwrap();

    let (restarted, _) = service();
    restarted.restore(store.load_state().unwrap().unwrap()).unwrap();
    assert!(restarted.validate_session(&id).into_result().unwrap().valid);
    assert!(restarted.get_certificate("alice").success);
    assert_eq!(restarted.challenge_store().get(&challenge.challenge_id).unwrap().nonce, challenge.challenge);
    // Keys are never persisted.
    assert!(!restarted.encrypt_message(&id, "x").success);
}

#[test]
fn test_preflight_headers() {
    let preflight = cors_preflight();
    assert_eq!(preflight.status, 200);
    assert!(preflight
        .headers
        .contains(&("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")));
}

const BRC74_HEX: &str = "fe8a6a0c000c04fde80b0011774f01d26412f0d16ea3f0447be0b5ebec67b0782e321a7a01cbdf7f734e30fde90b02004e53753e3fe4667073063a17987292cfdea278824e9888e52180581d7188d8fdea0b025e441996fc53f0191d649e68a200e752fb5f39e0d5617083408fa179ddc5c998fdeb0b0102fdf405000671394f72237d08a4277f4435e5b6edf7adc272f25effef27cdfe805ce71a81fdf50500262bccabec6c4af3ed00cc7a7414edea9c5efa92fb8623dd6160a001450a528201fdfb020101fd7c010093b3efca9b77ddec914f8effac691ecb54e2c81d0ab81cbc4c4b93befe418e8501bf01015e005881826eb6973c54003a02118fe270f03d46d02681c8bc71cd44c613e86302f8012e00e07a2bb8bb75e5accff266022e1e5e6e7b4d6d943a04faadcf2ab4a22f796ff30116008120cafa17309c0bb0e0ffce835286b3a2dcae48e4497ae2d2b7ced4f051507d010a00502e59ac92f46543c23006bff855d96f5e648043f0fb87a7a5949e6a9bebae430104001ccd9f8f64f4d0489b30cc815351cf425e0e78ad79a589350e4341ac165dbe45010301010000af8764ce7e1cc132ab5ed2229a005c87201c9a5ee15c0f91dd53eff31ab30cd4";
const TXID1: &str = "304e737fdfcb017a1a322e78b067ecebb5e07b44f0a36ed1f01264d2014f7711";

async fn spv_service(woc: &MockServer, taal: &MockServer) -> Brc100Service {
    let mut config = WalletdConfig::default();
    config.providers.whatsonchain_url = woc.uri();
    config.providers.taal_url = taal.uri();
    config.providers.order = vec!["whatsonchain".into(), "taal".into()];
    config.providers.timeout_secs = 5;
    service_with(config).0
}

async fn mount_confirmed_tx(woc: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/tx/{}", TXID1)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "txid": TXID1,
            "blockhash": "00".repeat(32),
            "blockheight": 813706,
            "time": 1700000000,
            "confirmations": 10,
            "vin": [],
            "vout": [{"value": 0.0000001, "n": 0, "scriptPubKey": {"hex": "006a", "type": "nulldata"}}]
        })))
        .mount(woc)
        .await;
}

fn identity_data() -> BTreeMap<String, Value> {
    BTreeMap::from([
        ("subject".to_string(), json!("alice")),
        ("issuer".to_string(), json!("Babbage-Browser-Wallet")),
        ("publicKey".to_string(), json!("02".to_string() + &"11".repeat(32))),
        ("timestamp".to_string(), json!(Utc::now().to_rfc3339())),
    ])
}

#[tokio::test]
async fn test_identity_verified_on_chain() {
    let woc = MockServer::start().await;
    let taal = MockServer::start().await;
    mount_confirmed_tx(&woc).await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/merkle-proof/{}", TXID1)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "bump": BRC74_HEX })))
        .mount(&taal)
        .await;

    let svc = spv_service(&woc, &taal).await;
    let request = SpvVerifyRequest {
        transaction_id: TXID1.into(),
        identity_data: Some(identity_data()),
    };
    let verified = svc.verify_identity(&request).await.into_result().unwrap();
    assert!(verified.valid);
    assert!(verified.proof.is_verified());
    assert_eq!(verified.proof.block_height, 813706);

    let stats = svc.spv_client().stats();
    assert_eq!(stats["whatsonchain"].failures, 1);
    assert_eq!(stats["taal"].failures, 0);
}

#[tokio::test]
async fn test_incomplete_identity_is_invalid_not_an_error() {
    let woc = MockServer::start().await;
    let taal = MockServer::start().await;
    mount_confirmed_tx(&woc).await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/merkle-proof/{}", TXID1)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "bump": BRC74_HEX })))
        .mount(&taal)
        .await;

    let svc = spv_service(&woc, &taal).await;
    let mut data = identity_data();
    data.remove("issuer");
    let verified = svc
        .verify_identity(&SpvVerifyRequest {
            transaction_id: TXID1.into(),
            identity_data: Some(data),
        })
        .await
        .into_result()
        .unwrap();
    assert!(!verified.valid);
    assert!(verified.reason.unwrap().contains("issuer"));
}

#[tokio::test]
async fn test_unreachable_providers_are_retryable() {
    let woc = MockServer::start().await;
    let taal = MockServer::start().await;
    mount_confirmed_tx(&woc).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&taal)
        .await;

    let svc = spv_service(&woc, &taal).await;
    let result = svc
        .verify_identity(&SpvVerifyRequest {
            transaction_id: TXID1.into(),
            identity_data: Some(identity_data()),
        })
        .await;
    assert!(!result.success);
    assert!(result.retryable);
}

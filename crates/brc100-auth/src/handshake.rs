//! Mutual nonce-exchange handshake (BRC-104 style).
//!
//! 1. The counterparty sends its identity key and a base64 `initialNonce`.
//! 2. We reply in the same exchange with our own nonce and a signature over
//!    the two base64 *strings* concatenated, `initialNonce + ourNonce`.
//! 3. The counterparty returns a signature over `ourNonce + initialNonce`,
//!    which we verify against its claimed identity key.
//!
//! Issued nonces are kept in a short-lived ledger so that step 3 can be
//! matched to step 2 exactly once.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use brc100_primitives::ec::{PublicKey, Signature};
use brc100_wallet::WalletKeyService;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::brc104::{
    AUTH_VERSION, HEADER_IDENTITY_KEY, HEADER_MESSAGE_TYPE, HEADER_NONCE, HEADER_SIGNATURE,
    HEADER_VERSION, HEADER_YOUR_NONCE, MESSAGE_TYPE_INITIAL_RESPONSE, NONCE_LENGTH,
};
use crate::error::{poisoned, AuthError};
use crate::sweeper::Sweep;
use crate::utils::{lifetime, random_base64};

/// Handshake settings.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// How long an issued nonce waits for the counterparty's signature.
    pub nonce_ttl: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            nonce_ttl: Duration::from_secs(300),
        }
    }
}

/// Certificates the counterparty would like us to present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedCertificates {
    /// Certifier public keys, hex.
    #[serde(default)]
    pub certifiers: Vec<String>,
    /// Certificate type -> requested field names.
    #[serde(default)]
    pub types: BTreeMap<String, Vec<String>>,
}

/// The counterparty's opening message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialRequest {
    pub identity_key: String,
    pub initial_nonce: String,
    #[serde(default)]
    pub requested_certificates: Option<RequestedCertificates>,
}

/// Our synchronous reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialResponse {
    pub version: String,
    pub message_type: String,
    pub identity_key: String,
    pub nonce: String,
    pub your_nonce: String,
    /// Hex DER ECDSA signature.
    pub signature: String,
}

impl InitialResponse {
    /// The response as BRC-104 HTTP headers.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            (HEADER_VERSION, self.version.clone()),
            (HEADER_MESSAGE_TYPE, self.message_type.clone()),
            (HEADER_IDENTITY_KEY, self.identity_key.clone()),
            (HEADER_NONCE, self.nonce.clone()),
            (HEADER_YOUR_NONCE, self.your_nonce.clone()),
            (HEADER_SIGNATURE, self.signature.clone()),
        ]
    }
}

/// The counterparty's signature over our nonce.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub identity_key: String,
    /// The counterparty's initial nonce.
    pub nonce: String,
    /// The nonce we issued.
    pub your_nonce: String,
    /// Hex DER ECDSA signature over `your_nonce + nonce`.
    pub signature: String,
}

/// A counterparty that completed both legs of the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPeer {
    pub identity_key: PublicKey,
    pub requested_certificates: Option<RequestedCertificates>,
}

#[derive(Debug, Clone)]
struct IssuedNonce {
    their_nonce: String,
    counterparty: String,
    requested_certificates: Option<RequestedCertificates>,
    expires_at: DateTime<Utc>,
}

/// Bytes signed in either direction: the two base64 strings, concatenated.
pub fn handshake_signing_data(first_nonce: &str, second_nonce: &str) -> Vec<u8> {
    let mut data = String::with_capacity(first_nonce.len() + second_nonce.len());
    data.push_str(first_nonce);
    data.push_str(second_nonce);
    data.into_bytes()
}

/// Runs handshakes on behalf of the wallet's identity key.
pub struct HandshakeController {
    wallet: Arc<dyn WalletKeyService>,
    config: HandshakeConfig,
    issued: RwLock<HashMap<String, IssuedNonce>>,
}

impl HandshakeController {
    pub fn new(wallet: Arc<dyn WalletKeyService>, config: HandshakeConfig) -> Self {
        Self {
            wallet,
            config,
            issued: RwLock::new(HashMap::new()),
        }
    }

    /// Answer an initial request with our nonce and signature.
    pub fn respond(&self, request: &InitialRequest) -> Result<InitialResponse, AuthError> {
        PublicKey::from_hex(&request.identity_key)
            .map_err(|e| AuthError::MalformedInput(format!("identity key: {}", e)))?;
        let decoded = BASE64
            .decode(&request.initial_nonce)
            .map_err(|e| AuthError::InvalidNonce(e.to_string()))?;
        if decoded.is_empty() {
            return Err(AuthError::InvalidNonce("initial nonce is empty".into()));
        }

        let our_nonce = random_base64(NONCE_LENGTH);
        let data = handshake_signing_data(&request.initial_nonce, &our_nonce);
        let identity = self
            .wallet
            .identity_key()
            .map_err(|e| AuthError::SigningFailed(e.to_string()))?;
        let signature = self
            .wallet
            .key_handle(&identity.to_address())
            .and_then(|handle| self.wallet.sign(&data, &handle))
            .map_err(|e| {
                warn!(error = %e, "handshake signing failed");
                AuthError::SigningFailed(e.to_string())
            })?;

        let now = Utc::now();
        let mut issued = self.issued.write().map_err(poisoned)?;
        issued.retain(|_, n| n.expires_at > now);
        issued.insert(
            our_nonce.clone(),
            IssuedNonce {
                their_nonce: request.initial_nonce.clone(),
                counterparty: request.identity_key.clone(),
                requested_certificates: request.requested_certificates.clone(),
                expires_at: now + lifetime(self.config.nonce_ttl),
            },
        );
        drop(issued);

        info!(counterparty = %request.identity_key, "handshake response issued");
        Ok(InitialResponse {
            version: AUTH_VERSION.to_string(),
            message_type: MESSAGE_TYPE_INITIAL_RESPONSE.to_string(),
            identity_key: identity.to_hex(),
            nonce: our_nonce,
            your_nonce: request.initial_nonce.clone(),
            signature: signature.to_hex(),
        })
    }

    /// Verify the counterparty's signature over our nonce. The nonce is
    /// consumed only by a successful verification.
    pub fn verify(&self, request: &VerifyRequest) -> Result<AuthenticatedPeer, AuthError> {
        let entry = self
            .issued
            .read()
            .map_err(poisoned)?
            .get(&request.your_nonce)
            .cloned()
            .ok_or_else(|| AuthError::InvalidNonce("unknown or already used".into()))?;
        if entry.expires_at <= Utc::now() {
            self.issued.write().map_err(poisoned)?.remove(&request.your_nonce);
            return Err(AuthError::InvalidNonce("expired".into()));
        }
        if entry.their_nonce != request.nonce {
            return Err(AuthError::InvalidNonce("does not match the initial nonce".into()));
        }
        if entry.counterparty != request.identity_key {
            return Err(AuthError::MalformedInput(
                "identity key differs from the initial request".into(),
            ));
        }

        let identity_key = PublicKey::from_hex(&request.identity_key)
            .map_err(|e| AuthError::MalformedInput(format!("identity key: {}", e)))?;
        let sig = Signature::from_hex(&request.signature).map_err(|_| AuthError::SignatureInvalid)?;
        let data = handshake_signing_data(&request.your_nonce, &request.nonce);
        if !identity_key.verify_message(&data, &sig) {
            warn!(counterparty = %request.identity_key, "handshake signature rejected");
            return Err(AuthError::SignatureInvalid);
        }

        // A concurrent verification may have consumed it meanwhile.
        if self.issued.write().map_err(poisoned)?.remove(&request.your_nonce).is_none() {
            return Err(AuthError::InvalidNonce("unknown or already used".into()));
        }

        info!(counterparty = %request.identity_key, "handshake mutually authenticated");
        Ok(AuthenticatedPeer {
            identity_key,
            requested_certificates: entry.requested_certificates,
        })
    }

    /// Nonces issued and not yet answered.
    pub fn pending(&self) -> Result<usize, AuthError> {
        Ok(self.issued.read().map_err(poisoned)?.len())
    }
}

impl Sweep for HandshakeController {
    fn name(&self) -> &'static str {
        "handshake-nonces"
    }

    fn sweep_expired(&self) -> Result<usize, AuthError> {
        let now = Utc::now();
        let mut issued = self.issued.write().map_err(poisoned)?;
        let before = issued.len();
        issued.retain(|_, n| n.expires_at > now);
        Ok(before - issued.len())
    }
}

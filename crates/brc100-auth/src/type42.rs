//! Type-42 per-relationship key derivation.
//!
//! A shared secret is derived from a wallet key and a counterparty key.
//! Two sub-keys are derived from it under distinct salts and labels: an
//! AES-256-GCM encryption key and an HMAC-SHA256 signing key. The two are
//! never interchangeable.
//!
//! ```text
//! shared     = HMAC(walletKey, counterpartyKey)
//! encryption = HMAC("BRC100-ENCRYPTION-KEY", shared || "encryption")
//! signing    = HMAC("BRC100-SIGNING-KEY",    shared || "signing")
//! ```

use std::fmt;
use std::time::Duration;

use brc100_primitives::ec::{PrivateKey, PublicKey, SymmetricKey};
use brc100_primitives::hash::{constant_time_eq, sha256, sha256_hmac, sha256_hmac_parts};
use brc100_primitives::util::BsvWriter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuthError;
use crate::utils::{lifetime, random_hex};

/// Salt of the encryption sub-key.
pub const ENCRYPTION_SALT: &[u8] = b"BRC100-ENCRYPTION-KEY";
/// Label of the encryption sub-key.
pub const ENCRYPTION_LABEL: &[u8] = b"encryption";
/// Salt of the signing sub-key.
pub const SIGNING_SALT: &[u8] = b"BRC100-SIGNING-KEY";
/// Label of the signing sub-key.
pub const SIGNING_LABEL: &[u8] = b"signing";

/// Key deriver settings.
#[derive(Debug, Clone)]
pub struct Type42Config {
    /// Advisory lifetime of derived keys.
    pub key_lifetime: Duration,
    /// Peer messages older than this are rejected.
    pub max_message_age: Duration,
}

impl Default for Type42Config {
    fn default() -> Self {
        Self {
            key_lifetime: Duration::from_secs(24 * 60 * 60),
            max_message_age: Duration::from_secs(5 * 60),
        }
    }
}

/// Keys for one wallet/counterparty relationship.
///
/// `Debug` never prints key material; use [`Type42Keys::export`] to obtain it.
#[derive(Clone)]
pub struct Type42Keys {
    shared_secret: [u8; 32],
    encryption_key: [u8; 32],
    signing_key: [u8; 32],
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Raw key material in hex, for callers explicitly allowed to see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedType42Keys {
    pub shared_secret: String,
    pub encryption_key: String,
    pub signing_key: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Type42Keys {
    fn from_shared_secret(shared_secret: [u8; 32], session_id: String, now: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Self {
            shared_secret,
            encryption_key: sha256_hmac_parts(ENCRYPTION_SALT, &[&shared_secret, ENCRYPTION_LABEL]),
            signing_key: sha256_hmac_parts(SIGNING_SALT, &[&shared_secret, SIGNING_LABEL]),
            session_id,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn encryption_key(&self) -> SymmetricKey {
        SymmetricKey::from_array(self.encryption_key)
    }

    pub fn signing_key(&self) -> &[u8; 32] {
        &self.signing_key
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Encrypt with a fresh random nonce prepended to the output.
    pub fn encrypt(&self, message: &[u8]) -> Result<Vec<u8>, AuthError> {
        Ok(self.encryption_key().encrypt(message)?)
    }

    /// Reverse [`Type42Keys::encrypt`].
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, AuthError> {
        self.encryption_key()
            .decrypt(ciphertext)
            .map_err(|_| AuthError::DecryptionFailed)
    }

    /// HMAC-SHA256 tag of `message` under the signing key.
    pub fn sign(&self, message: &[u8]) -> [u8; 32] {
        sha256_hmac(&self.signing_key, message)
    }

    /// Check a tag in constant time.
    pub fn verify(&self, message: &[u8], tag: &[u8]) -> bool {
        constant_time_eq(&self.sign(message), tag)
    }

    pub fn export(&self) -> ExportedType42Keys {
        ExportedType42Keys {
            shared_secret: hex::encode(self.shared_secret),
            encryption_key: hex::encode(self.encryption_key),
            signing_key: hex::encode(self.signing_key),
            session_id: self.session_id.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

impl fmt::Debug for Type42Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Type42Keys")
            .field("session_id", &self.session_id)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// A signed peer-to-peer message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct P2PMessage {
    pub message_id: String,
    pub session_id: String,
    /// Plain text, or hex ciphertext when `encrypted` is set.
    pub content: String,
    /// Hex HMAC tag.
    pub signature: String,
    pub timestamp: DateTime<Utc>,
    pub encrypted: bool,
}

impl P2PMessage {
    // Length-prefixed so that no two field splits produce the same input.
    fn mac_input(&self) -> Vec<u8> {
        let mut w = BsvWriter::new();
        w.write_var_bytes(self.session_id.as_bytes());
        w.write_var_bytes(self.message_id.as_bytes());
        w.write_i64_le(self.timestamp.timestamp_millis());
        w.write_u8(u8::from(self.encrypted));
        w.write_var_bytes(self.content.as_bytes());
        w.into_bytes()
    }
}

/// Derives Type-42 keys and wraps messages signed with them.
#[derive(Debug, Clone, Default)]
pub struct Type42Deriver {
    config: Type42Config,
}

impl Type42Deriver {
    pub fn new(config: Type42Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Type42Config {
        &self.config
    }

    /// Derive keys from raw wallet and counterparty key bytes.
    pub fn derive_keys(&self, wallet_key: &[u8], counterparty_key: &[u8]) -> Result<Type42Keys, AuthError> {
        self.derive_keys_at(wallet_key, counterparty_key, Utc::now())
    }

    pub fn derive_keys_at(
        &self,
        wallet_key: &[u8],
        counterparty_key: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Type42Keys, AuthError> {
        if wallet_key.is_empty() || counterparty_key.is_empty() {
            return Err(AuthError::MalformedInput("derivation keys must be non-empty".into()));
        }
        let shared = sha256_hmac(wallet_key, counterparty_key);
        let session_id = key_session_id(wallet_key, counterparty_key, now);
        debug!(session_id = %session_id, "type-42 keys derived");
        Ok(Type42Keys::from_shared_secret(shared, session_id, now, lifetime(self.config.key_lifetime)))
    }

    /// Derive keys from the ECDH point of two secp256k1 keys.
    ///
    /// Both parties obtain identical keys and session id.
    pub fn derive_keys_ecdh(&self, private_key: &PrivateKey, counterparty: &PublicKey) -> Result<Type42Keys, AuthError> {
        let now = Utc::now();
        let point = private_key.derive_shared_secret(counterparty)?;
        let shared = sha256(&point.to_compressed());
        let mut pair = [private_key.pub_key().to_compressed(), counterparty.to_compressed()];
        pair.sort();
        let session_id = key_session_id(&pair[0], &pair[1], now);
        Ok(Type42Keys::from_shared_secret(shared, session_id, now, lifetime(self.config.key_lifetime)))
    }

    /// Wrap plain `content` in a signed message.
    pub fn create_p2p_message(&self, keys: &Type42Keys, content: &str) -> P2PMessage {
        self.create_p2p_message_at(keys, content, false, Utc::now())
    }

    /// Encrypt `plaintext` and wrap the hex ciphertext in a signed message.
    pub fn create_encrypted_p2p_message(&self, keys: &Type42Keys, plaintext: &[u8]) -> Result<P2PMessage, AuthError> {
        let ciphertext = keys.encrypt(plaintext)?;
        Ok(self.create_p2p_message_at(keys, &hex::encode(ciphertext), true, Utc::now()))
    }

    pub fn create_p2p_message_at(
        &self,
        keys: &Type42Keys,
        content: &str,
        encrypted: bool,
        timestamp: DateTime<Utc>,
    ) -> P2PMessage {
        let mut msg = P2PMessage {
            message_id: random_hex(16),
            session_id: keys.session_id.clone(),
            content: content.to_string(),
            signature: String::new(),
            timestamp,
            encrypted,
        };
        msg.signature = hex::encode(keys.sign(&msg.mac_input()));
        msg
    }

    /// Check a message's tag, then its age.
    pub fn verify_p2p_message(&self, keys: &Type42Keys, msg: &P2PMessage) -> Result<(), AuthError> {
        self.verify_p2p_message_at(keys, msg, Utc::now())
    }

    pub fn verify_p2p_message_at(
        &self,
        keys: &Type42Keys,
        msg: &P2PMessage,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        if msg.session_id != keys.session_id {
            return Err(AuthError::MalformedInput("message belongs to another session".into()));
        }
        let tag = hex::decode(&msg.signature).map_err(|_| AuthError::SignatureInvalid)?;
        if !keys.verify(&msg.mac_input(), &tag) {
            return Err(AuthError::SignatureInvalid);
        }

        let max_age = lifetime(self.config.max_message_age);
        let age = now - msg.timestamp;
        if age > max_age {
            return Err(AuthError::MessageTooOld {
                age_secs: age.num_seconds(),
                max_secs: max_age.num_seconds(),
            });
        }
        if -age > max_age {
            return Err(AuthError::MalformedInput("message timestamp is in the future".into()));
        }
        Ok(())
    }

    /// Verify a message and return its plaintext, decrypting if needed.
    pub fn open_p2p_message(&self, keys: &Type42Keys, msg: &P2PMessage) -> Result<Vec<u8>, AuthError> {
        self.verify_p2p_message(keys, msg)?;
        if msg.encrypted {
            let ciphertext = hex::decode(&msg.content)?;
            keys.decrypt(&ciphertext)
        } else {
            Ok(msg.content.clone().into_bytes())
        }
    }
}

fn key_session_id(a: &[u8], b: &[u8], now: DateTime<Utc>) -> String {
    let seed = format!("{}{}{}", hex::encode(a), hex::encode(b), now.timestamp());
    hex::encode(&sha256(seed.as_bytes())[..8])
}

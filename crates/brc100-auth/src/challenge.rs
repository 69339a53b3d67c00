//! One-time authentication challenges.
//!
//! A challenge is a random 256-bit nonce bound to an application domain.
//! It can be solved exactly once before it expires. Verification checks the
//! response against a snapshot taken under the read lock, then re-checks and
//! marks the entry solved under a single write lock so that only one of any
//! number of concurrent verifiers succeeds.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use brc100_primitives::ec::{PublicKey, Signature};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{poisoned, AuthError};
use crate::sweeper::Sweep;
use crate::utils::{is_hex_of_len, lifetime, random_hex};

/// Random bytes in a challenge nonce.
pub const CHALLENGE_NONCE_BYTES: usize = 32;
/// Random bytes in a challenge id.
pub const CHALLENGE_ID_BYTES: usize = 16;

/// Challenge store settings.
#[derive(Debug, Clone)]
pub struct ChallengeStoreConfig {
    /// How long an issued challenge stays solvable.
    pub lifetime: Duration,
}

impl Default for ChallengeStoreConfig {
    fn default() -> Self {
        Self {
            lifetime: Duration::from_secs(300),
        }
    }
}

/// An issued authentication challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub id: String,
    /// 64 hex characters.
    pub nonce: String,
    pub app_domain: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub solved: bool,
}

impl Challenge {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A wallet's answer to a challenge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    pub challenge_id: String,
    /// Must echo the challenge nonce.
    pub response: String,
    /// Hex DER ECDSA signature over SHA-256(nonce).
    pub signature: String,
    /// Must be the address of `public_key`.
    pub wallet_address: String,
    /// Compressed public key, hex. The signature is always checked against it.
    pub public_key: String,
}

/// Counts over the current contents of a [`ChallengeStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChallengeStats {
    pub total: usize,
    pub solved: usize,
    pub expired: usize,
    pub active: usize,
}

/// True if `nonce` has the shape of an issued challenge nonce.
pub fn validate_challenge_nonce(nonce: &str) -> bool {
    is_hex_of_len(nonce, CHALLENGE_NONCE_BYTES * 2)
}

/// Reject responses with any empty field.
pub fn validate_challenge_response(resp: &ChallengeResponse) -> Result<(), AuthError> {
    if resp.challenge_id.is_empty() {
        return Err(AuthError::MalformedResponse("challenge id is empty".into()));
    }
    if resp.response.is_empty() {
        return Err(AuthError::MalformedResponse("response is empty".into()));
    }
    if resp.signature.is_empty() {
        return Err(AuthError::MalformedResponse("signature is empty".into()));
    }
    if resp.wallet_address.is_empty() {
        return Err(AuthError::MalformedResponse("wallet address is empty".into()));
    }
    if resp.public_key.is_empty() {
        return Err(AuthError::MalformedResponse("public key is empty".into()));
    }
    Ok(())
}

/// Thread-safe store of issued challenges.
pub struct ChallengeStore {
    config: ChallengeStoreConfig,
    challenges: RwLock<HashMap<String, Challenge>>,
}

impl ChallengeStore {
    pub fn new(config: ChallengeStoreConfig) -> Self {
        Self {
            config,
            challenges: RwLock::new(HashMap::new()),
        }
    }

    /// Issue a fresh challenge for `app_domain`.
    pub fn create(&self, app_domain: &str) -> Result<Challenge, AuthError> {
        if app_domain.trim().is_empty() {
            return Err(AuthError::MalformedInput("app domain is empty".into()));
        }
        let now = Utc::now();
        let challenge = Challenge {
            id: random_hex(CHALLENGE_ID_BYTES),
            nonce: random_hex(CHALLENGE_NONCE_BYTES),
            app_domain: app_domain.to_string(),
            created_at: now,
            expires_at: now + lifetime(self.config.lifetime),
            solved: false,
        };
        self.challenges
            .write()
            .map_err(poisoned)?
            .insert(challenge.id.clone(), challenge.clone());
        info!(app_domain, challenge_id = %challenge.id, "challenge issued");
        Ok(challenge)
    }

    /// Look up a challenge. An expired entry is removed and reported as `Expired`.
    pub fn get(&self, id: &str) -> Result<Challenge, AuthError> {
        let now = Utc::now();
        let found = self.challenges.read().map_err(poisoned)?.get(id).cloned();
        match found {
            None => Err(AuthError::NotFound("challenge".into())),
            Some(c) if c.is_expired_at(now) => {
                self.challenges.write().map_err(poisoned)?.remove(id);
                Err(AuthError::Expired("challenge".into()))
            }
            Some(c) => Ok(c),
        }
    }

    /// Verify a response and mark the challenge solved.
    ///
    /// Returns the solved challenge. A second successful-looking response to
    /// the same challenge fails with `AlreadySolved`.
    pub fn verify(&self, resp: &ChallengeResponse) -> Result<Challenge, AuthError> {
        validate_challenge_response(resp)?;

        let snapshot = self
            .challenges
            .read()
            .map_err(poisoned)?
            .get(&resp.challenge_id)
            .cloned()
            .ok_or_else(|| AuthError::NotFound("challenge".into()))?;
        check_solvable(&snapshot, Utc::now())?;

        if resp.response != snapshot.nonce {
            return Err(AuthError::MalformedResponse(
                "response does not answer the challenge".into(),
            ));
        }
        verify_response_signature(&snapshot, resp)?;

        let solved = {
            let mut challenges = self.challenges.write().map_err(poisoned)?;
            mark_solved(&mut challenges, &snapshot, Utc::now())?
        };

        info!(
            app_domain = %solved.app_domain,
            challenge_id = %solved.id,
            wallet_address = %resp.wallet_address,
            "challenge solved"
        );
        Ok(solved)
    }

    /// Counts of total, solved, expired and still-solvable challenges.
    pub fn stats(&self) -> Result<ChallengeStats, AuthError> {
        let now = Utc::now();
        let challenges = self.challenges.read().map_err(poisoned)?;
        let mut stats = ChallengeStats {
            total: challenges.len(),
            ..Default::default()
        };
        for c in challenges.values() {
            if c.solved {
                stats.solved += 1;
            } else if c.is_expired_at(now) {
                stats.expired += 1;
            } else {
                stats.active += 1;
            }
        }
        Ok(stats)
    }

    /// Copy of every stored challenge, for persistence.
    pub fn snapshot(&self) -> Result<Vec<Challenge>, AuthError> {
        Ok(self.challenges.read().map_err(poisoned)?.values().cloned().collect())
    }

    /// Load persisted challenges, skipping expired ones. Returns how many were loaded.
    pub fn restore(&self, challenges: Vec<Challenge>) -> Result<usize, AuthError> {
        let now = Utc::now();
        let mut map = self.challenges.write().map_err(poisoned)?;
        let before = map.len();
        for c in challenges.into_iter().filter(|c| !c.is_expired_at(now)) {
            map.entry(c.id.clone()).or_insert(c);
        }
        Ok(map.len() - before)
    }
}

impl Default for ChallengeStore {
    fn default() -> Self {
        Self::new(ChallengeStoreConfig::default())
    }
}

impl Sweep for ChallengeStore {
    fn name(&self) -> &'static str {
        "challenges"
    }

    fn sweep_expired(&self) -> Result<usize, AuthError> {
        let now = Utc::now();
        let mut map = self.challenges.write().map_err(poisoned)?;
        let before = map.len();
        map.retain(|_, c| !c.is_expired_at(now));
        Ok(before - map.len())
    }
}

fn check_solvable(challenge: &Challenge, now: DateTime<Utc>) -> Result<(), AuthError> {
    if challenge.is_expired_at(now) {
        return Err(AuthError::Expired("challenge".into()));
    }
    if challenge.solved {
        return Err(AuthError::AlreadySolved);
    }
    Ok(())
}

// The entry may have been swept since `snapshot` was taken; a sweep only
// removes expired entries, so that case is reported as `Expired`.
fn mark_solved(
    challenges: &mut HashMap<String, Challenge>,
    snapshot: &Challenge,
    now: DateTime<Utc>,
) -> Result<Challenge, AuthError> {
    let entry = match challenges.get_mut(&snapshot.id) {
        Some(entry) => entry,
        None if snapshot.is_expired_at(now) => return Err(AuthError::Expired("challenge".into())),
        None => return Err(AuthError::NotFound("challenge".into())),
    };
    check_solvable(entry, now)?;
    entry.solved = true;
    Ok(entry.clone())
}

fn verify_response_signature(challenge: &Challenge, resp: &ChallengeResponse) -> Result<(), AuthError> {
    let pub_key = PublicKey::from_hex(&resp.public_key)
        .map_err(|e| AuthError::MalformedInput(format!("public key: {}", e)))?;
    if pub_key.to_address() != resp.wallet_address {
        return Err(AuthError::MalformedResponse(
            "wallet address does not match public key".into(),
        ));
    }
    let sig = Signature::from_hex(&resp.signature).map_err(|_| AuthError::SignatureInvalid)?;
    if !pub_key.verify_message(challenge.nonce.as_bytes(), &sig) {
        debug!(challenge_id = %challenge.id, "challenge signature rejected");
        return Err(AuthError::SignatureInvalid);
    }
    Ok(())
}

//! SPV verification of identity proofs.

use std::collections::BTreeMap;
use std::sync::Arc;

use brc100_primitives::chainhash::Hash;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::client::BlockchainDataClient;
use crate::error::SpvError;
use crate::proof::IdentityProof;
use crate::provider::TransactionRecord;

/// Fields an identity data map must carry to pass verification.
pub const REQUIRED_IDENTITY_FIELDS: [&str; 4] = ["subject", "issuer", "publicKey", "timestamp"];

/// Key of the transaction id inside identity data.
pub const TRANSACTION_ID_FIELD: &str = "transactionId";

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Proofs older than this are stale.
    pub max_proof_age_days: i64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self { max_proof_age_days: 365 }
    }
}

/// Builds and checks identity proofs. Holds no per-proof state.
pub struct SpvVerifier {
    client: Arc<BlockchainDataClient>,
    config: VerifierConfig,
}

fn parse_txid(txid: &str) -> Result<Hash, SpvError> {
    if txid.len() != 64 || !txid.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(SpvError::MalformedInput(format!("invalid transaction id: {:?}", txid)));
    }
    Ok(Hash::from_hex(txid)?)
}

impl SpvVerifier {
    pub fn new(client: Arc<BlockchainDataClient>, config: VerifierConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &Arc<BlockchainDataClient> {
        &self.client
    }

    /// Build an unverified proof that `txid` is mined.
    ///
    /// When `identity_data` is `None` it is extracted from the transaction
    /// outputs.
    pub async fn create_identity_proof(
        &self,
        txid: &str,
        identity_data: Option<BTreeMap<String, Value>>,
    ) -> Result<IdentityProof, SpvError> {
        parse_txid(txid)?;
        let tx = self.client.fetch_transaction(txid).await?;
        if !tx.is_confirmed() {
            return Err(SpvError::NotConfirmed { txid: txid.to_string() });
        }

        let record = self.client.fetch_merkle_proof(txid, tx.block_height).await?;
        debug!(txid, provider = %record.source, "merkle proof fetched");

        let identity_data = identity_data.unwrap_or_else(|| extract_identity_data(&tx));
        Ok(IdentityProof::new(
            txid,
            tx.block_height,
            record.proof,
            identity_data,
            Utc::now(),
        ))
    }

    /// Run every check on `proof` and mark it verified when all pass.
    pub async fn verify_identity_proof(&self, proof: &mut IdentityProof) -> Result<(), SpvError> {
        self.verify_identity_proof_at(proof, Utc::now()).await
    }

    pub async fn verify_identity_proof_at(&self, proof: &mut IdentityProof, now: DateTime<Utc>) -> Result<(), SpvError> {
        let result = self.run_checks(proof, now).await;
        match result {
            Ok(()) => {
                proof.mark_verified();
                info!(txid = %proof.transaction_id, block_height = proof.block_height, "identity proof verified");
                Ok(())
            }
            Err(e) => {
                warn!(txid = %proof.transaction_id, error = %e, "identity proof rejected");
                Err(e)
            }
        }
    }

    async fn run_checks(&self, proof: &IdentityProof, now: DateTime<Utc>) -> Result<(), SpvError> {
        check_merkle_path(proof)?;
        self.check_confirmation(proof).await?;
        check_identity_data(&proof.identity_data)?;
        check_freshness(proof.timestamp, now, self.config.max_proof_age_days)
    }

    /// The transaction is still confirmed at the height the proof claims.
    async fn check_confirmation(&self, proof: &IdentityProof) -> Result<(), SpvError> {
        let tx = self.client.fetch_transaction(&proof.transaction_id).await?;
        if !tx.is_confirmed() || tx.block_height != proof.block_height {
            return Err(SpvError::NotConfirmed {
                txid: proof.transaction_id.clone(),
            });
        }
        Ok(())
    }

    /// Verify all proofs concurrently. Failures are collected, not short-circuited.
    pub async fn batch_verify(&self, mut proofs: Vec<IdentityProof>) -> Result<Vec<IdentityProof>, SpvError> {
        let now = Utc::now();
        let outcomes = join_all(proofs.iter_mut().map(|p| self.verify_identity_proof_at(p, now))).await;

        let total = outcomes.len();
        let failures: Vec<(usize, SpvError)> = outcomes
            .into_iter()
            .enumerate()
            .filter_map(|(i, r)| r.err().map(|e| (i, e)))
            .collect();
        if failures.is_empty() {
            Ok(proofs)
        } else {
            Err(SpvError::BatchFailed { total, failures })
        }
    }

    /// Build and verify a proof for the transaction named in `identity_data`.
    pub async fn verify_identity_on_chain(
        &self,
        identity_data: BTreeMap<String, Value>,
    ) -> Result<IdentityProof, SpvError> {
        let txid = identity_data
            .get(TRANSACTION_ID_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| SpvError::IncompleteIdentityData(vec![TRANSACTION_ID_FIELD.to_string()]))?
            .to_string();
        let mut proof = self.create_identity_proof(&txid, Some(identity_data)).await?;
        self.verify_identity_proof(&mut proof).await?;
        Ok(proof)
    }
}

/// The path leads from the transaction id to the committed root.
pub fn check_merkle_path(proof: &IdentityProof) -> Result<(), SpvError> {
    let txid = parse_txid(&proof.transaction_id).map_err(|e| SpvError::MerkleProofInvalid(e.to_string()))?;
    match proof.merkle_proof.verify(&txid) {
        Ok(true) => Ok(()),
        Ok(false) => Err(SpvError::MerkleProofInvalid(format!(
            "computed root does not match {}",
            proof.merkle_proof.root
        ))),
        Err(e) => Err(SpvError::MerkleProofInvalid(e.to_string())),
    }
}

/// Every required field is present.
pub fn check_identity_data(data: &BTreeMap<String, Value>) -> Result<(), SpvError> {
    let missing: Vec<String> = REQUIRED_IDENTITY_FIELDS
        .iter()
        .filter(|f| data.get(**f).map_or(true, Value::is_null))
        .map(|f| f.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SpvError::IncompleteIdentityData(missing))
    }
}

/// `timestamp` is neither in the future nor older than `max_age_days`.
pub fn check_freshness(timestamp: DateTime<Utc>, now: DateTime<Utc>, max_age_days: i64) -> Result<(), SpvError> {
    if timestamp > now {
        return Err(SpvError::StaleProof(format!("timestamp {} is in the future", timestamp)));
    }
    if timestamp < now - Duration::days(max_age_days) {
        return Err(SpvError::StaleProof(format!(
            "timestamp {} is older than {} days",
            timestamp, max_age_days
        )));
    }
    Ok(())
}

/// Identity data derived from transaction outputs alone.
///
/// Scripts are not interpreted. Outputs without a script are skipped.
pub fn extract_identity_data(tx: &TransactionRecord) -> BTreeMap<String, Value> {
    let mut data = BTreeMap::new();
    for (i, output) in tx.outputs.iter().enumerate() {
        if output.script_hex.is_empty() {
            continue;
        }
        data.insert(
            format!("output_{}", i),
            json!({
                "addresses": output.addresses,
                "value": output.value,
                "script": output.script_hex,
                "type": output.script_type,
            }),
        );
    }
    let timestamp = tx
        .time
        .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
        .map(|t| t.to_rfc3339());
    data.insert(
        "transaction".to_string(),
        json!({
            "txID": tx.txid,
            "blockHeight": tx.block_height,
            "timestamp": timestamp,
            "confirmations": tx.confirmations,
        }),
    );
    data
}

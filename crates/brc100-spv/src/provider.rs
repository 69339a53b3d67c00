//! The blockchain data provider interface and the records it normalizes to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderFailure;
use crate::proof::MerkleProof;

/// A transaction output as reported by a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutput {
    pub n: u32,
    /// Value in satoshis.
    pub value: u64,
    pub script_hex: String,
    pub script_type: String,
    pub addresses: Vec<String>,
}

/// A transaction input, reduced to the outpoint it spends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInput {
    pub txid: String,
    pub vout: u32,
}

/// A transaction as seen by a provider. Unconfirmed transactions have
/// zero confirmations and block height.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub txid: String,
    pub block_hash: Option<String>,
    pub block_height: u64,
    pub confirmations: u64,
    /// Block time, unix seconds.
    pub time: Option<i64>,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
}

impl TransactionRecord {
    pub fn is_confirmed(&self) -> bool {
        self.confirmations > 0 && self.block_height > 0
    }
}

/// A Merkle proof together with the provider that served it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleProofRecord {
    pub txid: String,
    pub block_height: u64,
    pub proof: MerkleProof,
    pub source: String,
}

/// An external source of transactions and Merkle proofs.
///
/// Implementations map every failure to a [`ProviderFailure`] so the
/// client can move on to the next provider.
#[async_trait]
pub trait BlockchainDataProvider: Send + Sync {
    /// Short stable name used in logs, stats and configuration.
    fn name(&self) -> &'static str;

    async fn fetch_transaction(&self, txid: &str) -> Result<TransactionRecord, ProviderFailure> {
        let _ = txid;
        Err(ProviderFailure::unsupported(self.name(), "transaction lookup"))
    }

    async fn fetch_merkle_proof(&self, txid: &str, block_height: u64) -> Result<MerkleProofRecord, ProviderFailure>;
}

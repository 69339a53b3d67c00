use async_trait::async_trait;
use brc100_primitives::chainhash::Hash;
use serde::Deserialize;

use super::{get_json, WHATSONCHAIN};
use crate::error::{FailureKind, ProviderFailure};
use crate::proof::MerkleProof;
use crate::provider::{
    BlockchainDataProvider, MerkleProofRecord, TransactionInput, TransactionOutput, TransactionRecord,
};

const SATS_PER_BTC: f64 = 100_000_000.0;

/// WhatsOnChain explorer API. Serves both transactions and TSC proofs.
#[derive(Debug, Clone)]
pub struct WhatsOnChainProvider {
    base_url: String,
    client: reqwest::Client,
}

/// A vout value, which WhatsOnChain sends as a JSON number or a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BtcAmount {
    Number(f64),
    Text(String),
}

impl BtcAmount {
    fn to_sats(&self) -> Result<u64, String> {
        let btc = match self {
            BtcAmount::Number(n) => *n,
            BtcAmount::Text(s) => s.trim().parse::<f64>().map_err(|e| format!("value {:?}: {}", s, e))?,
        };
        if !btc.is_finite() || btc < 0.0 {
            return Err(format!("value out of range: {}", btc));
        }
        Ok((btc * SATS_PER_BTC).round() as u64)
    }
}

#[derive(Debug, Default, Deserialize)]
struct WocScriptPubKey {
    #[serde(default)]
    hex: String,
    #[serde(default, rename = "type")]
    script_type: String,
    #[serde(default)]
    addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WocVout {
    value: BtcAmount,
    n: u32,
    #[serde(default, rename = "scriptPubKey")]
    script_pub_key: WocScriptPubKey,
}

#[derive(Debug, Deserialize)]
struct WocVin {
    #[serde(default)]
    txid: String,
    #[serde(default)]
    vout: u32,
}

#[derive(Debug, Deserialize)]
struct WocTransaction {
    txid: String,
    #[serde(default)]
    blockhash: Option<String>,
    #[serde(default)]
    blockheight: Option<u64>,
    #[serde(default)]
    time: Option<i64>,
    #[serde(default)]
    confirmations: Option<u64>,
    #[serde(default)]
    vin: Vec<WocVin>,
    #[serde(default)]
    vout: Vec<WocVout>,
}

/// One TSC proof object.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TscProof {
    index: u64,
    #[serde(default)]
    tx_or_id: Option<String>,
    target: String,
    nodes: Vec<String>,
    #[serde(default)]
    target_type: Option<String>,
}

/// `/proof/tsc` answers with one proof or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TscResponse {
    One(TscProof),
    Many(Vec<TscProof>),
}

#[derive(Debug, Deserialize)]
struct WocBlock {
    merkleroot: String,
    #[serde(default)]
    height: Option<u64>,
}

impl WhatsOnChainProvider {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn parse_failure(msg: impl Into<String>) -> ProviderFailure {
        ProviderFailure::new(WHATSONCHAIN, FailureKind::Parse, msg)
    }

    /// Resolve a TSC target to a display-order Merkle root and, when the
    /// lookup reports it, the block height.
    async fn resolve_root(&self, proof: &TscProof) -> Result<(String, Option<u64>), ProviderFailure> {
        match proof.target_type.as_deref() {
            Some("merkleRoot") => Ok((proof.target.clone(), None)),
            Some("header") => {
                let header = hex::decode(&proof.target).map_err(|e| Self::parse_failure(e.to_string()))?;
                if header.len() != 80 {
                    return Err(Self::parse_failure("block header is not 80 bytes"));
                }
                let root = Hash::from_bytes(&header[36..68]).map_err(|e| Self::parse_failure(e.to_string()))?;
                Ok((root.to_string(), None))
            }
            _ => {
                let url = format!("{}/block/hash/{}", self.base_url, proof.target);
                let block: WocBlock = get_json(&self.client, WHATSONCHAIN, &url, None).await?;
                Ok((block.merkleroot, block.height))
            }
        }
    }
}

#[async_trait]
impl BlockchainDataProvider for WhatsOnChainProvider {
    fn name(&self) -> &'static str {
        WHATSONCHAIN
    }

    async fn fetch_transaction(&self, txid: &str) -> Result<TransactionRecord, ProviderFailure> {
        let url = format!("{}/tx/{}", self.base_url, txid);
        let tx: WocTransaction = get_json(&self.client, WHATSONCHAIN, &url, None).await?;

        let outputs = tx
            .vout
            .into_iter()
            .map(|o| {
                Ok(TransactionOutput {
                    n: o.n,
                    value: o.value.to_sats().map_err(Self::parse_failure)?,
                    script_hex: o.script_pub_key.hex,
                    script_type: o.script_pub_key.script_type,
                    addresses: o.script_pub_key.addresses,
                })
            })
            .collect::<Result<Vec<_>, ProviderFailure>>()?;

        Ok(TransactionRecord {
            txid: tx.txid,
            block_hash: tx.blockhash,
            block_height: tx.blockheight.unwrap_or(0),
            confirmations: tx.confirmations.unwrap_or(0),
            time: tx.time,
            inputs: tx
                .vin
                .into_iter()
                .map(|i| TransactionInput { txid: i.txid, vout: i.vout })
                .collect(),
            outputs,
        })
    }

    async fn fetch_merkle_proof(&self, txid: &str, block_height: u64) -> Result<MerkleProofRecord, ProviderFailure> {
        let url = format!("{}/tx/{}/proof/tsc", self.base_url, txid);
        let resp: TscResponse = get_json(&self.client, WHATSONCHAIN, &url, None).await?;
        let tsc = match resp {
            TscResponse::One(p) => p,
            TscResponse::Many(list) => list
                .into_iter()
                .next()
                .ok_or_else(|| ProviderFailure::new(WHATSONCHAIN, FailureKind::NotFound, "empty proof list"))?,
        };
        if let Some(ref id) = tsc.tx_or_id {
            if id.len() == 64 && !id.eq_ignore_ascii_case(txid) {
                return Err(Self::parse_failure(format!("proof is for {}", id)));
            }
        }

        let (root, height) = self.resolve_root(&tsc).await?;
        Ok(MerkleProofRecord {
            txid: txid.to_string(),
            block_height: height.unwrap_or(block_height),
            proof: MerkleProof {
                index: tsc.index,
                path: tsc.nodes,
                root,
            },
            source: WHATSONCHAIN.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_btc_amounts() {
        assert_eq!(BtcAmount::Number(0.00001).to_sats().unwrap(), 1000);
        assert_eq!(BtcAmount::Text("1.5".into()).to_sats().unwrap(), 150_000_000);
        assert_eq!(BtcAmount::Number(0.1 + 0.2).to_sats().unwrap(), 30_000_000);
        assert!(BtcAmount::Text("abc".into()).to_sats().is_err());
        assert!(BtcAmount::Number(-1.0).to_sats().is_err());
    }

    #[test]
    fn test_tsc_single_or_list() {
        let one: TscResponse =
            serde_json::from_str(r#"{"index":1,"txOrId":"ab","target":"cd","nodes":["*"]}"#).unwrap();
        assert!(matches!(one, TscResponse::One(_)));
        let many: TscResponse =
            serde_json::from_str(r#"[{"index":1,"target":"cd","nodes":[]}]"#).unwrap();
        assert!(matches!(many, TscResponse::Many(ref v) if v.len() == 1));
    }
}

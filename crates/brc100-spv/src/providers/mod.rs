//! HTTP-backed blockchain data providers.
//!
//! Each provider normalizes its own response shape into the records of
//! [`crate::provider`]. Transport, status and parse problems become typed
//! [`ProviderFailure`]s.

mod gorillapool;
mod taal;
mod whatsonchain;

pub use gorillapool::GorillaPoolProvider;
pub use taal::TaalProvider;
pub use whatsonchain::WhatsOnChainProvider;

use std::time::Duration;

use brc100_primitives::chainhash::Hash;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{FailureKind, ProviderFailure, SpvError};
use crate::merkle_path::MerklePath;
use crate::proof::MerkleProof;
use crate::provider::MerkleProofRecord;

pub const WHATSONCHAIN: &str = "whatsonchain";
pub const GORILLAPOOL: &str = "gorillapool";
pub const TAAL: &str = "taal";

/// Endpoints, credentials and fallback order of the built-in providers.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Bound on each provider call.
    pub timeout: Duration,
    pub whatsonchain_url: String,
    pub gorillapool_url: String,
    pub taal_url: String,
    pub taal_api_key: Option<String>,
    /// Provider names, tried first to last.
    pub order: Vec<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            whatsonchain_url: "https://api.whatsonchain.com/v1/bsv/main".to_string(),
            gorillapool_url: "https://api.gorillapool.io".to_string(),
            taal_url: "https://api.taal.com".to_string(),
            taal_api_key: None,
            order: vec![GORILLAPOOL.to_string(), WHATSONCHAIN.to_string(), TAAL.to_string()],
        }
    }
}

/// Build the shared HTTP client with the per-call timeout applied.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, SpvError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SpvError::MalformedInput(format!("http client: {}", e)))
}

fn transport_failure(provider: &str, e: reqwest::Error) -> ProviderFailure {
    let kind = if e.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Network
    };
    ProviderFailure::new(provider, kind, e.to_string())
}

/// GET `url` and deserialize the JSON body.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    provider: &str,
    url: &str,
    bearer: Option<&str>,
) -> Result<T, ProviderFailure> {
    let mut headers = HeaderMap::new();
    if let Some(token) = bearer {
        if let Ok(val) = HeaderValue::from_str(&format!("Bearer {}", token)) {
            headers.insert(AUTHORIZATION, val);
        }
    }

    let resp = client
        .get(url)
        .headers(headers)
        .send()
        .await
        .map_err(|e| transport_failure(provider, e))?;

    let status = resp.status();
    if status.as_u16() == 404 {
        return Err(ProviderFailure::new(provider, FailureKind::NotFound, url));
    }
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(ProviderFailure::new(provider, FailureKind::Http(status.as_u16()), message));
    }

    let text = resp.text().await.map_err(|e| transport_failure(provider, e))?;
    serde_json::from_str(&text).map_err(|e| ProviderFailure::new(provider, FailureKind::Parse, e.to_string()))
}

/// The Merkle proof body GorillaPool returns, which TAAL also uses.
/// TAAL may send a BRC-74 `bump` in place of the sibling list.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProofResponse {
    #[serde(default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub merkle_path: Option<Vec<String>>,
    #[serde(default)]
    pub merkle_root: Option<String>,
    #[serde(default)]
    pub position: Option<u64>,
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub bump: Option<String>,
}

impl ProofResponse {
    pub(crate) fn into_record(
        self,
        provider: &str,
        txid: &str,
        block_height: u64,
    ) -> Result<MerkleProofRecord, ProviderFailure> {
        let parse = |msg: String| ProviderFailure::new(provider, FailureKind::Parse, msg);

        if let Some(ref reported) = self.txid {
            if !reported.eq_ignore_ascii_case(txid) {
                return Err(parse(format!("proof is for {}", reported)));
            }
        }
        let root = self.merkle_root.ok_or_else(|| parse("missing merkle_root".into()))?;

        let proof = match (self.merkle_path, self.position, self.bump) {
            (Some(path), Some(index), _) => MerkleProof { index, path, root },
            (_, _, Some(bump)) => {
                let bump = MerklePath::from_hex(&bump).map_err(|e| parse(e.to_string()))?;
                let hash = Hash::from_hex(txid).map_err(|e| parse(e.to_string()))?;
                MerkleProof::from_bump(&bump, &hash, &root).map_err(|e| parse(e.to_string()))?
            }
            _ => return Err(parse("response has neither a merkle path nor a bump".into())),
        };

        Ok(MerkleProofRecord {
            txid: txid.to_string(),
            block_height: self.block_height.unwrap_or(block_height),
            proof,
            source: provider.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order() {
        let cfg = ProviderConfig::default();
        assert_eq!(cfg.order, vec!["gorillapool", "whatsonchain", "taal"]);
        assert_eq!(cfg.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_proof_response_requires_root() {
        let resp = ProofResponse {
            merkle_path: Some(vec![]),
            position: Some(0),
            ..Default::default()
        };
        let err = resp.into_record("gorillapool", &"ab".repeat(32), 1).unwrap_err();
        assert_eq!(err.kind, FailureKind::Parse);
    }

    #[test]
    fn test_proof_response_for_other_txid() {
        let resp = ProofResponse {
            txid: Some("cd".repeat(32)),
            merkle_root: Some("00".repeat(32)),
            merkle_path: Some(vec![]),
            position: Some(0),
            ..Default::default()
        };
        assert!(resp.into_record("taal", &"ab".repeat(32), 1).is_err());
    }
}

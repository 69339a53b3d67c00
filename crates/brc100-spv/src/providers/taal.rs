use async_trait::async_trait;

use super::{get_json, ProofResponse, TAAL};
use crate::error::ProviderFailure;
use crate::provider::{BlockchainDataProvider, MerkleProofRecord};

/// TAAL Merkle proof API, optionally authenticated with a bearer key.
#[derive(Clone)]
pub struct TaalProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for TaalProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaalProvider")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl TaalProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }
}

#[async_trait]
impl BlockchainDataProvider for TaalProvider {
    fn name(&self) -> &'static str {
        TAAL
    }

    async fn fetch_merkle_proof(&self, txid: &str, block_height: u64) -> Result<MerkleProofRecord, ProviderFailure> {
        let url = format!("{}/v1/merkle-proof/{}", self.base_url, txid);
        let resp: ProofResponse = get_json(&self.client, TAAL, &url, self.api_key.as_deref()).await?;
        resp.into_record(TAAL, txid, block_height)
    }
}

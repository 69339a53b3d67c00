use async_trait::async_trait;

use super::{get_json, ProofResponse, GORILLAPOOL};
use crate::error::ProviderFailure;
use crate::provider::{BlockchainDataProvider, MerkleProofRecord};

/// GorillaPool Merkle proof service. Offers no transaction lookup.
#[derive(Debug, Clone)]
pub struct GorillaPoolProvider {
    base_url: String,
    client: reqwest::Client,
}

impl GorillaPoolProvider {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl BlockchainDataProvider for GorillaPoolProvider {
    fn name(&self) -> &'static str {
        GORILLAPOOL
    }

    async fn fetch_merkle_proof(&self, txid: &str, block_height: u64) -> Result<MerkleProofRecord, ProviderFailure> {
        let url = format!("{}/merkle-proof/{}/{}", self.base_url, txid, block_height);
        let resp: ProofResponse = get_json(&self.client, GORILLAPOOL, &url, None).await?;
        resp.into_record(GORILLAPOOL, txid, block_height)
    }
}

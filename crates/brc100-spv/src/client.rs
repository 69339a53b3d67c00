//! Ordered-fallback client over several blockchain data providers.
//!
//! Providers are tried one after another, never in parallel. Each call is
//! bounded by the configured timeout and a timed-out call counts as an
//! ordinary failure. Only when every provider has failed does the client
//! report an error, carrying each provider's reason.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{FailureKind, ProviderFailure, SpvError};
use crate::provider::{BlockchainDataProvider, MerkleProofRecord, TransactionRecord};
use crate::providers::{
    http_client, GorillaPoolProvider, ProviderConfig, TaalProvider, WhatsOnChainProvider, GORILLAPOOL, TAAL,
    WHATSONCHAIN,
};

/// Configuration for [`BlockchainDataClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bound on each provider call.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

/// Per-provider call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProviderStats {
    pub attempts: u64,
    pub failures: u64,
}

pub struct BlockchainDataClient {
    providers: Vec<Arc<dyn BlockchainDataProvider>>,
    config: ClientConfig,
    stats: Mutex<BTreeMap<&'static str, ProviderStats>>,
}

impl BlockchainDataClient {
    pub fn new(providers: Vec<Arc<dyn BlockchainDataProvider>>, config: ClientConfig) -> Self {
        Self {
            providers,
            config,
            stats: Mutex::new(BTreeMap::new()),
        }
    }

    /// Build the built-in HTTP providers in the configured order.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, SpvError> {
        let http = http_client(config.timeout)?;
        let mut providers: Vec<Arc<dyn BlockchainDataProvider>> = Vec::with_capacity(config.order.len());
        for name in &config.order {
            let provider: Arc<dyn BlockchainDataProvider> = match name.as_str() {
                WHATSONCHAIN => Arc::new(WhatsOnChainProvider::new(&config.whatsonchain_url, http.clone())),
                GORILLAPOOL => Arc::new(GorillaPoolProvider::new(&config.gorillapool_url, http.clone())),
                TAAL => Arc::new(TaalProvider::new(&config.taal_url, config.taal_api_key.clone(), http.clone())),
                other => return Err(SpvError::MalformedInput(format!("unknown provider: {}", other))),
            };
            providers.push(provider);
        }
        Ok(Self::new(providers, ClientConfig { timeout: config.timeout }))
    }

    /// Provider names in fallback order.
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn stats(&self) -> BTreeMap<String, ProviderStats> {
        let stats = self.stats.lock().unwrap_or_else(|p| p.into_inner());
        stats.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    pub async fn fetch_transaction(&self, txid: &str) -> Result<TransactionRecord, SpvError> {
        let owned = txid.to_string();
        self.with_fallback("transaction", txid, |p| {
            let txid = owned.clone();
            async move { p.fetch_transaction(&txid).await }
        })
        .await
        .map_err(|failures| {
            if all_timed_out(&failures) {
                SpvError::ProviderTimeout { txid: txid.to_string(), failures }
            } else {
                SpvError::TransactionUnavailable { txid: txid.to_string(), failures }
            }
        })
    }

    pub async fn fetch_merkle_proof(&self, txid: &str, block_height: u64) -> Result<MerkleProofRecord, SpvError> {
        let owned = txid.to_string();
        self.with_fallback("merkle proof", txid, |p| {
            let txid = owned.clone();
            async move { p.fetch_merkle_proof(&txid, block_height).await }
        })
        .await
        .map_err(|failures| {
            if all_timed_out(&failures) {
                SpvError::ProviderTimeout { txid: txid.to_string(), failures }
            } else {
                SpvError::ProofUnavailable { txid: txid.to_string(), failures }
            }
        })
    }

    async fn with_fallback<T, F, Fut>(&self, what: &'static str, txid: &str, call: F) -> Result<T, Vec<ProviderFailure>>
    where
        F: Fn(Arc<dyn BlockchainDataProvider>) -> Fut,
        Fut: Future<Output = Result<T, ProviderFailure>>,
    {
        let mut failures = Vec::new();
        for provider in &self.providers {
            let name = provider.name();
            let outcome = match tokio::time::timeout(self.config.timeout, call(Arc::clone(provider))).await {
                Ok(result) => result,
                Err(_) => Err(ProviderFailure::timeout(name, self.config.timeout)),
            };

            match outcome {
                Ok(value) => {
                    self.record(name, false);
                    debug!(provider = name, txid, what, "provider answered");
                    return Ok(value);
                }
                Err(failure) if failure.kind == FailureKind::Unsupported => {
                    debug!(provider = name, txid, what, "provider does not support lookup");
                    failures.push(failure);
                }
                Err(failure) => {
                    self.record(name, true);
                    warn!(provider = name, txid, what, reason = %failure, "provider failed, trying next");
                    failures.push(failure);
                }
            }
        }
        warn!(txid, what, providers = self.providers.len(), "all blockchain data providers failed");
        Err(failures)
    }

    fn record(&self, provider: &'static str, failed: bool) {
        let mut stats = self.stats.lock().unwrap_or_else(|p| p.into_inner());
        let entry = stats.entry(provider).or_default();
        entry.attempts += 1;
        if failed {
            entry.failures += 1;
        }
    }
}

// Unsupported lookups were never attempted, so they do not count.
fn all_timed_out(failures: &[ProviderFailure]) -> bool {
    let mut attempted = failures.iter().filter(|f| f.kind != FailureKind::Unsupported).peekable();
    attempted.peek().is_some() && attempted.all(|f| f.kind == FailureKind::Timeout)
}

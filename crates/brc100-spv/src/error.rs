use std::fmt;
use std::time::Duration;

/// Why a single provider call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The call did not finish within the configured timeout.
    Timeout,
    /// The provider answered with a non-success status.
    Http(u16),
    /// The request could not be sent or the body could not be read.
    Network,
    /// The body did not have the expected shape.
    Parse,
    /// The provider does not know the transaction.
    NotFound,
    /// The provider does not offer this lookup.
    Unsupported,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Http(status) => write!(f, "HTTP {}", status),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Parse => write!(f, "unparsable response"),
            FailureKind::NotFound => write!(f, "not found"),
            FailureKind::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// A failed call to one blockchain data provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{provider}: {kind}: {message}")]
pub struct ProviderFailure {
    pub provider: String,
    pub kind: FailureKind,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(provider: &str, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(provider: &str, after: Duration) -> Self {
        Self::new(provider, FailureKind::Timeout, format!("no answer after {:?}", after))
    }

    pub fn unsupported(provider: &str, what: &str) -> Self {
        Self::new(provider, FailureKind::Unsupported, what)
    }
}

fn summarize(failures: &[ProviderFailure]) -> String {
    if failures.is_empty() {
        return "no providers configured".to_string();
    }
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Error types for SPV operations.
#[derive(Debug, thiserror::Error)]
pub enum SpvError {
    /// The transaction has no confirmations or no block height.
    #[error("transaction {txid} is not confirmed")]
    NotConfirmed { txid: String },

    /// The Merkle path does not lead to the committed root.
    #[error("merkle proof invalid: {0}")]
    MerkleProofInvalid(String),

    /// Every provider failed to return a Merkle proof.
    #[error("merkle proof unavailable for {txid}: {}", summarize(.failures))]
    ProofUnavailable {
        txid: String,
        failures: Vec<ProviderFailure>,
    },

    /// Every provider failed to return the transaction.
    #[error("transaction {txid} unavailable: {}", summarize(.failures))]
    TransactionUnavailable {
        txid: String,
        failures: Vec<ProviderFailure>,
    },

    /// Every provider that was tried timed out.
    #[error("all providers timed out for {txid}: {}", summarize(.failures))]
    ProviderTimeout {
        txid: String,
        failures: Vec<ProviderFailure>,
    },

    /// Identity data lacks required fields.
    #[error("identity data missing fields: {0:?}")]
    IncompleteIdentityData(Vec<String>),

    /// The proof timestamp is in the future or too old.
    #[error("stale proof: {0}")]
    StaleProof(String),

    /// Some proofs in a batch failed. Indices refer to the input order.
    #[error("{} of {total} proofs failed verification", .failures.len())]
    BatchFailed {
        total: usize,
        failures: Vec<(usize, SpvError)>,
    },

    /// A BRC-74 Merkle path could not be parsed or walked.
    #[error("invalid merkle path: {0}")]
    InvalidMerklePath(String),

    /// A request field failed format validation.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("primitives error: {0}")]
    Primitives(#[from] brc100_primitives::PrimitivesError),

    #[error("hex error: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl SpvError {
    /// Whether the same request may succeed later.
    ///
    /// Provider outages are transient; proof and data failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            SpvError::ProofUnavailable { .. }
            | SpvError::TransactionUnavailable { .. }
            | SpvError::ProviderTimeout { .. } => true,
            SpvError::BatchFailed { failures, .. } => failures.iter().any(|(_, e)| e.is_retryable()),
            _ => false,
        }
    }
}

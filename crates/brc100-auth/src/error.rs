use brc100_wallet::WalletError;

/// Error types for authentication operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The referenced challenge, session or nonce does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The referenced record is past its expiry.
    #[error("{0} expired")]
    Expired(String),

    /// The challenge has already been solved once.
    #[error("challenge already solved")]
    AlreadySolved,

    /// A challenge response is empty or does not answer the challenge.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A request field failed format validation.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The signature on a message, response or certificate failed verification.
    #[error("invalid signature")]
    SignatureInvalid,

    /// Authenticated decryption failed (tag mismatch or truncated input).
    #[error("decryption failed")]
    DecryptionFailed,

    /// A peer message is older than the allowed age.
    #[error("message too old: {age_secs}s old, limit {max_secs}s")]
    MessageTooOld { age_secs: i64, max_secs: i64 },

    /// The nonce is malformed, unknown, expired or already consumed.
    #[error("invalid nonce: {0}")]
    InvalidNonce(String),

    /// The wallet could not produce a signature.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// The certificate has been revoked.
    #[error("certificate revoked")]
    RevokedCertificate,

    /// The certificate is missing a required field.
    #[error("incomplete certificate: {0}")]
    IncompleteCertificate(String),

    /// A disclosure did not contain exactly the requested fields.
    #[error("disclosure mismatch: missing {missing:?}, extra {extra:?}")]
    DisclosureMismatch {
        missing: Vec<String>,
        extra: Vec<String>,
    },

    /// An error from the wallet layer.
    #[error("wallet error: {0}")]
    Wallet(#[from] WalletError),

    /// An error from the primitives layer.
    #[error("primitives error: {0}")]
    Primitives(#[from] brc100_primitives::PrimitivesError),

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Hex decoding error.
    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    /// JSON serialization or deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An internal lock was poisoned.
    #[error("internal lock error: {0}")]
    LockError(String),
}

impl AuthError {
    /// Whether repeating the same request later may succeed.
    ///
    /// Only internal contention is transient; every validation and
    /// cryptographic failure is final for the given input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuthError::LockError(_) | AuthError::Wallet(WalletError::LockError(_))
        )
    }
}

pub(crate) fn poisoned<T>(_: T) -> AuthError {
    AuthError::LockError("lock poisoned".into())
}

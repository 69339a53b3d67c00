use brc100_auth::AuthError;
use brc100_spv::SpvError;
use brc100_wallet::WalletError;

/// Errors surfaced by the wallet daemon and its service facade.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// A challenge, session, handshake, key or certificate operation failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// An SPV proof could not be built or verified.
    #[error(transparent)]
    Spv(#[from] SpvError),

    /// The wallet key service failed.
    #[error(transparent)]
    Wallet(#[from] WalletError),

    /// A request or configuration value is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Reading or writing persisted state failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("hex error: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl ServiceError {
    /// Whether the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Auth(e) => e.is_retryable(),
            ServiceError::Spv(e) => e.is_retryable(),
            ServiceError::Wallet(WalletError::LockError(_)) => true,
            _ => false,
        }
    }
}

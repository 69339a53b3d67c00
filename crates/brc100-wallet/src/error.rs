/// Error types for wallet key-service operations.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("wallet error: {0}")]
    General(String),
    #[error("primitives error: {0}")]
    Primitives(#[from] brc100_primitives::PrimitivesError),
    #[error("no addresses generated")]
    NoAddresses,
    #[error("no key for address: {0}")]
    KeyNotFound(String),
    #[error("internal lock error: {0}")]
    LockError(String),
}

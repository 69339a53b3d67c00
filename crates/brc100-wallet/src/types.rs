//! Types exchanged with the wallet key service.

use serde::{Deserialize, Serialize};

/// An address owned by the wallet together with its public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInfo {
    /// Base58Check P2PKH address.
    pub address: String,
    /// Compressed public key, hex.
    pub public_key: String,
}

/// Opaque reference to private key material held by the wallet.
///
/// The engine never sees the key itself; it passes the handle back to
/// [`crate::WalletKeyService::sign`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyHandle(String);

impl KeyHandle {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        KeyHandle(id.into())
    }

    pub(crate) fn id(&self) -> &str {
        &self.0
    }
}

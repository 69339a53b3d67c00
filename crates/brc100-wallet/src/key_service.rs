//! The wallet key-service interface.

use brc100_primitives::ec::{PublicKey, Signature};

use crate::error::WalletError;
use crate::types::{AddressInfo, KeyHandle};

/// Signing capability offered by the wallet.
///
/// Implementations must be safe to share across request handlers.
pub trait WalletKeyService: Send + Sync {
    /// The address currently in use, with its public key.
    fn current_address(&self) -> Result<AddressInfo, WalletError>;

    /// Resolve an address to a handle for its private key material.
    fn key_handle(&self, address: &str) -> Result<KeyHandle, WalletError>;

    /// Sign `data` with the key behind `handle`: ECDSA over SHA-256(data).
    fn sign(&self, data: &[u8], handle: &KeyHandle) -> Result<Signature, WalletError>;

    /// The long-lived identity key of the wallet.
    fn identity_key(&self) -> Result<PublicKey, WalletError>;

    /// Sign `data` with the key of the current address.
    fn sign_with_current(&self, data: &[u8]) -> Result<(AddressInfo, Signature), WalletError> {
        let info = self.current_address()?;
        let handle = self.key_handle(&info.address)?;
        let sig = self.sign(data, &handle)?;
        Ok((info, sig))
    }
}

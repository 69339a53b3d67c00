//! In-memory key service backed by secp256k1 private keys.

use std::collections::HashMap;
use std::sync::RwLock;

use brc100_primitives::ec::{PrivateKey, PublicKey, Signature};

use crate::error::WalletError;
use crate::key_service::WalletKeyService;
use crate::types::{AddressInfo, KeyHandle};

/// A key service holding its keys in process memory.
///
/// The first key is the identity key. The most recently added key is the
/// current address, matching how an HD wallet hands out fresh addresses.
pub struct LocalKeyService {
    identity: PublicKey,
    addresses: RwLock<Vec<AddressInfo>>,
    keys: RwLock<HashMap<String, PrivateKey>>,
}

impl LocalKeyService {
    /// Create a key service whose identity (and first address) is `identity_key`.
    pub fn new(identity_key: PrivateKey) -> Self {
        let service = LocalKeyService {
            identity: identity_key.pub_key(),
            addresses: RwLock::new(Vec::new()),
            keys: RwLock::new(HashMap::new()),
        };
        service.insert(identity_key);
        service
    }

    /// Create a key service with a freshly generated identity key.
    pub fn random() -> Self {
        Self::new(PrivateKey::new())
    }

    /// Add a key; its address becomes the current address.
    pub fn add_key(&self, key: PrivateKey) -> Result<AddressInfo, WalletError> {
        let info = Self::address_info(&key);
        self.keys
            .write()
            .map_err(|_| WalletError::LockError("lock poisoned".into()))?
            .insert(info.address.clone(), key);
        self.addresses
            .write()
            .map_err(|_| WalletError::LockError("lock poisoned".into()))?
            .push(info.clone());
        Ok(info)
    }

    // Construction-time insert; the locks cannot be poisoned yet.
    fn insert(&self, key: PrivateKey) {
        let info = Self::address_info(&key);
        if let (Ok(mut keys), Ok(mut addresses)) = (self.keys.write(), self.addresses.write()) {
            keys.insert(info.address.clone(), key);
            addresses.push(info);
        }
    }

    fn address_info(key: &PrivateKey) -> AddressInfo {
        let pub_key = key.pub_key();
        AddressInfo {
            address: pub_key.to_address(),
            public_key: pub_key.to_hex(),
        }
    }
}

impl WalletKeyService for LocalKeyService {
    fn current_address(&self) -> Result<AddressInfo, WalletError> {
        let addresses = self
            .addresses
            .read()
            .map_err(|_| WalletError::LockError("lock poisoned".into()))?;
        addresses.last().cloned().ok_or(WalletError::NoAddresses)
    }

    fn key_handle(&self, address: &str) -> Result<KeyHandle, WalletError> {
        let keys = self
            .keys
            .read()
            .map_err(|_| WalletError::LockError("lock poisoned".into()))?;
        if keys.contains_key(address) {
            Ok(KeyHandle::new(address))
        } else {
            Err(WalletError::KeyNotFound(address.to_string()))
        }
    }

    fn sign(&self, data: &[u8], handle: &KeyHandle) -> Result<Signature, WalletError> {
        let keys = self
            .keys
            .read()
            .map_err(|_| WalletError::LockError("lock poisoned".into()))?;
        let key = keys
            .get(handle.id())
            .ok_or_else(|| WalletError::KeyNotFound(handle.id().to_string()))?;
        Ok(key.sign_message(data)?)
    }

    fn identity_key(&self) -> Result<PublicKey, WalletError> {
        Ok(self.identity.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_first_key_and_current_is_last() {
        let identity = PrivateKey::new();
        let service = LocalKeyService::new(identity.clone());
        assert_eq!(service.identity_key().unwrap(), identity.pub_key());
        assert_eq!(
            service.current_address().unwrap().public_key,
            identity.pub_key().to_hex()
        );

        let second = PrivateKey::new();
        let info = service.add_key(second.clone()).unwrap();
        assert_eq!(service.current_address().unwrap(), info);
        // Identity does not rotate with addresses.
        assert_eq!(service.identity_key().unwrap(), identity.pub_key());
    }

    #[test]
    fn test_unknown_address_has_no_handle() {
        let service = LocalKeyService::random();
        assert!(matches!(
            service.key_handle("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"),
            Err(WalletError::KeyNotFound(_))
        ));
    }
}

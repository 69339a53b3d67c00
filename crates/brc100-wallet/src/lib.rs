/// BRC-100 wallet engine - wallet key service.
///
/// HD key management lives outside the engine. This crate defines the
/// narrow interface the engine consumes (current address, key handle,
/// sign) and a local in-memory implementation.

mod error;
pub use error::WalletError;

pub mod types;
pub mod key_service;
pub mod local;

pub use key_service::WalletKeyService;
pub use local::LocalKeyService;
pub use types::{AddressInfo, KeyHandle};

/// Elliptic curve cryptography on secp256k1, plus the AES-GCM symmetric key.
///
/// Provides private keys, public keys, DER ECDSA signatures, ECDH shared
/// points, and authenticated symmetric encryption.

pub mod private_key;
pub mod public_key;
pub mod signature;
pub mod symmetric;

pub use private_key::PrivateKey;
pub use public_key::PublicKey;
pub use signature::Signature;
pub use symmetric::SymmetricKey;

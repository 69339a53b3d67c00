//! BRC-100 wallet engine - cryptographic primitives.
//!
//! This crate provides the building blocks shared by the rest of the engine:
//! - Hash functions (SHA-256, SHA-256d, Hash160, HMAC-SHA256) and
//!   constant-time comparison
//! - Chain hash type for transaction and block identification
//! - secp256k1 keys and DER-encoded ECDSA signatures
//! - AES-256-GCM authenticated encryption
//! - Variable-length integer encoding for canonical serialization

pub mod hash;
pub mod chainhash;
pub mod util;
pub mod ec;

mod error;
pub use error::PrimitivesError;

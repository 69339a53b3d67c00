//! BRC-100 wallet engine - SPV identity proofs.
//!
//! Anchors identity claims to mined transactions:
//! - Merkle tree parents, BRC-74 paths and sibling-path inclusion proofs
//! - Blockchain data providers (WhatsOnChain, GorillaPool, TAAL) behind
//!   one async trait
//! - An ordered-fallback client with per-call timeouts
//! - The verifier that builds, checks and batch-checks identity proofs

pub mod error;
pub mod merkle_tree_parent;
pub mod merkle_path;
pub mod proof;
pub mod provider;
pub mod providers;
pub mod client;
pub mod verifier;

pub use error::{FailureKind, ProviderFailure, SpvError};
pub use merkle_path::{MerklePath, PathElement};
pub use merkle_tree_parent::{merkle_tree_parent, merkle_tree_parent_str};
pub use proof::{IdentityProof, MerkleProof, DUPLICATE_MARKER};
pub use provider::{BlockchainDataProvider, MerkleProofRecord, TransactionOutput, TransactionRecord};
pub use providers::ProviderConfig;
pub use client::{BlockchainDataClient, ClientConfig, ProviderStats};
pub use verifier::{SpvVerifier, VerifierConfig};

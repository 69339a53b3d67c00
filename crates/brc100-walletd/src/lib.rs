//! BRC-100 wallet daemon library.
//!
//! [`Brc100Service`] is the composition root: it wires the challenge and
//! session stores, the Type-42 deriver, the handshake controller, the
//! certificate authority and the SPV verifier behind one facade whose
//! operations answer with [`ApiResponse`] envelopes.

pub mod api;
pub mod config;
pub mod error;
pub mod persistence;
pub mod service;

pub use api::{cors_preflight, ApiResponse, PreflightResponse};
pub use config::WalletdConfig;
pub use error::ServiceError;
pub use persistence::{JsonFileStateStore, MemoryStateStore, StateSnapshot, StateStore, SNAPSHOT_VERSION};
pub use service::{Brc100Service, PeerAuthenticated};

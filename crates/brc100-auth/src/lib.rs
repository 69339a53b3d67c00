//! BRC-100 wallet engine - identity and authentication.
//!
//! One-time challenges, application sessions with background expiry,
//! Type-42 per-relationship keys, the BRC-104 mutual handshake, and
//! self-issued identity certificates with selective disclosure.

pub mod brc104;
pub mod certificates;
pub mod challenge;
pub mod error;
pub mod handshake;
pub mod session;
pub mod sweeper;
pub mod type42;
pub mod utils;

pub use certificates::{AuthorityConfig, CertificateAuthority, IdentityCertificate};
pub use challenge::{Challenge, ChallengeResponse, ChallengeStore, ChallengeStoreConfig};
pub use error::AuthError;
pub use handshake::{HandshakeConfig, HandshakeController, InitialRequest, InitialResponse, VerifyRequest};
pub use session::{NewSession, Session, SessionStore, SessionStoreConfig};
pub use sweeper::{spawn_sweeper, Sweep};
pub use type42::{P2PMessage, Type42Config, Type42Deriver, Type42Keys};

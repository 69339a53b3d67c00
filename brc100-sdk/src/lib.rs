#![deny(missing_docs)]

//! BRC-100 wallet engine - complete SDK.
//!
//! Re-exports the engine crates for single-crate usage.

pub use brc100_primitives as primitives;
pub use brc100_wallet as wallet;
pub use brc100_auth as auth;
pub use brc100_spv as spv;

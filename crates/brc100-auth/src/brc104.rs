//! BRC-104 protocol constants for the mutual handshake over HTTP.

/// Auth protocol version carried in handshake messages.
pub const AUTH_VERSION: &str = "0.1";
/// Message type of this party's synchronous reply.
pub const MESSAGE_TYPE_INITIAL_RESPONSE: &str = "initialResponse";

/// HTTP header for the auth protocol version.
pub const HEADER_VERSION: &str = "x-bsv-auth-version";
/// HTTP header for the auth message type.
pub const HEADER_MESSAGE_TYPE: &str = "x-bsv-auth-message-type";
/// HTTP header for the sender's identity public key.
pub const HEADER_IDENTITY_KEY: &str = "x-bsv-auth-identity-key";
/// HTTP header for the sender's nonce.
pub const HEADER_NONCE: &str = "x-bsv-auth-nonce";
/// HTTP header echoing back the recipient's nonce.
pub const HEADER_YOUR_NONCE: &str = "x-bsv-auth-your-nonce";
/// HTTP header for the digital signature.
pub const HEADER_SIGNATURE: &str = "x-bsv-auth-signature";

/// Decoded length in bytes of the nonces this party issues.
pub const NONCE_LENGTH: usize = 32;

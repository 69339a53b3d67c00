//! Identity certificates: issuance, validation and selective disclosure.

mod authority;
mod certificate;
pub mod disclosure;
pub mod validation;

pub use authority::*;
pub use certificate::*;
pub use disclosure::{
    apply_field_mask, create_field_mask, decrypt_selective, disclose, disclose_certified,
    disclosure_key, encrypt_selective, validate_disclosure, EncryptedDisclosure, FieldMask,
};
pub use validation::{
    validate_certificate, validate_disclosure_request, validate_identity_context,
    DisclosureRequest, ExpiryStatus, IdentityContext,
};

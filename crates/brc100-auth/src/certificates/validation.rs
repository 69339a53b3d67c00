//! Certificate and disclosure-request validation.
//!
//! The four certificate checks are independent so that callers can run any
//! one of them. [`validate_certificate`] runs all four and stops at the first
//! failure.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::certificate::IdentityCertificate;
use crate::error::AuthError;
use crate::session::validate_session_id;

const DOMAIN_PATTERN: &str = r"^[a-zA-Z0-9][a-zA-Z0-9-]{1,61}[a-zA-Z0-9]?\.[a-zA-Z]{2,}$";
const FIELD_PATTERN: &str = r"^[a-zA-Z][a-zA-Z0-9_]*$";

static DOMAIN_RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
static FIELD_RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
const MAX_CONTEXT_SKEW_SECS: i64 = 5 * 60;

/// Remaining validity of a certificate that passed the expiration check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryStatus {
    pub days_remaining: i64,
    pub expiring_soon: bool,
}

/// Every required field is present and `expires_at > timestamp`.
pub fn check_structure(cert: &IdentityCertificate) -> Result<(), AuthError> {
    let required = [
        ("version", &cert.version),
        ("issuer", &cert.issuer),
        ("subject", &cert.subject),
        ("publicKey", &cert.public_key),
        ("signature", &cert.signature),
    ];
    if let Some((name, _)) = required.iter().find(|(_, v)| v.is_empty()) {
        return Err(AuthError::IncompleteCertificate(format!("{} is missing", name)));
    }
    if cert.expires_at <= cert.timestamp {
        return Err(AuthError::IncompleteCertificate(
            "expiry is not after issuance".into(),
        ));
    }
    Ok(())
}

/// The signature matches the certificate contents and public key.
pub fn check_signature(cert: &IdentityCertificate) -> Result<(), AuthError> {
    cert.verify_signature()
}

/// `now` is before expiry. Warns when fewer than `warning_days` remain.
pub fn check_expiration(
    cert: &IdentityCertificate,
    now: DateTime<Utc>,
    warning_days: i64,
) -> Result<ExpiryStatus, AuthError> {
    if now >= cert.expires_at {
        return Err(AuthError::Expired("certificate".into()));
    }
    let days_remaining = (cert.expires_at - now).num_days();
    let expiring_soon = days_remaining < warning_days;
    if expiring_soon {
        warn!(subject = %cert.subject, days_remaining, "identity certificate expires soon");
    }
    Ok(ExpiryStatus {
        days_remaining,
        expiring_soon,
    })
}

/// The certificate has not been revoked.
pub fn check_revocation(cert: &IdentityCertificate) -> Result<(), AuthError> {
    if cert.revoked {
        return Err(AuthError::RevokedCertificate);
    }
    Ok(())
}

/// Structure, signature, expiration and revocation, in that order.
pub fn validate_certificate(
    cert: &IdentityCertificate,
    now: DateTime<Utc>,
    warning_days: i64,
) -> Result<ExpiryStatus, AuthError> {
    check_structure(cert)?;
    check_signature(cert)?;
    let status = check_expiration(cert, now, warning_days)?;
    check_revocation(cert)?;
    Ok(status)
}

/// An application's request to see some identity fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisclosureRequest {
    pub requested_fields: BTreeSet<String>,
    pub app_domain: String,
    pub purpose: String,
}

pub fn validate_disclosure_request(req: &DisclosureRequest) -> Result<(), AuthError> {
    let domain = compiled(&DOMAIN_RE, DOMAIN_PATTERN)?;
    if !domain.is_match(&req.app_domain) {
        return Err(AuthError::MalformedInput(format!(
            "invalid app domain: {}",
            req.app_domain
        )));
    }
    if req.purpose.trim().is_empty() {
        return Err(AuthError::MalformedInput("purpose is required".into()));
    }
    if req.requested_fields.is_empty() {
        return Err(AuthError::MalformedInput("no fields requested".into()));
    }
    let field = compiled(&FIELD_RE, FIELD_PATTERN)?;
    if let Some(bad) = req.requested_fields.iter().find(|f| !field.is_match(f)) {
        return Err(AuthError::MalformedInput(format!("invalid field name: {}", bad)));
    }
    Ok(())
}

/// The session and time an identity operation claims to run under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityContext {
    pub session_id: String,
    pub app_domain: String,
    pub timestamp: DateTime<Utc>,
}

pub fn validate_identity_context(ctx: &IdentityContext, now: DateTime<Utc>) -> Result<(), AuthError> {
    if !validate_session_id(&ctx.session_id) {
        return Err(AuthError::MalformedInput("invalid session id".into()));
    }
    if ctx.app_domain.trim().is_empty() {
        return Err(AuthError::MalformedInput("app domain is empty".into()));
    }
    if ctx.timestamp - now > chrono::Duration::seconds(MAX_CONTEXT_SKEW_SECS) {
        return Err(AuthError::MalformedInput("timestamp is in the future".into()));
    }
    Ok(())
}

/// Compiled once per process; later calls reuse the cached result.
fn compiled(
    cell: &'static OnceLock<Result<Regex, regex::Error>>,
    pattern: &str,
) -> Result<&'static Regex, AuthError> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|e| AuthError::MalformedInput(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(domain: &str, fields: &[&str]) -> DisclosureRequest {
        DisclosureRequest {
            requested_fields: fields.iter().map(|s| s.to_string()).collect(),
            app_domain: domain.into(),
            purpose: "login".into(),
        }
    }

    #[test]
    fn test_domain_pattern() {
        assert!(validate_disclosure_request(&request("example.com", &["email"])).is_ok());
        assert!(validate_disclosure_request(&request("my-app.io", &["email"])).is_ok());
        assert!(validate_disclosure_request(&request("localhost", &["email"])).is_err());
        assert!(validate_disclosure_request(&request("-bad.com", &["email"])).is_err());
    }

    #[test]
    fn test_patterns_compiled_once() {
        let first = compiled(&DOMAIN_RE, DOMAIN_PATTERN).unwrap();
        let second = compiled(&DOMAIN_RE, DOMAIN_PATTERN).unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(!std::ptr::eq(first, compiled(&FIELD_RE, FIELD_PATTERN).unwrap()));
    }

    #[test]
    fn test_field_names_and_purpose() {
        assert!(validate_disclosure_request(&request("example.com", &[])).is_err());
        assert!(validate_disclosure_request(&request("example.com", &["1st"])).is_err());
        assert!(validate_disclosure_request(&request("example.com", &["first_name2"])).is_ok());
        let mut r = request("example.com", &["email"]);
        r.purpose = " ".into();
        assert!(validate_disclosure_request(&r).is_err());
    }

    #[test]
    fn test_identity_context() {
        let now = Utc::now();
        let mut ctx = IdentityContext {
            session_id: "0123456789abcdef".into(),
            app_domain: "example.com".into(),
            timestamp: now,
        };
        assert!(validate_identity_context(&ctx, now).is_ok());
        ctx.timestamp = now + chrono::Duration::minutes(6);
        assert!(validate_identity_context(&ctx, now).is_err());
        ctx.timestamp = now;
        ctx.session_id = "short".into();
        assert!(validate_identity_context(&ctx, now).is_err());
    }
}

//! The wallet's self-issuing certificate authority.

use std::collections::BTreeMap;
use std::sync::Arc;

use brc100_wallet::WalletKeyService;
use chrono::{DateTime, Utc};
use tracing::info;

use super::certificate::{
    IdentityCertificate, CERTIFICATE_VERSION, DEFAULT_ISSUER, DEFAULT_VALIDITY_DAYS, DISCLOSED,
    HIDDEN,
};
use super::validation::{validate_certificate, ExpiryStatus};
use crate::error::AuthError;

/// Certificate authority settings.
#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    pub issuer: String,
    pub validity_days: i64,
    /// Certificates closer than this to expiry are logged as expiring.
    pub expiry_warning_days: i64,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            validity_days: DEFAULT_VALIDITY_DAYS,
            expiry_warning_days: 30,
        }
    }
}

/// Issues and signs identity certificates with the wallet's identity key.
pub struct CertificateAuthority {
    wallet: Arc<dyn WalletKeyService>,
    config: AuthorityConfig,
}

impl CertificateAuthority {
    pub fn new(wallet: Arc<dyn WalletKeyService>, config: AuthorityConfig) -> Self {
        Self { wallet, config }
    }

    /// Build an unsigned certificate marking each field disclosed or hidden.
    pub fn issue(
        &self,
        subject: &str,
        disclosure_prefs: &BTreeMap<String, bool>,
    ) -> Result<IdentityCertificate, AuthError> {
        if subject.trim().is_empty() {
            return Err(AuthError::MalformedInput("subject is empty".into()));
        }
        let now = Utc::now();
        Ok(IdentityCertificate {
            version: CERTIFICATE_VERSION.to_string(),
            issuer: self.config.issuer.clone(),
            subject: subject.to_string(),
            public_key: String::new(),
            selective_data: disclosure_prefs
                .iter()
                .map(|(field, &shown)| {
                    let marker = if shown { DISCLOSED } else { HIDDEN };
                    (field.clone(), marker.to_string())
                })
                .collect(),
            signature: String::new(),
            timestamp: now,
            expires_at: now + chrono::Duration::days(self.config.validity_days),
            revoked: false,
        })
    }

    /// Sign `cert` with the wallet identity key, replacing any prior signature.
    pub fn sign(&self, cert: &mut IdentityCertificate) -> Result<(), AuthError> {
        let identity = self
            .wallet
            .identity_key()
            .map_err(|e| AuthError::SigningFailed(e.to_string()))?;
        cert.public_key = identity.to_hex();
        let data = cert.to_binary(false);
        let sig = self
            .wallet
            .key_handle(&identity.to_address())
            .and_then(|handle| self.wallet.sign(&data, &handle))
            .map_err(|e| AuthError::SigningFailed(e.to_string()))?;
        cert.signature = sig.to_hex();
        Ok(())
    }

    /// Issue and sign in one step.
    pub fn issue_signed(
        &self,
        subject: &str,
        disclosure_prefs: &BTreeMap<String, bool>,
    ) -> Result<IdentityCertificate, AuthError> {
        let mut cert = self.issue(subject, disclosure_prefs)?;
        self.sign(&mut cert)?;
        info!(subject, "identity certificate issued");
        Ok(cert)
    }

    /// Revoke and re-sign. Revocation cannot be undone.
    pub fn revoke(&self, cert: &mut IdentityCertificate) -> Result<(), AuthError> {
        cert.revoked = true;
        cert.timestamp = Utc::now();
        self.sign(cert)?;
        info!(subject = %cert.subject, "identity certificate revoked");
        Ok(())
    }

    pub fn validate(&self, cert: &IdentityCertificate) -> Result<ExpiryStatus, AuthError> {
        self.validate_at(cert, Utc::now())
    }

    pub fn validate_at(&self, cert: &IdentityCertificate, now: DateTime<Utc>) -> Result<ExpiryStatus, AuthError> {
        validate_certificate(cert, now, self.config.expiry_warning_days)
    }
}

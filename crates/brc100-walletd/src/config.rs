//! Daemon configuration loaded from TOML.
//!
//! Every section has defaults, so an empty file is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use brc100_auth::certificates::DEFAULT_ISSUER;
use brc100_auth::{AuthorityConfig, ChallengeStoreConfig, HandshakeConfig, SessionStoreConfig, Type42Config};
use brc100_spv::{ClientConfig, ProviderConfig, VerifierConfig};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WalletdConfig {
    pub challenge: ChallengeSection,
    pub session: SessionSection,
    pub handshake: HandshakeSection,
    pub type42: Type42Section,
    pub identity: IdentitySection,
    pub providers: ProvidersSection,
    pub spv: SpvSection,
    pub state: StateSection,
}

impl WalletdConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ServiceError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ServiceError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ServiceError> {
        let positive = [
            ("challenge.lifetime_secs", self.challenge.lifetime_secs),
            ("challenge.sweep_interval_secs", self.challenge.sweep_interval_secs),
            ("session.lifetime_secs", self.session.lifetime_secs),
            ("session.sweep_interval_secs", self.session.sweep_interval_secs),
            ("handshake.nonce_ttl_secs", self.handshake.nonce_ttl_secs),
            ("handshake.sweep_interval_secs", self.handshake.sweep_interval_secs),
            ("type42.key_lifetime_secs", self.type42.key_lifetime_secs),
            ("type42.max_message_age_secs", self.type42.max_message_age_secs),
            ("providers.timeout_secs", self.providers.timeout_secs),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(ServiceError::Config(format!("{} must be positive", name)));
        }
        if self.identity.validity_days <= 0 || self.spv.max_proof_age_days <= 0 {
            return Err(ServiceError::Config("day counts must be positive".into()));
        }
        if self.providers.order.is_empty() {
            return Err(ServiceError::Config("providers.order is empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeSection {
    pub lifetime_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for ChallengeSection {
    fn default() -> Self {
        Self {
            lifetime_secs: 300,
            sweep_interval_secs: 300,
        }
    }
}

impl ChallengeSection {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl From<&ChallengeSection> for ChallengeStoreConfig {
    fn from(s: &ChallengeSection) -> Self {
        Self {
            lifetime: Duration::from_secs(s.lifetime_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub lifetime_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            lifetime_secs: 86_400,
            sweep_interval_secs: 300,
        }
    }
}

impl SessionSection {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl From<&SessionSection> for SessionStoreConfig {
    fn from(s: &SessionSection) -> Self {
        Self {
            lifetime: Duration::from_secs(s.lifetime_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeSection {
    pub nonce_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for HandshakeSection {
    fn default() -> Self {
        Self {
            nonce_ttl_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

impl HandshakeSection {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl From<&HandshakeSection> for HandshakeConfig {
    fn from(s: &HandshakeSection) -> Self {
        Self {
            nonce_ttl: Duration::from_secs(s.nonce_ttl_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Type42Section {
    pub key_lifetime_secs: u64,
    pub max_message_age_secs: u64,
    /// Include raw derived keys in derivation responses.
    pub expose_key_material: bool,
}

impl Default for Type42Section {
    fn default() -> Self {
        Self {
            key_lifetime_secs: 86_400,
            max_message_age_secs: 300,
            expose_key_material: false,
        }
    }
}

impl From<&Type42Section> for Type42Config {
    fn from(s: &Type42Section) -> Self {
        Self {
            key_lifetime: Duration::from_secs(s.key_lifetime_secs),
            max_message_age: Duration::from_secs(s.max_message_age_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySection {
    pub issuer: String,
    pub validity_days: i64,
    pub expiry_warning_days: i64,
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            validity_days: 365,
            expiry_warning_days: 30,
        }
    }
}

impl From<&IdentitySection> for AuthorityConfig {
    fn from(s: &IdentitySection) -> Self {
        Self {
            issuer: s.issuer.clone(),
            validity_days: s.validity_days,
            expiry_warning_days: s.expiry_warning_days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersSection {
    pub timeout_secs: u64,
    pub whatsonchain_url: String,
    pub gorillapool_url: String,
    pub taal_url: String,
    pub taal_api_key: Option<String>,
    pub order: Vec<String>,
}

impl Default for ProvidersSection {
    fn default() -> Self {
        let d = ProviderConfig::default();
        Self {
            timeout_secs: d.timeout.as_secs(),
            whatsonchain_url: d.whatsonchain_url,
            gorillapool_url: d.gorillapool_url,
            taal_url: d.taal_url,
            taal_api_key: d.taal_api_key,
            order: d.order,
        }
    }
}

impl From<&ProvidersSection> for ProviderConfig {
    fn from(s: &ProvidersSection) -> Self {
        Self {
            timeout: Duration::from_secs(s.timeout_secs),
            whatsonchain_url: s.whatsonchain_url.clone(),
            gorillapool_url: s.gorillapool_url.clone(),
            taal_url: s.taal_url.clone(),
            taal_api_key: s.taal_api_key.clone(),
            order: s.order.clone(),
        }
    }
}

impl From<&ProvidersSection> for ClientConfig {
    fn from(s: &ProvidersSection) -> Self {
        Self {
            timeout: Duration::from_secs(s.timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpvSection {
    pub max_proof_age_days: i64,
}

impl Default for SpvSection {
    fn default() -> Self {
        Self { max_proof_age_days: 365 }
    }
}

impl From<&SpvSection> for VerifierConfig {
    fn from(s: &SpvSection) -> Self {
        Self {
            max_proof_age_days: s.max_proof_age_days,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSection {
    /// JSON snapshot file. State is kept in memory only when unset.
    pub path: Option<PathBuf>,
}

//! Protocol-facing request and response shapes.

use std::collections::{BTreeMap, BTreeSet};

use brc100_auth::certificates::{DisclosureRequest, ExpiryStatus};
use brc100_auth::type42::ExportedType42Keys;
use brc100_auth::Challenge;
use brc100_spv::IdentityProof;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ServiceError;

/// The `{success, data, error}` envelope every operation answers with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the same request may succeed later.
    #[serde(default)]
    pub retryable: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            retryable: false,
        }
    }

    pub fn from_error(err: &ServiceError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            retryable: err.is_retryable(),
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(self.error.unwrap_or_else(|| "request failed".to_string())),
        }
    }
}

impl<T, E: Into<ServiceError>> From<Result<T, E>> for ApiResponse<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::from_error(&e.into()),
        }
    }
}

/// A bodiless HTTP answer: status and headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, &'static str)>,
}

/// The permissive CORS preflight answer.
pub fn cors_preflight() -> PreflightResponse {
    PreflightResponse {
        status: 200,
        headers: vec![
            ("Access-Control-Allow-Origin", "*"),
            ("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS"),
            ("Access-Control-Allow-Headers", "Content-Type, Authorization"),
        ],
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    pub app_domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeIssued {
    pub challenge_id: String,
    pub challenge: String,
    pub app_domain: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<Challenge> for ChallengeIssued {
    fn from(c: Challenge) -> Self {
        Self {
            challenge_id: c.id,
            challenge: c.nonce,
            app_domain: c.app_domain,
            created_at: c.created_at,
            expires_at: c.expires_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeVerified {
    pub authenticated: bool,
    pub app_domain: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub app_domain: String,
    /// Defaults to the wallet's current address.
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    /// Subject of an issued certificate to bind to the session.
    #[serde(default)]
    pub certificate_subject: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub valid: bool,
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Type42Request {
    /// The live session that will own the keys.
    pub session_id: String,
    /// Hex.
    pub wallet_public_key: String,
    /// Hex.
    pub app_public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Type42Derived {
    pub session_id: String,
    pub key_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Present only when key export is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<ExportedType42Keys>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueCertificateRequest {
    pub subject: String,
    /// Field name -> whether the subject allows disclosing it.
    pub fields: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateStatus {
    pub subject: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<ExpiryStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectiveDisclosureRequest {
    pub subject: String,
    pub request: DisclosureRequest,
    pub identity_data: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpvVerifyRequest {
    pub transaction_id: String,
    #[serde(default)]
    pub identity_data: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpvVerified {
    pub proof: IdentityProof,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

//! The service facade: one method per protocol operation.
//!
//! Every method answers with an [`ApiResponse`] envelope. Type-42 keys are
//! held per application session and are dropped with it, whether the session
//! is revoked or swept.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use brc100_auth::certificates::{disclose_certified, validate_disclosure_request};
use brc100_auth::handshake::RequestedCertificates;
use brc100_auth::{
    AuthError, CertificateAuthority, ChallengeResponse, ChallengeStore, HandshakeController, IdentityCertificate,
    InitialRequest, InitialResponse, NewSession, P2PMessage, Session, SessionStore, Sweep, Type42Deriver, Type42Keys,
    VerifyRequest,
};
use brc100_spv::{BlockchainDataClient, SpvVerifier};
use brc100_wallet::WalletKeyService;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{
    ApiResponse, CertificateStatus, ChallengeIssued, ChallengeRequest, ChallengeVerified, CreateSessionRequest,
    IssueCertificateRequest, SelectiveDisclosureRequest, SessionStatus, SpvVerified, SpvVerifyRequest, Type42Derived,
    Type42Request,
};
use crate::config::WalletdConfig;
use crate::error::ServiceError;
use crate::persistence::{StateSnapshot, SNAPSHOT_VERSION};

/// The counterparty of a completed handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerAuthenticated {
    pub identity_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_certificates: Option<RequestedCertificates>,
}

pub struct Brc100Service {
    wallet: Arc<dyn WalletKeyService>,
    challenges: Arc<ChallengeStore>,
    sessions: Arc<SessionStore>,
    handshake: Arc<HandshakeController>,
    deriver: Type42Deriver,
    authority: CertificateAuthority,
    verifier: SpvVerifier,
    /// Issued certificates by subject.
    certificates: RwLock<HashMap<String, Arc<IdentityCertificate>>>,
    /// Type-42 keys by owning application session id.
    session_keys: RwLock<HashMap<String, Type42Keys>>,
    expose_key_material: bool,
}

fn lock_error<T>(_: T) -> ServiceError {
    ServiceError::Auth(AuthError::LockError("service state lock poisoned".into()))
}

impl Brc100Service {
    /// Wire up every component from `config`.
    pub fn new(config: &WalletdConfig, wallet: Arc<dyn WalletKeyService>) -> Result<Self, ServiceError> {
        let client = BlockchainDataClient::from_config(&(&config.providers).into())?;
        Ok(Self {
            challenges: Arc::new(ChallengeStore::new((&config.challenge).into())),
            sessions: Arc::new(SessionStore::new((&config.session).into())),
            handshake: Arc::new(HandshakeController::new(Arc::clone(&wallet), (&config.handshake).into())),
            deriver: Type42Deriver::new((&config.type42).into()),
            authority: CertificateAuthority::new(Arc::clone(&wallet), (&config.identity).into()),
            verifier: SpvVerifier::new(Arc::new(client), (&config.spv).into()),
            certificates: RwLock::new(HashMap::new()),
            session_keys: RwLock::new(HashMap::new()),
            expose_key_material: config.type42.expose_key_material,
            wallet,
        })
    }

    pub fn challenge_store(&self) -> Arc<ChallengeStore> {
        Arc::clone(&self.challenges)
    }

    pub fn session_store(&self) -> Arc<SessionStore> {
        Arc::clone(&self.sessions)
    }

    pub fn handshake_controller(&self) -> Arc<HandshakeController> {
        Arc::clone(&self.handshake)
    }

    pub fn spv_client(&self) -> &Arc<BlockchainDataClient> {
        self.verifier.client()
    }

    // Challenges

    pub fn issue_challenge(&self, req: &ChallengeRequest) -> ApiResponse<ChallengeIssued> {
        self.challenges.create(&req.app_domain).map(ChallengeIssued::from).into()
    }

    pub fn verify_challenge(&self, resp: &ChallengeResponse) -> ApiResponse<ChallengeVerified> {
        self.challenges
            .verify(resp)
            .map(|c| ChallengeVerified {
                authenticated: true,
                app_domain: c.app_domain,
            })
            .into()
    }

    // Handshake

    pub fn handshake(&self, req: &InitialRequest) -> ApiResponse<InitialResponse> {
        self.handshake.respond(req).into()
    }

    pub fn complete_handshake(&self, req: &VerifyRequest) -> ApiResponse<PeerAuthenticated> {
        self.handshake
            .verify(req)
            .map(|peer| PeerAuthenticated {
                identity_key: peer.identity_key.to_hex(),
                requested_certificates: peer.requested_certificates,
            })
            .into()
    }

    // Sessions

    pub fn create_session(&self, req: &CreateSessionRequest) -> ApiResponse<Session> {
        self.try_create_session(req).into()
    }

    fn try_create_session(&self, req: &CreateSessionRequest) -> Result<Session, ServiceError> {
        let wallet_address = match &req.wallet_address {
            Some(addr) => addr.clone(),
            None => self.wallet.current_address()?.address,
        };
        let mut request = NewSession::new(&req.app_domain, wallet_address).with_permissions(req.permissions.clone());
        // Held until the session exists so a concurrent revocation rebinds it.
        let certs = self.certificates.read().map_err(lock_error)?;
        if let Some(subject) = &req.certificate_subject {
            let cert = certs
                .get(subject)
                .cloned()
                .ok_or_else(|| AuthError::NotFound(format!("certificate for {}", subject)))?;
            request = request.with_certificate(cert);
        }
        Ok(self.sessions.create(request)?)
    }

    /// Whether `session_id` names a live session. Unknown and expired
    /// sessions are reported as invalid rather than as errors.
    pub fn validate_session(&self, session_id: &str) -> ApiResponse<SessionStatus> {
        match self.sessions.get(session_id) {
            Ok(s) => ApiResponse::ok(SessionStatus {
                valid: true,
                authenticated: s.authenticated,
                expires_at: Some(s.expires_at),
            }),
            Err(AuthError::NotFound(_)) | Err(AuthError::Expired(_)) => {
                self.drop_keys(&[session_id.to_string()]);
                ApiResponse::ok(SessionStatus {
                    valid: false,
                    authenticated: false,
                    expires_at: None,
                })
            }
            Err(e) => ApiResponse::from_error(&e.into()),
        }
    }

    pub fn authenticate_session(&self, session_id: &str) -> ApiResponse<Session> {
        self.sessions.authenticate(session_id).into()
    }

    pub fn get_session(&self, session_id: &str) -> ApiResponse<Session> {
        self.sessions.get(session_id).into()
    }

    pub fn revoke_session(&self, session_id: &str) -> ApiResponse<Session> {
        let result = self.sessions.delete(session_id);
        self.drop_keys(&[session_id.to_string()]);
        if result.is_ok() {
            info!(session_id, "session revoked");
        }
        result.into()
    }

    pub fn list_sessions(&self, app_domain: Option<&str>) -> ApiResponse<Vec<Session>> {
        match app_domain {
            Some(domain) => self.sessions.list_by_app_domain(domain),
            None => self.sessions.list_active(),
        }
        .into()
    }

    // Type-42

    pub fn derive_type42_keys(&self, req: &Type42Request) -> ApiResponse<Type42Derived> {
        self.try_derive(req).into()
    }

    fn try_derive(&self, req: &Type42Request) -> Result<Type42Derived, ServiceError> {
        // The owning session must be live.
        self.sessions.get(&req.session_id)?;
        let wallet_key = hex::decode(&req.wallet_public_key)?;
        let app_key = hex::decode(&req.app_public_key)?;
        let keys = self.deriver.derive_keys(&wallet_key, &app_key)?;

        let derived = Type42Derived {
            session_id: req.session_id.clone(),
            key_id: keys.session_id.clone(),
            created_at: keys.created_at,
            expires_at: keys.expires_at,
            keys: self.expose_key_material.then(|| keys.export()),
        };
        self.session_keys
            .write()
            .map_err(lock_error)?
            .insert(req.session_id.clone(), keys);
        debug!(session_id = %req.session_id, "type-42 keys bound to session");
        Ok(derived)
    }

    pub fn encrypt_message(&self, session_id: &str, plaintext: &str) -> ApiResponse<P2PMessage> {
        self.with_session_keys(session_id, |keys| {
            Ok(self.deriver.create_encrypted_p2p_message(keys, plaintext.as_bytes())?)
        })
        .into()
    }

    pub fn decrypt_message(&self, session_id: &str, msg: &P2PMessage) -> ApiResponse<String> {
        self.with_session_keys(session_id, |keys| {
            let plaintext = self.deriver.open_p2p_message(keys, msg)?;
            String::from_utf8(plaintext)
                .map_err(|_| AuthError::MalformedInput("plaintext is not UTF-8".into()).into())
        })
        .into()
    }

    fn with_session_keys<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&Type42Keys) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        if let Err(e) = self.sessions.get(session_id) {
            self.drop_keys(&[session_id.to_string()]);
            return Err(e.into());
        }
        let keys = self
            .session_keys
            .read()
            .map_err(lock_error)?
            .get(session_id)
            .cloned()
            .ok_or_else(|| AuthError::NotFound(format!("type-42 keys for session {}", session_id)))?;
        if keys.is_expired_at(Utc::now()) {
            self.drop_keys(&[session_id.to_string()]);
            return Err(AuthError::Expired("type-42 keys".into()).into());
        }
        f(&keys)
    }

    fn drop_keys(&self, session_ids: &[String]) -> usize {
        let mut keys = match self.session_keys.write() {
            Ok(k) => k,
            Err(p) => p.into_inner(),
        };
        session_ids.iter().filter(|id| keys.remove(*id).is_some()).count()
    }

    // Identity certificates

    pub fn issue_certificate(&self, req: &IssueCertificateRequest) -> ApiResponse<IdentityCertificate> {
        self.try_issue(req).into()
    }

    fn try_issue(&self, req: &IssueCertificateRequest) -> Result<IdentityCertificate, ServiceError> {
        let cert = self.authority.issue_signed(&req.subject, &req.fields)?;
        self.publish_certificate(cert.clone())?;
        Ok(cert)
    }

    /// Make `cert` the current certificate for its subject, including for
    /// every session already bound to that subject.
    fn publish_certificate(&self, cert: IdentityCertificate) -> Result<(), ServiceError> {
        let cert = Arc::new(cert);
        let mut certs = self.certificates.write().map_err(lock_error)?;
        self.sessions.rebind_certificate(&cert)?;
        certs.insert(cert.subject.clone(), cert);
        Ok(())
    }

    pub fn get_certificate(&self, subject: &str) -> ApiResponse<IdentityCertificate> {
        self.find_certificate(subject).map(|c| (*c).clone()).into()
    }

    fn find_certificate(&self, subject: &str) -> Result<Arc<IdentityCertificate>, ServiceError> {
        self.certificates
            .read()
            .map_err(lock_error)?
            .get(subject)
            .cloned()
            .ok_or_else(|| AuthError::NotFound(format!("certificate for {}", subject)).into())
    }

    /// Validate a presented certificate. Validation failures are reported
    /// in the body, not as errors.
    pub fn validate_certificate(&self, cert: &IdentityCertificate) -> ApiResponse<CertificateStatus> {
        let status = match self.authority.validate(cert) {
            Ok(expiry) => CertificateStatus {
                subject: cert.subject.clone(),
                valid: true,
                expiry: Some(expiry),
                reason: None,
            },
            Err(AuthError::LockError(msg)) => return ApiResponse::from_error(&AuthError::LockError(msg).into()),
            Err(e) => CertificateStatus {
                subject: cert.subject.clone(),
                valid: false,
                expiry: None,
                reason: Some(e.to_string()),
            },
        };
        ApiResponse::ok(status)
    }

    pub fn revoke_certificate(&self, subject: &str) -> ApiResponse<IdentityCertificate> {
        self.try_revoke(subject).into()
    }

    fn try_revoke(&self, subject: &str) -> Result<IdentityCertificate, ServiceError> {
        let mut cert = (*self.find_certificate(subject)?).clone();
        self.authority.revoke(&mut cert)?;
        self.publish_certificate(cert.clone())?;
        Ok(cert)
    }

    /// Disclose exactly the requested identity fields the subject's
    /// certificate allows.
    pub fn disclose_identity(&self, req: &SelectiveDisclosureRequest) -> ApiResponse<BTreeMap<String, Value>> {
        self.try_disclose(req).into()
    }

    fn try_disclose(&self, req: &SelectiveDisclosureRequest) -> Result<BTreeMap<String, Value>, ServiceError> {
        validate_disclosure_request(&req.request)?;
        let cert = self.find_certificate(&req.subject)?;
        self.authority.validate(&cert)?;
        let disclosed = disclose_certified(&cert, &req.identity_data, &req.request.requested_fields)?;
        info!(
            subject = %req.subject,
            app_domain = %req.request.app_domain,
            fields = disclosed.len(),
            "identity fields disclosed"
        );
        Ok(disclosed)
    }

    // SPV

    /// Build and verify an identity proof. A proof that fails its checks
    /// is returned with `valid = false` unless the failure is transient.
    pub async fn verify_identity(&self, req: &SpvVerifyRequest) -> ApiResponse<SpvVerified> {
        let mut proof = match self
            .verifier
            .create_identity_proof(&req.transaction_id, req.identity_data.clone())
            .await
        {
            Ok(p) => p,
            Err(e) => return ApiResponse::from_error(&e.into()),
        };
        match self.verifier.verify_identity_proof(&mut proof).await {
            Ok(()) => ApiResponse::ok(SpvVerified {
                proof,
                valid: true,
                reason: None,
            }),
            Err(e) if e.is_retryable() => ApiResponse::from_error(&e.into()),
            Err(e) => ApiResponse::ok(SpvVerified {
                proof,
                valid: false,
                reason: Some(e.to_string()),
            }),
        }
    }

    // Persistence

    pub fn snapshot(&self) -> Result<StateSnapshot, ServiceError> {
        let mut certificates: Vec<IdentityCertificate> = self
            .certificates
            .read()
            .map_err(lock_error)?
            .values()
            .map(|c| (**c).clone())
            .collect();
        certificates.sort_by(|a, b| a.subject.cmp(&b.subject));
        Ok(StateSnapshot {
            version: SNAPSHOT_VERSION,
            challenges: self.challenges.snapshot()?,
            sessions: self.sessions.snapshot()?,
            certificates,
        })
    }

    /// Load a snapshot. Expired challenges and sessions are skipped.
    pub fn restore(&self, snapshot: StateSnapshot) -> Result<(), ServiceError> {
        let challenges = self.challenges.restore(snapshot.challenges)?;
        let sessions = self.sessions.restore(snapshot.sessions)?;
        let certificates = snapshot.certificates.len();
        for cert in snapshot.certificates {
            self.publish_certificate(cert)?;
        }
        info!(challenges, sessions, certificates, "state restored");
        Ok(())
    }
}

/// Sweeps expired sessions and the Type-42 keys they own.
impl Sweep for Brc100Service {
    fn name(&self) -> &'static str {
        "sessions"
    }

    fn sweep_expired(&self) -> Result<usize, AuthError> {
        let expired = self.sessions.sweep_expired_ids()?;
        let mut dropped = self.drop_keys(&expired);

        // Keys whose session vanished another way.
        let live: Vec<String> = self
            .sessions
            .list_active()?
            .into_iter()
            .map(|s| s.session_id)
            .collect();
        let orphaned: Vec<String> = match self.session_keys.read() {
            Ok(keys) => keys.keys().filter(|id| !live.contains(*id)).cloned().collect(),
            Err(_) => return Err(AuthError::LockError("service state lock poisoned".into())),
        };
        dropped += self.drop_keys(&orphaned);
        if dropped > 0 {
            warn!(dropped, "type-42 keys dropped with their sessions");
        }
        Ok(expired.len())
    }
}

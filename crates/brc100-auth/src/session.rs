//! Authenticated application sessions.
//!
//! Session ids are derived from the wallet address, application domain and
//! creation time, hashed and truncated to 8 bytes. Every read refreshes
//! `last_activity`; an expired session is deleted by whichever lookup or
//! sweep first observes it.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use brc100_primitives::hash::sha256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::certificates::IdentityCertificate;
use crate::error::{poisoned, AuthError};
use crate::sweeper::Sweep;
use crate::utils::{is_hex_of_len, lifetime};

/// Hex length of a session id.
pub const SESSION_ID_HEX_LEN: usize = 16;

/// Session store settings.
#[derive(Debug, Clone)]
pub struct SessionStoreConfig {
    /// Lifetime of a newly created session.
    pub lifetime: Duration,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            lifetime: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// An application session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub app_domain: String,
    pub wallet_address: String,
    /// Shared with the issuing authority, never copied per session.
    pub identity_certificate: Option<Arc<IdentityCertificate>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub authenticated: bool,
    pub permissions: BTreeSet<String>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Parameters of a session to create.
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub app_domain: String,
    pub wallet_address: String,
    pub identity_certificate: Option<Arc<IdentityCertificate>>,
    pub permissions: BTreeSet<String>,
    pub authenticated: bool,
}

impl NewSession {
    pub fn new(app_domain: impl Into<String>, wallet_address: impl Into<String>) -> Self {
        Self {
            app_domain: app_domain.into(),
            wallet_address: wallet_address.into(),
            ..Default::default()
        }
    }

    pub fn with_certificate(mut self, cert: Arc<IdentityCertificate>) -> Self {
        self.identity_certificate = Some(cert);
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn authenticated(mut self) -> Self {
        self.authenticated = true;
        self
    }
}

/// Counts over the current contents of a [`SessionStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub total: usize,
    pub active: usize,
    pub authenticated: usize,
    pub expired: usize,
}

/// True if `id` has the shape of a session id.
pub fn validate_session_id(id: &str) -> bool {
    is_hex_of_len(id, SESSION_ID_HEX_LEN)
}

/// Derive the session id for `(wallet_address, app_domain, created_at)`.
///
/// `attempt` disambiguates ids that collide with a live session.
pub fn derive_session_id(
    wallet_address: &str,
    app_domain: &str,
    created_at: DateTime<Utc>,
    attempt: u32,
) -> String {
    let nanos = created_at
        .timestamp_nanos_opt()
        .unwrap_or_else(|| created_at.timestamp_micros());
    let seed = if attempt == 0 {
        format!("{}:{}:{}", wallet_address, app_domain, nanos)
    } else {
        format!("{}:{}:{}:{}", wallet_address, app_domain, nanos, attempt)
    };
    hex::encode(&sha256(seed.as_bytes())[..SESSION_ID_HEX_LEN / 2])
}

/// Thread-safe store of application sessions.
pub struct SessionStore {
    config: SessionStoreConfig,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(config: SessionStoreConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a session with the configured lifetime.
    pub fn create(&self, request: NewSession) -> Result<Session, AuthError> {
        self.create_at(request, Utc::now())
    }

    /// Create a session as if the current time were `now`.
    pub fn create_at(&self, request: NewSession, now: DateTime<Utc>) -> Result<Session, AuthError> {
        if request.app_domain.trim().is_empty() {
            return Err(AuthError::MalformedInput("app domain is empty".into()));
        }
        let ttl = lifetime(self.config.lifetime);
        if ttl <= chrono::Duration::zero() {
            return Err(AuthError::MalformedInput("session lifetime must be positive".into()));
        }

        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let mut attempt = 0u32;
        let session_id = loop {
            let id = derive_session_id(&request.wallet_address, &request.app_domain, now, attempt);
            if !sessions.contains_key(&id) {
                break id;
            }
            debug!(attempt, "session id collision, retrying");
            attempt += 1;
        };

        let session = Session {
            session_id: session_id.clone(),
            app_domain: request.app_domain,
            wallet_address: request.wallet_address,
            identity_certificate: request.identity_certificate,
            created_at: now,
            expires_at: now + ttl,
            last_activity: now,
            authenticated: request.authenticated,
            permissions: request.permissions,
        };
        sessions.insert(session_id, session.clone());
        drop(sessions);

        info!(
            app_domain = %session.app_domain,
            session_id = %session.session_id,
            authenticated = session.authenticated,
            "session created"
        );
        Ok(session)
    }

    /// Fetch a live session, refreshing its last activity.
    pub fn get(&self, session_id: &str) -> Result<Session, AuthError> {
        self.with_live(session_id, |s| s.clone())
    }

    /// Mark a session authenticated.
    pub fn authenticate(&self, session_id: &str) -> Result<Session, AuthError> {
        self.with_live(session_id, |s| {
            s.authenticated = true;
            s.clone()
        })
    }

    /// Replace a session's permissions.
    pub fn update_permissions<I, S>(&self, session_id: &str, permissions: I) -> Result<Session, AuthError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let permissions: BTreeSet<String> = permissions.into_iter().map(Into::into).collect();
        self.with_live(session_id, move |s| {
            s.permissions = permissions;
            s.clone()
        })
    }

    /// Push a session's expiry to `duration` from now.
    pub fn extend(&self, session_id: &str, duration: Duration) -> Result<Session, AuthError> {
        let by = lifetime(duration);
        if by <= chrono::Duration::zero() {
            return Err(AuthError::MalformedInput("extension must be positive".into()));
        }
        self.with_live(session_id, |s| {
            s.expires_at = s.last_activity + by;
            s.clone()
        })
    }

    /// Whether a live session has been authenticated.
    pub fn is_authenticated(&self, session_id: &str) -> Result<bool, AuthError> {
        self.with_live(session_id, |s| s.authenticated)
    }

    /// Remove a session.
    pub fn delete(&self, session_id: &str) -> Result<Session, AuthError> {
        let removed = self.sessions.write().map_err(poisoned)?.remove(session_id);
        match removed {
            Some(s) => {
                info!(session_id, "session deleted");
                Ok(s)
            }
            None => Err(AuthError::NotFound("session".into())),
        }
    }

    /// All sessions that have not expired.
    pub fn list_active(&self) -> Result<Vec<Session>, AuthError> {
        self.list_where(|_| true)
    }

    /// Live sessions for one application domain.
    pub fn list_by_app_domain(&self, app_domain: &str) -> Result<Vec<Session>, AuthError> {
        self.list_where(|s| s.app_domain == app_domain)
    }

    pub fn stats(&self) -> Result<SessionStats, AuthError> {
        let now = Utc::now();
        let sessions = self.sessions.read().map_err(poisoned)?;
        let mut stats = SessionStats {
            total: sessions.len(),
            ..Default::default()
        };
        for s in sessions.values() {
            if s.is_expired_at(now) {
                stats.expired += 1;
            } else {
                stats.active += 1;
                if s.authenticated {
                    stats.authenticated += 1;
                }
            }
        }
        Ok(stats)
    }

    /// Remove expired sessions and return their ids.
    pub fn sweep_expired_ids(&self) -> Result<Vec<String>, AuthError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let expired: Vec<String> = sessions
            .values()
            .filter(|s| s.is_expired_at(now))
            .map(|s| s.session_id.clone())
            .collect();
        for id in &expired {
            sessions.remove(id);
        }
        Ok(expired)
    }

    /// Point every session bound to `cert.subject` at `cert`. Returns how
    /// many sessions were rebound.
    pub fn rebind_certificate(&self, cert: &Arc<IdentityCertificate>) -> Result<usize, AuthError> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let mut rebound = 0;
        for bound in sessions.values_mut().filter_map(|s| s.identity_certificate.as_mut()) {
            if bound.subject == cert.subject && !Arc::ptr_eq(bound, cert) {
                *bound = Arc::clone(cert);
                rebound += 1;
            }
        }
        if rebound > 0 {
            debug!(subject = %cert.subject, rebound, "sessions rebound to current certificate");
        }
        Ok(rebound)
    }

    /// Copy of every stored session, for persistence.
    pub fn snapshot(&self) -> Result<Vec<Session>, AuthError> {
        Ok(self.sessions.read().map_err(poisoned)?.values().cloned().collect())
    }

    /// Load persisted sessions, skipping expired ones and never replacing a
    /// live entry. Returns how many were loaded.
    pub fn restore(&self, sessions: Vec<Session>) -> Result<usize, AuthError> {
        let now = Utc::now();
        let mut map = self.sessions.write().map_err(poisoned)?;
        let before = map.len();
        for s in sessions.into_iter().filter(|s| !s.is_expired_at(now)) {
            map.entry(s.session_id.clone()).or_insert(s);
        }
        Ok(map.len() - before)
    }

    fn with_live<R>(&self, session_id: &str, f: impl FnOnce(&mut Session) -> R) -> Result<R, AuthError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| AuthError::NotFound("session".into()))?;
        if session.is_expired_at(now) {
            sessions.remove(session_id);
            debug!(session_id, "expired session removed on lookup");
            return Err(AuthError::Expired("session".into()));
        }
        if now > session.last_activity {
            session.last_activity = now;
        }
        Ok(f(session))
    }

    fn list_where(&self, pred: impl Fn(&Session) -> bool) -> Result<Vec<Session>, AuthError> {
        let now = Utc::now();
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions
            .values()
            .filter(|s| !s.is_expired_at(now) && pred(s))
            .cloned()
            .collect())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionStoreConfig::default())
    }
}

impl Sweep for SessionStore {
    fn name(&self) -> &'static str {
        "sessions"
    }

    fn sweep_expired(&self) -> Result<usize, AuthError> {
        Ok(self.sweep_expired_ids()?.len())
    }
}

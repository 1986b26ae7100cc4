//! Single source of truth for "who is signed in"

use super::state::{Session, SessionState};
use crate::backend::{AuthBackend, AuthGrant, BackendError};
use crate::error::{SessionError, SessionResult};
use crate::identity::{Credentials, Identity, TokenClaims};
use crate::storage::{AUTH_TOKEN_KEY, TokenStorage};
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, instrument, warn};

/// Handle to the session store.
///
/// Clones share the same state. All mutation of identity and session goes
/// through the methods here; everyone else reads snapshots or subscribes.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn AuthBackend>,
    storage: Arc<dyn TokenStorage>,
    token_key: String,
    state: watch::Sender<SessionState>,
    /// Bumped by every sign-out and every committed sign-in; results of calls
    /// started in an older epoch are discarded
    epoch: AtomicU64,
    sign_in_gate: Mutex<()>,
    refresh_gate: Mutex<()>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("token_key", &self.inner.token_key)
            .field("phase", &self.inner.state.borrow().phase())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Create a store using the default `auth_token` slot
    pub fn new(backend: Arc<dyn AuthBackend>, storage: Arc<dyn TokenStorage>) -> Self {
        Self::with_token_key(backend, storage, AUTH_TOKEN_KEY)
    }

    /// Create a store persisting the token under a custom slot name
    pub fn with_token_key(
        backend: Arc<dyn AuthBackend>,
        storage: Arc<dyn TokenStorage>,
        token_key: impl Into<String>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        Self {
            inner: Arc::new(Inner {
                backend,
                storage,
                token_key: token_key.into(),
                state,
                epoch: AtomicU64::new(0),
                sign_in_gate: Mutex::new(()),
                refresh_gate: Mutex::new(()),
            }),
        }
    }

    /// Current snapshot
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receive every published state change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.state.borrow().identity().cloned()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.state.borrow().access_token().map(str::to_string)
    }

    /// Slot name the token is persisted under
    pub fn token_key(&self) -> &str {
        &self.inner.token_key
    }

    /// Persisted token storage shared with route checks
    pub fn storage(&self) -> &Arc<dyn TokenStorage> {
        &self.inner.storage
    }

    /// Resolve the startup `Loading` state from persisted storage
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> SessionState {
        self.inner.state.send_replace(SessionState::Loading);
        let epoch = self.current_epoch();

        let stored = match self.inner.storage.get(&self.inner.token_key).await {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read persisted session");
                None
            }
        };

        let restored = stored.and_then(|token| {
            let grant = AuthGrant {
                access_token: token,
                identity: None,
            };
            match establish(&grant) {
                Ok((_, session)) if session.is_expired_at(Utc::now()) => {
                    info!("Persisted session has expired");
                    None
                }
                Ok(established) => Some(established),
                Err(e) => {
                    warn!(error = %e, "Discarding unreadable persisted session");
                    None
                }
            }
        });

        let published = match restored {
            Some((identity, session)) => self.publish(epoch, identity, session).is_ok(),
            None => {
                self.clear_persisted().await;
                debug!("No valid persisted session");
                false
            }
        };

        if published {
            info!("Restored persisted session");
        } else {
            self.inner.state.send_if_modified(|state| {
                if state.is_loading() {
                    *state = SessionState::Unauthenticated;
                    true
                } else {
                    false
                }
            });
        }

        self.state()
    }

    /// Authenticate with the backend and publish the resulting identity.
    ///
    /// A second call while one is in flight fails with
    /// [`SessionError::SignInInProgress`]. Failures leave the state untouched.
    /// A successful sign-in starts a new epoch, so a refresh still in flight
    /// for the previous identity is discarded.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn sign_in(&self, credentials: &Credentials) -> SessionResult<Identity> {
        credentials.validate()?;

        let _in_flight = self
            .inner
            .sign_in_gate
            .try_lock()
            .map_err(|_| SessionError::SignInInProgress)?;
        let epoch = self.current_epoch();

        let grant = self
            .inner
            .backend
            .sign_in(credentials)
            .await
            .map_err(|e| match e {
                BackendError::Rejected(message) => SessionError::AuthenticationFailed(message),
                BackendError::Unavailable(message) => SessionError::NetworkUnavailable(message),
            })?;

        let (identity, session) = establish(&grant)?;
        let epoch = self.advance_epoch(epoch)?;
        self.commit(epoch, identity.clone(), session).await?;

        info!(user_id = %identity.id, role = %identity.role, "Signed in");
        Ok(identity)
    }

    /// Clear identity and session unconditionally.
    ///
    /// In-flight sign-in and refresh results are discarded. The persisted slot
    /// is cleared before observers see `Unauthenticated`, so a caller that
    /// stops on that change never leaves a token behind. Revoking the token
    /// with the backend is best effort.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.clear_persisted().await;
        let previous = self.inner.state.send_replace(SessionState::Unauthenticated);

        if let Some(token) = previous.access_token() {
            if let Err(e) = self.inner.backend.sign_out(token).await {
                warn!(error = %e, "Backend sign-out failed");
            }
            info!("Signed out");
        }
    }

    /// Swap the access token for a fresh one and re-derive the identity.
    ///
    /// Any failure forces a sign-out and returns [`SessionError::SessionExpired`].
    /// A result superseded by a sign-in or sign-out in the meantime is
    /// discarded without touching the newer session.
    #[instrument(skip(self))]
    pub async fn refresh_session(&self) -> SessionResult<Identity> {
        let _refreshing = self.inner.refresh_gate.lock().await;
        let epoch = self.current_epoch();
        let Some(token) = self.access_token() else {
            return Err(SessionError::SessionExpired);
        };

        let refreshed = match self.inner.backend.refresh_session(&token).await {
            Ok(grant) => establish(&grant),
            Err(e) => Err(match e {
                BackendError::Rejected(message) => SessionError::AuthenticationFailed(message),
                BackendError::Unavailable(message) => SessionError::NetworkUnavailable(message),
            }),
        };

        match refreshed {
            Ok((identity, session)) => {
                self.commit(epoch, identity.clone(), session).await?;
                debug!(user_id = %identity.id, "Session refreshed");
                Ok(identity)
            }
            Err(e) if self.current_epoch() != epoch => {
                debug!(error = %e, "Discarding refresh failure superseded by a newer session");
                Err(SessionError::SessionExpired)
            }
            Err(e) => {
                warn!(error = %e, "Session refresh failed, signing out");
                self.sign_out().await;
                Err(SessionError::SessionExpired)
            }
        }
    }

    /// Check the token's own expiry, signing out once it has passed
    pub async fn validate(&self) -> SessionResult<()> {
        let expired = self
            .inner
            .state
            .borrow()
            .session()
            .is_some_and(|session| session.is_expired_at(Utc::now()));

        if expired {
            info!("Access token expired");
            self.sign_out().await;
            return Err(SessionError::SessionExpired);
        }
        Ok(())
    }

    fn current_epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    /// Move from `epoch` to a fresh one, failing if a sign-out got there first
    fn advance_epoch(&self, epoch: u64) -> SessionResult<u64> {
        self.inner
            .epoch
            .compare_exchange(epoch, epoch + 1, Ordering::SeqCst, Ordering::SeqCst)
            .map(|previous| previous + 1)
            .map_err(|_| {
                debug!("Discarding sign-in superseded by sign-out");
                SessionError::SessionExpired
            })
    }

    /// Publish an authenticated state unless a sign-out happened since `epoch`
    fn publish(&self, epoch: u64, identity: Identity, session: Session) -> SessionResult<()> {
        let applied = self.inner.state.send_if_modified(|state| {
            if self.inner.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            *state = SessionState::Authenticated { identity, session };
            true
        });

        if applied {
            Ok(())
        } else {
            debug!("Discarding result superseded by sign-out");
            Err(SessionError::SessionExpired)
        }
    }

    async fn commit(&self, epoch: u64, identity: Identity, session: Session) -> SessionResult<()> {
        let token = session.access_token.clone();
        self.publish(epoch, identity, session)?;

        if let Err(e) = self.inner.storage.set(&self.inner.token_key, &token).await {
            warn!(error = %e, "Failed to persist session");
        }
        if self.current_epoch() != epoch {
            self.clear_persisted().await;
            return Err(SessionError::SessionExpired);
        }
        Ok(())
    }

    async fn clear_persisted(&self) {
        if let Err(e) = self.inner.storage.remove(&self.inner.token_key).await {
            warn!(error = %e, "Failed to clear persisted session");
        }
    }
}

/// Turn a backend grant into identity and session.
///
/// Token metadata wins over the identity the backend returned alongside it;
/// opaque tokens fall back to the returned identity.
fn establish(grant: &AuthGrant) -> SessionResult<(Identity, Session)> {
    if grant.access_token.trim().is_empty() {
        return Err(SessionError::InvalidToken("empty access token".to_string()));
    }

    let claims = TokenClaims::decode(&grant.access_token);
    let identity = match (&claims, &grant.identity) {
        (Ok(claims), _) if claims.has_profile() => claims.identity()?,
        (_, Some(identity)) => identity.clone(),
        (Ok(claims), None) => claims.identity()?,
        (Err(e), None) => return Err(e.clone()),
    };

    let claims = claims.ok();
    let session = Session {
        access_token: grant.access_token.clone(),
        expires_at: claims.as_ref().and_then(TokenClaims::expires_at),
        issued_at: claims
            .as_ref()
            .and_then(TokenClaims::issued_at)
            .unwrap_or_else(Utc::now),
    };

    Ok((identity, session))
}

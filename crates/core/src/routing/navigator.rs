//! Navigation that re-checks the session on every move

use super::guard::{GuardDecision, RouteGuard, normalize};
use crate::apps::{Rendered, RoleDispatcher, RoleSet};
use crate::session::{SessionState, SessionStore};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Where a navigation ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation<V> {
    /// The session is still being resolved; show a loading indicator
    Loading,
    /// Access denied; go to the landing page
    Redirect { to: String, return_to: String },
    /// A non-dashboard page the user may see
    Page { path: String },
    /// The role-selected dashboard
    Dashboard(Rendered<V>),
}

/// Route guard plus role dispatch for one application
pub struct Navigator<R: RoleSet> {
    guard: RouteGuard,
    store: SessionStore,
    dispatcher: RoleDispatcher<R>,
    dashboard_path: String,
    return_to: Mutex<Option<String>>,
}

impl<R: RoleSet> std::fmt::Debug for Navigator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigator")
            .field("app", &R::APP)
            .field("guard", &self.guard)
            .field("dashboard_path", &self.dashboard_path)
            .finish_non_exhaustive()
    }
}

impl<R: RoleSet> Navigator<R> {
    pub fn new(guard: RouteGuard, store: SessionStore, dashboard_path: impl Into<String>) -> Self {
        Self {
            guard,
            store,
            dispatcher: RoleDispatcher::new(),
            dashboard_path: dashboard_path.into(),
            return_to: Mutex::new(None),
        }
    }

    pub fn dashboard_path(&self) -> &str {
        &self.dashboard_path
    }

    /// Evaluate a navigation to `path` against the current session.
    ///
    /// The persisted token slot is read on every call, so a session that ended
    /// while a protected view was open is caught on the next navigation.
    pub async fn navigate(&self, path: &str) -> Navigation<R::View> {
        if self.store.validate().await.is_err() {
            debug!("Session expired before navigation");
        }

        let state = self.store.state();
        if state.is_loading() {
            return Navigation::Loading;
        }

        let persisted = match self.store.storage().get(self.store.token_key()).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted token");
                None
            }
        };
        let token = effective_token(&state, persisted.as_deref());

        match self.guard.check(path, token) {
            GuardDecision::Redirect { to, return_to } => {
                debug!(path, to = %to, "Redirecting unauthenticated navigation");
                *self.pending_return() = Some(return_to.clone());
                Navigation::Redirect { to, return_to }
            }
            GuardDecision::Allow => match state.identity() {
                Some(identity) if self.is_dashboard(path) => {
                    Navigation::Dashboard(self.dispatcher.dispatch(identity))
                }
                _ => Navigation::Page {
                    path: path.to_string(),
                },
            },
        }
    }

    /// Location to open after a successful sign-in: the last denied location
    /// if there was one, otherwise the dashboard. Consumes the remembered
    /// location.
    pub fn after_sign_in(&self) -> String {
        self.take_return_to()
            .unwrap_or_else(|| self.dashboard_path.clone())
    }

    /// The last location a redirect was issued for
    pub fn take_return_to(&self) -> Option<String> {
        self.pending_return().take()
    }

    fn is_dashboard(&self, path: &str) -> bool {
        normalize(path) == normalize(&self.dashboard_path)
    }

    fn pending_return(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.return_to.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The token the guard sees: only a persisted token that matches a live
/// authenticated session counts
fn effective_token<'a>(state: &'a SessionState, persisted: Option<&str>) -> Option<&'a str> {
    let live = state.access_token()?;
    (persisted == Some(live)).then_some(live)
}

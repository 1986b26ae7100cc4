//! Published session state

use crate::identity::Identity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The live access token and its validity window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    /// Whether the token's own expiry has passed
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

/// What observers of the session store see.
///
/// An identity only exists together with a session, so "identity present iff
/// token present" holds by construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SessionState {
    /// Startup: persisted session not yet resolved
    #[default]
    Loading,
    Unauthenticated,
    Authenticated {
        identity: Identity,
        session: Session,
    },
}

impl SessionState {
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    pub const fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated { identity, .. } => Some(identity),
            _ => None,
        }
    }

    pub const fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated { session, .. } => Some(session),
            _ => None,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.session().map(|session| session.access_token.as_str())
    }

    /// Short name for logs
    pub const fn phase(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticated { .. } => "authenticated",
        }
    }
}

//! Identity, credentials and access-token claims

use crate::error::{SessionError, SessionResult};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Account status as reported by the profile metadata
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Pending,
    Suspended,
    #[serde(other)]
    Unknown,
}

/// The authenticated user's profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// Raw role string; parsed into an application role set at dispatch time
    pub role: String,
    #[serde(default)]
    pub status: AccountStatus,
    /// Domain-specific profile fields (hospital name, meter id, ...)
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl Identity {
    /// Get a string-valued domain attribute
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(serde_json::Value::as_str)
    }
}

/// Email/password pair submitted to the auth backend. Never persisted.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Reject obviously incomplete input before any round trip
    pub fn validate(&self) -> SessionResult<()> {
        if self.email.trim().is_empty() {
            return Err(SessionError::AuthenticationFailed(
                "Email is required".to_string(),
            ));
        }
        if self.password.is_empty() {
            return Err(SessionError::AuthenticationFailed(
                "Password is required".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Profile metadata embedded in the access token
#[derive(Debug, Clone, Default, Deserialize)]
struct ProfileMetadata {
    name: Option<String>,
    role: Option<String>,
    phone: Option<String>,
    status: Option<AccountStatus>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

/// Decoded access-token payload
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Expiration time (as UTC timestamp)
    #[serde(default)]
    pub exp: Option<i64>,
    /// Issued at (as UTC timestamp)
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    user_metadata: Option<ProfileMetadata>,
}

impl TokenClaims {
    /// Decode the payload segment of a JWT without verifying its signature.
    ///
    /// Signature verification is the backend's job; the client only reads the
    /// embedded profile.
    pub fn decode(token: &str) -> SessionResult<Self> {
        let mut segments = token.split('.');
        let payload = match (segments.next(), segments.next(), segments.next()) {
            (Some(_), Some(payload), Some(_)) if !payload.is_empty() => payload,
            _ => {
                return Err(SessionError::InvalidToken(
                    "expected three dot-separated segments".to_string(),
                ));
            }
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| SessionError::InvalidToken(format!("payload is not base64url: {e}")))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| SessionError::InvalidToken(format!("payload is not valid claims: {e}")))
    }

    /// Expiry as a timestamp, if the token carries one
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }

    /// Issue time as a timestamp, if the token carries one
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat.and_then(|iat| Utc.timestamp_opt(iat, 0).single())
    }

    /// Whether the token has expired relative to `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| now >= exp)
    }

    /// Whether the payload carries enough profile data to build an identity
    pub fn has_profile(&self) -> bool {
        self.user_metadata
            .as_ref()
            .is_some_and(|meta| meta.role.is_some())
    }

    /// Build an identity from the embedded profile metadata
    pub fn identity(&self) -> SessionResult<Identity> {
        let meta = self.user_metadata.clone().unwrap_or_default();
        let role = meta
            .role
            .ok_or_else(|| SessionError::InvalidToken("token carries no role".to_string()))?;
        let email = self.email.clone().unwrap_or_default();
        let name = meta.name.unwrap_or_else(|| email.clone());

        Ok(Identity {
            id: self.sub.clone(),
            email,
            name,
            phone: meta.phone,
            role,
            status: meta.status.unwrap_or_default(),
            attributes: meta.extra,
        })
    }
}

/// Derive the identity from token metadata without a network round trip.
///
/// The result is only as fresh as the token: server-side profile or role
/// changes are not visible until the next refresh.
pub fn get_profile(token: &str) -> SessionResult<Identity> {
    TokenClaims::decode(token)?.identity()
}

#[cfg(test)]
pub(crate) mod test_tokens {
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
    use serde_json::json;

    /// Build an unsigned JWT-shaped token around a JSON payload
    pub fn token_from(payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.c2lnbmF0dXJl")
    }

    /// Token for a user with the given role expiring at `exp`
    pub fn token_for(sub: &str, role: &str, exp: i64) -> String {
        token_from(&json!({
            "sub": sub,
            "email": format!("{sub}@example.org"),
            "exp": exp,
            "iat": exp - 3600,
            "user_metadata": {
                "name": format!("User {sub}"),
                "role": role,
                "phone": "+15550100",
                "hospital_name": "St. Mary",
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::test_tokens::{token_for, token_from};
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_from_token_metadata() {
        let token = token_for("u-1", "hospital", 4_102_444_800);
        let identity = get_profile(&token).unwrap();

        assert_eq!(identity.id, "u-1");
        assert_eq!(identity.email, "u-1@example.org");
        assert_eq!(identity.name, "User u-1");
        assert_eq!(identity.role, "hospital");
        assert_eq!(identity.phone.as_deref(), Some("+15550100"));
        assert_eq!(identity.status, AccountStatus::Active);
        assert_eq!(identity.attribute("hospital_name"), Some("St. Mary"));
    }

    #[test]
    fn test_missing_role_is_invalid() {
        let token = token_from(&json!({ "sub": "u-2", "email": "a@b.c" }));
        let claims = TokenClaims::decode(&token).unwrap();
        assert!(!claims.has_profile());
        assert!(matches!(
            claims.identity(),
            Err(SessionError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_malformed_tokens() {
        for token in ["", "abc", "a.b", "a..c", "a.!!!.c", "a.bm90IGpzb24.c"] {
            assert!(
                matches!(TokenClaims::decode(token), Err(SessionError::InvalidToken(_))),
                "token {token:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_expiry() {
        let token = token_for("u-3", "patient", 1_000);
        let claims = TokenClaims::decode(&token).unwrap();
        assert!(claims.is_expired_at(Utc.timestamp_opt(1_000, 0).unwrap()));
        assert!(!claims.is_expired_at(Utc.timestamp_opt(999, 0).unwrap()));
        assert_eq!(claims.issued_at().unwrap().timestamp(), 1_000 - 3600);
    }

    #[test]
    fn test_unknown_status_is_tolerated() {
        let token = token_from(&json!({
            "sub": "u-4",
            "user_metadata": { "role": "ambulance", "status": "archived" }
        }));
        let identity = get_profile(&token).unwrap();
        assert_eq!(identity.status, AccountStatus::Unknown);
        assert_eq!(identity.name, "");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("nurse@example.org", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("nurse@example.org"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_credentials_validation() {
        assert!(Credentials::new("a@b.c", "pw").validate().is_ok());
        assert!(Credentials::new("  ", "pw").validate().is_err());
        assert!(Credentials::new("a@b.c", "").validate().is_err());
    }
}

//! Shared helpers for HTTP integration tests

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::json;

/// Far enough in the future that tests never see it expire
pub const FAR_FUTURE: i64 = 4_102_444_800;

/// Unsigned JWT-shaped token carrying profile metadata
pub fn token_for(sub: &str, role: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = json!({
        "sub": sub,
        "email": format!("{sub}@example.org"),
        "exp": FAR_FUTURE,
        "iat": FAR_FUTURE - 3600,
        "user_metadata": { "name": "Test User", "role": role },
    });
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.c2ln")
}

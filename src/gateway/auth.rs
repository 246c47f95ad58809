//! gateway::auth
//!
//! Basic-auth user extraction. Credentials are not verified here; the user
//! name is only recorded as the deployer.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// User name from a `Basic` authorization header, if present and well formed.
pub fn basic_auth_user(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let user = match credentials.split_once(':') {
        Some((user, _password)) => user,
        None => credentials.as_str(),
    };
    (!user.is_empty()).then(|| user.to_string())
}

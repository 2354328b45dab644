//! Authorization-request URL construction
//!
//! Builds the consent URL the user opens in a browser. `access_type=offline`
//! requests a refresh token and `prompt=consent` forces the consent screen
//! even for a returning user — without it the authorization server omits the
//! refresh token on re-authorization and the store could never renew.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;

use crate::config::OAuthConfig;

/// Generate an opaque, unguessable `state` value for CSRF protection.
///
/// 32 random bytes as URL-safe base64 (no padding). The callback route must
/// see the same value back before exchanging the code.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Build the full authorization URL with all required OAuth parameters.
///
/// No side effects on persisted state — the URL is returned as an opaque
/// string for the caller to hand to the user.
pub fn build_authorization_url(config: &OAuthConfig, state: &str) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&include_granted_scopes=true&state={}",
        config.auth_uri,
        config.client_id,
        urlencoded(&config.redirect_uri),
        urlencoded(&config.scopes.join(" ")),
        state,
    )
}

/// Minimal URL encoding for parameter values.
/// Only encodes characters that would break URL parameter parsing.
fn urlencoded(s: &str) -> String {
    s.replace(' ', "%20")
        .replace(':', "%3A")
        .replace('/', "%2F")
}

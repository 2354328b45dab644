//! OAuth client configuration
//!
//! The client identity (id, secret), endpoints, redirect target, and
//! requested scopes are fixed at deployment and passed in explicitly at
//! store construction — there is no ambient, process-wide configuration.
//! The Google endpoint constants are defaults; tests and non-Google
//! deployments override them per instance.

use std::fmt;

/// Google's authorization endpoint (browser consent page).
pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google's token endpoint for code exchange and refresh grants.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Drive scopes requested at consent time. Scopes are immutable for the
/// life of a credential record — changing them requires a new consent flow.
pub const DRIVE_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/drive.file",
];

/// Static OAuth client configuration, owned by the credential store.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
    /// Where the authorization server redirects with the code, e.g.
    /// `http://127.0.0.1:8001/auth/callback`.
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    /// Configuration against Google's endpoints with the Drive scopes.
    pub fn google(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_uri: GOOGLE_AUTH_URI.into(),
            token_uri: GOOGLE_TOKEN_URI.into(),
            redirect_uri: redirect_uri.into(),
            scopes: DRIVE_SCOPES.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl fmt::Debug for OAuthConfig {
    // client_secret must never reach logs
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

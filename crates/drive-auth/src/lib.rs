//! Google OAuth2 credential lifecycle for the Drive archiver
//!
//! Manages a single persisted credential record: acquisition through the
//! authorization-code flow, validity checks against the stored expiry, and
//! transparent refresh via the refresh-token grant. This crate is a
//! standalone library with no dependency on the gateway binary — it can be
//! tested and used independently.
//!
//! Credential flow:
//! 1. Caller requests `flow::build_authorization_url()` (offline access,
//!    forced consent so a refresh token is always issued)
//! 2. User authorizes in a browser; the redirect delivers an authorization code
//! 3. Gateway calls `CredentialStore::exchange_code_for_token()` with the code
//! 4. The resulting record is persisted atomically to the token file
//! 5. `CredentialStore::access_token()` serves the stored token while valid
//!    and performs exactly one refresh-grant exchange once it expires

pub mod config;
pub mod error;
pub mod flow;
pub mod record;
pub mod store;
pub mod token;

#[cfg(test)]
pub(crate) mod testsupport;

pub use config::{DRIVE_SCOPES, GOOGLE_AUTH_URI, GOOGLE_TOKEN_URI, OAuthConfig};
pub use error::{Error, Result};
pub use flow::{build_authorization_url, generate_state};
pub use record::CredentialRecord;
pub use store::CredentialStore;
pub use token::TokenResponse;

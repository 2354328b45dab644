//! The persisted credential record
//!
//! One JSON file holds the single credential record for the deployment.
//! All writes use atomic temp-file + rename so a crash mid-write leaves
//! either the previous file or the new one, never a torn mix. The on-disk
//! field names match the layout produced by Google's client libraries so an
//! existing `token.json` can be adopted as-is.

use std::path::Path;

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OAuthConfig;
use crate::error::{Error, Result};
use crate::token::TokenResponse;

/// The single persisted OAuth2 credential record.
///
/// `expiry` is a naive UTC timestamp (no offset suffix on disk); validity
/// comparisons must use UTC "now" as well. `refresh_token` is only present
/// after a consent flow that requested offline access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Current access token (Bearer token for API calls)
    #[serde(rename = "token")]
    pub access_token: String,
    /// Long-lived refresh token; never silently dropped by a refresh
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    /// Scopes granted at consent time, immutable for the record's life
    pub scopes: Vec<String>,
    #[serde(default = "default_universe_domain")]
    pub universe_domain: String,
    /// Informational account hint, preserved across refresh
    #[serde(default)]
    pub account: String,
    /// Absolute UTC expiry of `access_token`
    #[serde(default)]
    pub expiry: Option<NaiveDateTime>,
}

fn default_universe_domain() -> String {
    "googleapis.com".into()
}

impl CredentialRecord {
    /// Build a fresh record from an authorization-code exchange response.
    pub fn from_exchange(config: &OAuthConfig, response: TokenResponse, now: NaiveDateTime) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            token_uri: config.token_uri.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scopes: config.scopes.clone(),
            universe_domain: default_universe_domain(),
            account: String::new(),
            expiry: expiry_from_delta(now, response.expires_in),
        }
    }

    /// Build the updated record after a refresh grant.
    ///
    /// Client identity, scopes, account, and universe domain carry over
    /// unchanged. The previous refresh token is kept when the server's
    /// response omits one — servers legitimately omit it on renewal.
    pub fn apply_refresh(&self, response: TokenResponse, now: NaiveDateTime) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or_else(|| self.refresh_token.clone()),
            expiry: expiry_from_delta(now, response.expires_in),
            ..self.clone()
        }
    }

    /// Strict validity check: the stored token is valid only while
    /// `now < expiry`. A record without an expiry is treated as expired.
    pub fn is_valid_at(&self, now: NaiveDateTime) -> bool {
        self.expiry.is_some_and(|expiry| now < expiry)
    }

    /// Load the record from the token file.
    ///
    /// Returns `Ok(None)` when the file does not exist (nothing persisted
    /// yet). An unreadable or unparsable file is a `Persistence` error —
    /// surfaced, never silently treated as absent.
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Persistence(format!("reading token file: {e}")))?;
        let record: CredentialRecord = serde_json::from_str(&contents)
            .map_err(|e| Error::Persistence(format!("parsing token file: {e}")))?;
        Ok(Some(record))
    }

    /// Persist the record, fully replacing any prior file.
    ///
    /// Writes to a temp file in the same directory and renames it over the
    /// target, so the file is never left partially written. Permissions are
    /// 0600 — the file holds live tokens and the client secret.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Persistence(format!("serializing record: {e}")))?;

        let dir = path
            .parent()
            .ok_or_else(|| Error::Persistence("token path has no parent directory".into()))?;
        let tmp_path = dir.join(format!(".token.tmp.{}", std::process::id()));

        tokio::fs::write(&tmp_path, json.as_bytes())
            .await
            .map_err(|e| Error::Persistence(format!("writing temp token file: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&tmp_path, perms)
                .await
                .map_err(|e| Error::Persistence(format!("setting token file permissions: {e}")))?;
        }

        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| Error::Persistence(format!("renaming temp token file: {e}")))?;

        debug!(path = %path.display(), "persisted credential record");
        Ok(())
    }
}

/// Convert the token endpoint's `expires_in` (seconds delta) into an
/// absolute UTC expiry.
fn expiry_from_delta(now: NaiveDateTime, expires_in: u64) -> Option<NaiveDateTime> {
    now.checked_add_signed(TimeDelta::seconds(expires_in.min(i64::MAX as u64) as i64))
}

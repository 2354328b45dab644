//! The credential store
//!
//! Owns the single credential record for the deployment: the in-memory copy,
//! the token file it is persisted to, and the HTTP client used against the
//! token endpoint. A tokio Mutex guards the record and is held across the
//! whole check-then-refresh sequence, so concurrent callers hitting an
//! expired record produce exactly one refresh-grant request — the rest wait
//! and observe the refreshed record. Duplicate refresh calls are not
//! guaranteed idempotent by all authorization servers and can invalidate
//! previously issued tokens.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::OAuthConfig;
use crate::error::{Error, Result};
use crate::flow;
use crate::record::CredentialRecord;
use crate::token;

/// Thread-safe manager for the persisted credential record.
pub struct CredentialStore {
    config: OAuthConfig,
    path: PathBuf,
    client: reqwest::Client,
    record: Mutex<Option<CredentialRecord>>,
}

impl CredentialStore {
    /// Open the store, loading any record persisted at `path`.
    ///
    /// `timeout` bounds every token endpoint request — an unresponsive
    /// authorization server fails the call instead of hanging the caller.
    pub async fn open(config: OAuthConfig, path: PathBuf, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("building HTTP client: {e}")))?;

        let record = CredentialRecord::load(&path).await?;
        match &record {
            Some(r) => info!(path = %path.display(), expiry = ?r.expiry, "loaded credential record"),
            None => info!(path = %path.display(), "no credential record yet, consent flow required"),
        }

        Ok(Self {
            config,
            path,
            client,
            record: Mutex::new(record),
        })
    }

    /// The authorization URL for the consent flow. Pure — no side effects on
    /// persisted state.
    pub fn authorization_url(&self, state: &str) -> String {
        flow::build_authorization_url(&self.config, state)
    }

    /// Exchange an authorization code for tokens and persist the resulting
    /// record, overwriting any prior one. Returns the new access token.
    /// Nothing is persisted when the exchange fails.
    pub async fn exchange_code_for_token(&self, code: &str) -> Result<String> {
        let response = token::exchange_code(&self.client, &self.config, code).await?;

        let mut guard = self.record.lock().await;
        let record = CredentialRecord::from_exchange(&self.config, response, Utc::now().naive_utc());
        record.save(&self.path).await?;
        let access_token = record.access_token.clone();
        info!(expiry = ?record.expiry, "credential record created from code exchange");
        *guard = Some(record);
        Ok(access_token)
    }

    /// Produce a currently-valid access token.
    ///
    /// Serves the stored token without any network round-trip while
    /// `now_utc < expiry`; otherwise performs one refresh-grant exchange and
    /// serves the renewed token. Fails with `NoCredential` when nothing is
    /// persisted yet.
    pub async fn access_token(&self) -> Result<String> {
        let mut guard = self.record.lock().await;
        let Some(record) = guard.as_ref() else {
            return Err(Error::NoCredential);
        };

        if record.is_valid_at(Utc::now().naive_utc()) {
            debug!("stored token still valid, serving without refresh");
            return Ok(record.access_token.clone());
        }

        debug!("stored token expired, refreshing");
        let updated = self.refresh_record(record).await?;
        let access_token = updated.access_token.clone();
        *guard = Some(updated);
        Ok(access_token)
    }

    /// Force a refresh-grant exchange regardless of the stored expiry and
    /// return the updated record.
    pub async fn refresh(&self) -> Result<CredentialRecord> {
        let mut guard = self.record.lock().await;
        let Some(record) = guard.as_ref() else {
            return Err(Error::Refresh("no credential record to refresh".into()));
        };

        let updated = self.refresh_record(record).await?;
        *guard = Some(updated.clone());
        Ok(updated)
    }

    /// The composite read path: the persisted record when valid, a refreshed
    /// one when expired but refreshable.
    ///
    /// This deployment is headless — when consent is required the error is
    /// surfaced (`requires_consent()`) for the HTTP layer to report, rather
    /// than opening a browser and blocking on a local redirect.
    pub async fn get_or_create_credentials(&self) -> Result<CredentialRecord> {
        let mut guard = self.record.lock().await;
        match guard.as_ref() {
            None => Err(Error::NoCredential),
            Some(record) if record.is_valid_at(Utc::now().naive_utc()) => Ok(record.clone()),
            Some(record) => {
                let updated = self.refresh_record(record).await?;
                *guard = Some(updated.clone());
                Ok(updated)
            }
        }
    }

    /// Snapshot of the current record, if any. Used by health reporting.
    pub async fn current_record(&self) -> Option<CredentialRecord> {
        self.record.lock().await.clone()
    }

    /// Perform the refresh-grant exchange and persist the updated record.
    /// Callers hold the record lock; on any failure the persisted file is
    /// left untouched.
    async fn refresh_record(&self, record: &CredentialRecord) -> Result<CredentialRecord> {
        let refresh_token = record
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                Error::Refresh("record has no refresh token — a new consent flow is required".into())
            })?;

        let response =
            token::refresh_grant(&self.client, &record.token_uri, &self.config, refresh_token)
                .await?;

        let updated = record.apply_refresh(response, Utc::now().naive_utc());
        updated.save(&self.path).await?;
        info!(expiry = ?updated.expiry, "credential record refreshed");
        Ok(updated)
    }
}

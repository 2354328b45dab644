//! OAuth token exchange and refresh grants
//!
//! The two token endpoint interactions:
//! 1. Authorization code exchange (initial consent flow completion)
//! 2. Refresh grant (non-interactive renewal with the refresh token)
//!
//! Both POST form-encoded bodies to the record's token endpoint. Transport
//! failures and 5xx responses are retried a bounded number of times with a
//! doubling delay before surfacing as `Error::Http`; 4xx responses surface
//! immediately — a rejected grant cannot self-heal and the caller must fall
//! back to a new consent flow.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::OAuthConfig;
use crate::error::{Error, Result};

/// Attempts per token endpoint call, counting the first.
const MAX_ATTEMPTS: u32 = 3;

/// Delay before the first retry; doubles each attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Response from the token endpoint for both exchange and refresh.
///
/// `expires_in` is a delta in seconds from the response time; the caller
/// converts it to an absolute UTC expiry when building the record.
/// `refresh_token` is optional: servers may omit it on refresh, and some
/// omit it on exchange when consent was not forced.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Exchange an authorization code for tokens (initial consent flow).
///
/// The code arrives out-of-band from the consent redirect. On a 4xx response
/// (invalid, expired, or already-consumed code) this fails with
/// `AuthExchange` and nothing is persisted by the caller.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &OAuthConfig,
    code: &str,
) -> Result<TokenResponse> {
    let response = post_form(
        client,
        &config.token_uri,
        &[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", &config.client_id),
            ("client_secret", &config.client_secret),
            ("redirect_uri", &config.redirect_uri),
        ],
    )
    .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        if status.is_server_error() {
            return Err(Error::Http(format!("token endpoint returned {status}: {body}")));
        }
        return Err(Error::AuthExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::AuthExchange(format!("invalid token response: {e}")))
}

/// Renew an access token with the refresh-token grant.
///
/// `token_uri` comes from the persisted record, the client identity from the
/// static config. A 4xx response (revoked consent, invalid_grant) is a
/// terminal `Refresh` error — the stored record cannot self-heal.
pub async fn refresh_grant(
    client: &reqwest::Client,
    token_uri: &str,
    config: &OAuthConfig,
    refresh_token: &str,
) -> Result<TokenResponse> {
    let response = post_form(
        client,
        token_uri,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &config.client_id),
            ("client_secret", &config.client_secret),
        ],
    )
    .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        if status.is_server_error() {
            return Err(Error::Http(format!("token endpoint returned {status}: {body}")));
        }
        return Err(Error::Refresh(format!(
            "refresh grant rejected ({status}): {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::Refresh(format!("invalid refresh response: {e}")))
}

/// POST a form body with bounded retry on transport errors and 5xx.
///
/// An unresponsive authorization server must not hang the caller — the
/// `reqwest::Client` is built with a request timeout, and timeouts count as
/// transport errors here.
async fn post_form(
    client: &reqwest::Client,
    uri: &str,
    params: &[(&str, &str)],
) -> Result<reqwest::Response> {
    let mut delay = RETRY_BASE_DELAY;
    let mut attempt = 1;
    loop {
        match client.post(uri).form(params).send().await {
            Ok(response) if response.status().is_server_error() && attempt < MAX_ATTEMPTS => {
                warn!(status = %response.status(), attempt, "token endpoint returned server error, retrying");
            }
            Ok(response) => return Ok(response),
            Err(e) if attempt < MAX_ATTEMPTS => {
                warn!(error = %e, attempt, "token endpoint request failed, retrying");
            }
            Err(e) => {
                return Err(Error::Http(format!(
                    "token endpoint request failed after {MAX_ATTEMPTS} attempts: {e}"
                )));
            }
        }
        tokio::time::sleep(delay).await;
        delay *= 2;
        attempt += 1;
    }
}

//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The OAuth client secret is loaded from the OAUTH_CLIENT_SECRET env var or
//! client_secret_file, never stored in the TOML directly to avoid leaking
//! secrets.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub oauth: OAuthSection,
    pub storage: StorageConfig,
    pub drive: DriveConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// OAuth client identity and endpoints
#[derive(Debug, Deserialize)]
pub struct OAuthSection {
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to the
    /// OAUTH_CLIENT_SECRET env var)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    /// Where the authorization server redirects with the code — must point
    /// back at this gateway's /auth/callback route
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

/// Credential record persistence
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    pub token_path: PathBuf,
}

/// Folder identifiers handed to the transfer pipeline. Read once at startup;
/// the gateway only validates presence.
#[derive(Debug, Deserialize)]
pub struct DriveConfig {
    pub source_folder_id: String,
    pub destination_folder_id: String,
}

fn default_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    256
}

fn default_auth_uri() -> String {
    drive_auth::GOOGLE_AUTH_URI.into()
}

fn default_token_uri() -> String {
    drive_auth::GOOGLE_TOKEN_URI.into()
}

fn default_scopes() -> Vec<String> {
    drive_auth::DRIVE_SCOPES
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client secret resolution order:
    /// 1. OAUTH_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.server.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if !config.oauth.redirect_uri.starts_with("http://")
            && !config.oauth.redirect_uri.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "redirect_uri must start with http:// or https://, got: {}",
                config.oauth.redirect_uri
            )));
        }

        if config.oauth.scopes.is_empty() {
            return Err(common::Error::Config(
                "at least one OAuth scope is required".into(),
            ));
        }

        if config.drive.source_folder_id.is_empty() || config.drive.destination_folder_id.is_empty()
        {
            return Err(common::Error::Config(
                "source_folder_id and destination_folder_id must be set".into(),
            ));
        }

        // Resolve client secret: env var takes precedence over file
        if let Ok(secret) = std::env::var("OAUTH_CLIENT_SECRET") {
            config.oauth.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.oauth.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.oauth.client_secret = Some(Secret::new(secret));
            }
        }

        if config.oauth.client_secret.is_none() {
            return Err(common::Error::Config(
                "no client secret — set OAUTH_CLIENT_SECRET or client_secret_file".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("drive-auth-gateway.toml")
    }

    /// The OAuth client configuration handed to the credential store.
    pub fn oauth_config(&self) -> drive_auth::OAuthConfig {
        drive_auth::OAuthConfig {
            client_id: self.oauth.client_id.clone(),
            client_secret: self
                .oauth
                .client_secret
                .as_ref()
                .map(|s| s.expose().clone())
                .unwrap_or_default(),
            auth_uri: self.oauth.auth_uri.clone(),
            token_uri: self.oauth.token_uri.clone(),
            redirect_uri: self.oauth.redirect_uri.clone(),
            scopes: self.oauth.scopes.clone(),
        }
    }
}

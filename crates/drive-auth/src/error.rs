//! Error types for credential lifecycle operations

/// Errors from credential lifecycle operations.
///
/// `NoCredential`, `AuthExchange`, and `Refresh` all mean the holder must
/// (re-)run the consent flow; `Http` covers transient transport failures
/// that are safe to retry; `Persistence` means the token file itself is
/// unreadable or unwritable and is fatal for this component.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no credential record persisted — complete the consent flow first")]
    NoCredential,

    #[error("authorization code exchange failed: {0}")]
    AuthExchange(String),

    #[error("token refresh failed: {0}")]
    Refresh(String),

    #[error("token file error: {0}")]
    Persistence(String),

    #[error("HTTP request failed: {0}")]
    Http(String),
}

impl Error {
    /// Whether this failure requires a new interactive consent flow, as
    /// opposed to a transient condition the caller may simply retry.
    pub fn requires_consent(&self) -> bool {
        matches!(
            self,
            Error::NoCredential | Error::AuthExchange(_) | Error::Refresh(_)
        )
    }
}

/// Result alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Shared configuration and I/O error types

use thiserror::Error;

/// Errors shared across the workspace, mostly from config loading.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using the shared Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_carries_message() {
        let err = Error::Config("missing [oauth] section".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: missing [oauth] section"
        );
    }

    #[test]
    fn io_error_converts_via_from() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io.into();
        assert!(err.to_string().starts_with("I/O error:"), "got: {err}");
    }

    #[test]
    fn debug_output_names_the_variant() {
        let err = Error::Config("bad".into());
        let debug = format!("{err:?}");
        assert!(debug.contains("Config"), "got: {debug}");
    }
}

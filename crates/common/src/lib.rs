//! Shared types for the Drive archiver services

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;

//! Error types for configuration loading

use thiserror::Error;

/// Result type alias using the common error
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {name}: {value} ({reason})")]
    InvalidVar {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Unsupported browser: {0}")]
    UnsupportedBrowser(String),
}

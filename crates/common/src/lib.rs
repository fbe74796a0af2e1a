//! Bookcheck Common Library
//!
//! Configuration and error types shared by the API and UI suites.

pub mod config;
pub mod error;

pub use config::{
    ApiConfig, BrowserConfig, BrowserKind, Credentials, Settings, UiConfig, DEFAULT_STEP_TIMEOUT,
};
pub use error::{Error, Result};

/// Bookcheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Error types for E2E testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Configuration error: {0}")]
    Config(#[from] bookcheck_common::Error),

    #[error("API error: {0}")]
    Api(#[from] bookcheck_api::ApiError),

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Driver protocol error: {0}")]
    Protocol(String),

    #[error("Feature parse error in {path}: {reason}")]
    FeatureParse { path: String, reason: String },

    #[error("Undefined step: {0}")]
    UndefinedStep(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;

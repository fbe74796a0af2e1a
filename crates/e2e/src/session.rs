//! Per-scenario browser session fixture
//!
//! A session is opened before a scenario's first step and closed after its
//! last one, whatever the outcome. Sessions are never reused, so every
//! scenario starts from an unused page.

use async_trait::async_trait;
use tracing::{debug, warn};

use bookcheck_common::BrowserConfig;

use crate::error::E2eResult;
use crate::playwright::Page;

/// One browser plus one page, owned by a single scenario
pub struct BrowserSession {
    page: Page,
}

impl BrowserSession {
    /// Launch a fresh browser and open a page
    pub async fn open(config: &BrowserConfig) -> E2eResult<Self> {
        let page = Page::launch(config).await?;
        debug!("Browser session opened");
        Ok(Self { page })
    }

    /// Wrap an already-open page
    pub fn from_page(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Close page and browser; failures are logged, not retried
    pub async fn close(self) {
        match self.page.close().await {
            Ok(()) => debug!("Browser session closed"),
            Err(e) => warn!("Browser session did not close cleanly: {}", e),
        }
    }
}

/// Source of fresh sessions for the runner
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> E2eResult<BrowserSession>;
}

/// Launches real Playwright browsers
pub struct PlaywrightLauncher {
    config: BrowserConfig,
}

impl PlaywrightLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionLauncher for PlaywrightLauncher {
    async fn launch(&self) -> E2eResult<BrowserSession> {
        BrowserSession::open(&self.config).await
    }
}

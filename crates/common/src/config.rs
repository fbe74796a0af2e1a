//! Suite configuration loaded from the process environment
//!
//! Everything is read once per process. A `.env` file in the working
//! directory (or any parent) is loaded first, so local runs do not need
//! exported variables.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Default budget for a single UI step or API test body
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default auto-wait budget for locator expectations
pub const DEFAULT_EXPECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Delay between browser actions when running headed
pub const HEADED_SLOW_MO_MS: u64 = 100;

pub const ENV_API_BASE_URL: &str = "API_BASE_URL";
pub const ENV_UI_BASE_URL: &str = "UI_BASE_URL";
pub const ENV_TEST_USER_USERNAME: &str = "TEST_USER_USERNAME";
pub const ENV_TEST_USER_PASSWORD: &str = "TEST_USER_PASSWORD";
pub const ENV_HEADLESS: &str = "HEADLESS";
pub const ENV_API_USERNAME: &str = "API_USERNAME";
pub const ENV_API_PASSWORD: &str = "API_PASSWORD";
pub const ENV_BROWSER: &str = "BROWSER";
pub const ENV_STEP_TIMEOUT_MS: &str = "STEP_TIMEOUT_MS";
pub const ENV_PLAYWRIGHT_DIR: &str = "PLAYWRIGHT_DIR";

/// Browser engine used for UI scenarios
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
        }
    }
}

impl FromStr for BrowserKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(BrowserKind::Chromium),
            "firefox" => Ok(BrowserKind::Firefox),
            "webkit" => Ok(BrowserKind::Webkit),
            other => Err(Error::UnsupportedBrowser(other.to_string())),
        }
    }
}

/// Username/password pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Booking/auth REST service settings
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Service root, e.g. `https://restful-booker.herokuapp.com`
    pub base_url: Option<String>,

    /// Credentials accepted by `POST /auth`
    pub admin: Credentials,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Default::default()
        }
    }

    /// Configured base URL, or an error naming the missing variable
    pub fn base_url(&self) -> Result<&str> {
        self.base_url
            .as_deref()
            .ok_or(Error::MissingVar(ENV_API_BASE_URL))
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            admin: Credentials::new("admin", "password123"),
        }
    }
}

/// Login UI settings
#[derive(Debug, Clone, Default)]
pub struct UiConfig {
    /// Login page entry point
    pub base_url: Option<String>,

    /// A registered user that can log in
    pub user: Option<Credentials>,
}

impl UiConfig {
    pub fn base_url(&self) -> Result<&str> {
        self.base_url
            .as_deref()
            .ok_or(Error::MissingVar(ENV_UI_BASE_URL))
    }

    pub fn user(&self) -> Result<&Credentials> {
        self.user
            .as_ref()
            .ok_or(Error::MissingVar(ENV_TEST_USER_USERNAME))
    }
}

/// Browser launch settings
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub kind: BrowserKind,
    pub headless: bool,
    pub slow_mo_ms: u64,

    /// Directory whose `node_modules` provides `playwright`
    pub driver_dir: PathBuf,

    /// Where failure screenshots are written
    pub screenshot_dir: PathBuf,

    pub launch_timeout: Duration,
    pub expect_timeout: Duration,
}

impl BrowserConfig {
    /// Toggle headless mode; headed runs are slowed down so they can be watched
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self.slow_mo_ms = if headless { 0 } else { HEADED_SLOW_MO_MS };
        self
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            kind: BrowserKind::Chromium,
            headless: true,
            slow_mo_ms: 0,
            driver_dir: PathBuf::from("."),
            screenshot_dir: PathBuf::from("test-results/screenshots"),
            launch_timeout: DEFAULT_STEP_TIMEOUT,
            expect_timeout: DEFAULT_EXPECT_TIMEOUT,
        }
    }
}

/// Complete suite settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub api: ApiConfig,
    pub ui: UiConfig,
    pub browser: BrowserConfig,
    pub step_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            ui: UiConfig::default(),
            browser: BrowserConfig::default(),
            step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }
}

impl Settings {
    /// Load `.env` (if any) and read settings from the process environment
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let defaults = ApiConfig::default();
        let api = ApiConfig {
            base_url: var(ENV_API_BASE_URL),
            admin: Credentials::new(
                var(ENV_API_USERNAME).unwrap_or(defaults.admin.username),
                var(ENV_API_PASSWORD).unwrap_or(defaults.admin.password),
            ),
        };

        let user = match (var(ENV_TEST_USER_USERNAME), var(ENV_TEST_USER_PASSWORD)) {
            (Some(username), Some(password)) => Some(Credentials::new(username, password)),
            (Some(_), None) => return Err(Error::MissingVar(ENV_TEST_USER_PASSWORD)),
            (None, Some(_)) => return Err(Error::MissingVar(ENV_TEST_USER_USERNAME)),
            (None, None) => None,
        };
        let ui = UiConfig {
            base_url: var(ENV_UI_BASE_URL),
            user,
        };

        let kind = match var(ENV_BROWSER) {
            Some(name) => name.parse()?,
            None => BrowserKind::default(),
        };

        let step_timeout = match var(ENV_STEP_TIMEOUT_MS) {
            Some(raw) => Duration::from_millis(raw.trim().parse().map_err(
                |e: std::num::ParseIntError| Error::InvalidVar {
                    name: ENV_STEP_TIMEOUT_MS,
                    value: raw.clone(),
                    reason: e.to_string(),
                },
            )?),
            None => DEFAULT_STEP_TIMEOUT,
        };

        let mut browser = BrowserConfig {
            kind,
            launch_timeout: step_timeout,
            ..Default::default()
        }
        .with_headless(is_headless(lookup(ENV_HEADLESS).as_deref()));
        if let Some(dir) = var(ENV_PLAYWRIGHT_DIR) {
            browser.driver_dir = PathBuf::from(dir);
        }

        Ok(Self {
            api,
            ui,
            browser,
            step_timeout,
        })
    }
}

/// Only the literal `"false"` turns headless mode off
pub fn is_headless(value: Option<&str>) -> bool {
    value != Some("false")
}

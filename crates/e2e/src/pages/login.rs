//! Login screen page object

use bookcheck_common::UiConfig;

use crate::error::E2eResult;
use crate::playwright::{Locator, Page};

pub const USERNAME_INPUT: &str = r#"input[name="username"]"#;
pub const PASSWORD_INPUT: &str = r#"input[name="password"]"#;
pub const SUBMIT_BUTTON: &str = r#"input[value="Log In"]"#;
pub const ERROR_REGION: &str = "#rightPanel .error";
pub const LOGGED_IN_MARKER: &str = "text=Accounts Overview";

pub struct LoginPage<'a> {
    page: &'a Page,
    ui: &'a UiConfig,
}

impl<'a> LoginPage<'a> {
    pub fn new(page: &'a Page, ui: &'a UiConfig) -> Self {
        Self { page, ui }
    }

    /// Navigate to the configured login entry point
    pub async fn goto(&self) -> E2eResult<()> {
        self.page.goto(self.ui.base_url()?).await
    }

    pub async fn login(&self, username: &str, password: &str) -> E2eResult<()> {
        self.page.fill(USERNAME_INPUT, username).await?;
        self.page.fill(PASSWORD_INPUT, password).await?;
        self.page.click(SUBMIT_BUTTON).await
    }

    pub fn login_error(&self) -> Locator<'a> {
        self.page.locator(ERROR_REGION)
    }

    /// Visible only once a login succeeded
    pub fn logged_in_marker(&self) -> Locator<'a> {
        self.page.locator(LOGGED_IN_MARKER)
    }
}

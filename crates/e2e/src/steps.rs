//! Step definitions for UI scenarios
//!
//! Phrases are bound to handlers in an explicit [`StepRegistry`]. Every step
//! of a scenario is resolved before the scenario starts, so a typo in a
//! feature file fails fast instead of after a browser was launched.

use std::collections::HashMap;

use futures::future::BoxFuture;
use tracing::warn;

use bookcheck_common::UiConfig;

use crate::error::{E2eError, E2eResult};
use crate::feature::ScenarioSpec;
use crate::pages::LoginPage;
use crate::playwright::Page;
use crate::session::BrowserSession;

/// Text shown by the login screen after a rejected login
pub const LOGIN_ERROR_TEXT: &str = "The username and password could not be verified.";

const INVALID_USERNAME: &str = "invalid";
const INVALID_PASSWORD: &str = "wrongpass";

pub type StepFuture<'a> = BoxFuture<'a, E2eResult<()>>;
pub type StepHandler = for<'a> fn(&'a mut ScenarioContext) -> StepFuture<'a>;

/// State handed to every step of one scenario
pub struct ScenarioContext {
    session: BrowserSession,
    ui: UiConfig,
}

impl ScenarioContext {
    pub fn new(session: BrowserSession, ui: UiConfig) -> Self {
        Self { session, ui }
    }

    pub fn page(&self) -> &Page {
        self.session.page()
    }

    pub fn ui(&self) -> &UiConfig {
        &self.ui
    }

    pub fn login_page(&self) -> LoginPage<'_> {
        LoginPage::new(self.session.page(), &self.ui)
    }

    pub fn into_session(self) -> BrowserSession {
        self.session
    }
}

/// A step bound to its handler
#[derive(Clone)]
pub struct ResolvedStep {
    pub label: String,
    pub handler: StepHandler,
}

/// Phrase to handler table
#[derive(Default)]
pub struct StepRegistry {
    handlers: HashMap<String, StepHandler>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every login step
    pub fn with_login_steps() -> Self {
        let mut registry = Self::new();
        registry
            .register("I open the login page", open_login_page)
            .register("I enter valid credentials", enter_valid_credentials)
            .register("I enter invalid credentials", enter_invalid_credentials)
            .register("I should be logged in successfully", expect_logged_in)
            .register("I should see a login error message", expect_login_error);
        registry
    }

    pub fn register(&mut self, phrase: &str, handler: StepHandler) -> &mut Self {
        if self
            .handlers
            .insert(phrase.trim().to_string(), handler)
            .is_some()
        {
            warn!("Step '{}' registered twice; keeping the last handler", phrase);
        }
        self
    }

    pub fn get(&self, phrase: &str) -> Option<StepHandler> {
        self.handlers.get(phrase.trim()).copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Bind every step of `scenario`, reporting all unknown phrases at once
    pub fn resolve(&self, scenario: &ScenarioSpec) -> E2eResult<Vec<ResolvedStep>> {
        let mut resolved = Vec::with_capacity(scenario.steps.len());
        let mut undefined = Vec::new();

        for step in &scenario.steps {
            match self.get(&step.text) {
                Some(handler) => resolved.push(ResolvedStep {
                    label: step.label(),
                    handler,
                }),
                None => undefined.push(format!("'{}'", step.label())),
            }
        }

        if undefined.is_empty() {
            Ok(resolved)
        } else {
            Err(E2eError::UndefinedStep(undefined.join(", ")))
        }
    }
}

fn open_login_page(ctx: &mut ScenarioContext) -> StepFuture<'_> {
    Box::pin(async move { ctx.login_page().goto().await })
}

fn enter_valid_credentials(ctx: &mut ScenarioContext) -> StepFuture<'_> {
    Box::pin(async move {
        let user = ctx.ui().user()?;
        ctx.login_page()
            .login(&user.username, &user.password)
            .await
    })
}

fn enter_invalid_credentials(ctx: &mut ScenarioContext) -> StepFuture<'_> {
    Box::pin(async move {
        ctx.login_page()
            .login(INVALID_USERNAME, INVALID_PASSWORD)
            .await
    })
}

fn expect_logged_in(ctx: &mut ScenarioContext) -> StepFuture<'_> {
    Box::pin(async move { ctx.login_page().logged_in_marker().expect_visible().await })
}

fn expect_login_error(ctx: &mut ScenarioContext) -> StepFuture<'_> {
    Box::pin(async move {
        ctx.login_page()
            .login_error()
            .expect_contains_text(LOGIN_ERROR_TEXT)
            .await
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::StepSpec;

    fn scenario(phrases: &[&str]) -> ScenarioSpec {
        ScenarioSpec {
            feature: "Login".to_string(),
            name: "sample".to_string(),
            tags: vec![],
            steps: phrases
                .iter()
                .map(|p| StepSpec {
                    keyword: "Given".to_string(),
                    text: p.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_login_steps_are_registered() {
        let registry = StepRegistry::with_login_steps();
        assert_eq!(registry.len(), 5);
        assert!(registry.get("I open the login page").is_some());
        assert!(registry.get("  I enter valid credentials ").is_some());
        assert!(registry.get("I open the logout page").is_none());
    }

    #[test]
    fn test_resolve_keeps_order() {
        let registry = StepRegistry::with_login_steps();
        let steps = registry
            .resolve(&scenario(&[
                "I open the login page",
                "I enter invalid credentials",
                "I should see a login error message",
            ]))
            .unwrap();
        let labels: Vec<_> = steps.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            [
                "Given I open the login page",
                "Given I enter invalid credentials",
                "Given I should see a login error message"
            ]
        );
    }

    #[test]
    fn test_resolve_reports_every_undefined_step() {
        let registry = StepRegistry::with_login_steps();
        let err = registry
            .resolve(&scenario(&[
                "I open the login page",
                "I dance",
                "I sing",
            ]))
            .err()
            .unwrap();
        let message = err.to_string();
        assert!(message.contains("I dance"), "{}", message);
        assert!(message.contains("I sing"), "{}", message);
    }
}

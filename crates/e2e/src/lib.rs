//! Bookcheck E2E Test Framework
//!
//! This crate runs two kinds of tests from Rust:
//! - UI login scenarios written in Gherkin, driven through Playwright
//! - booking/auth API suites with explicit setup and cleanup hooks
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── load_scenarios() -> [ScenarioSpec]   (gherkin)       │
//! │    ├── run_scenario(spec, registry, launcher) -> TestResult │
//! │    │     ├── StepRegistry::resolve()  before launch         │
//! │    │     ├── SessionLauncher::launch() -> BrowserSession    │
//! │    │     ├── step handlers -> LoginPage -> Page (driver)    │
//! │    │     └── BrowserSession::close()  always                │
//! │    └── run_suite(Suite<C>, ApiConfig) -> [TestResult]       │
//! │          ├── before_all  -> C (ApiClient inside)            │
//! │          └── before_each / case / after_each                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Page ── JSON lines ── node driver ── Playwright browser    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod expect;
pub mod feature;
pub mod pages;
pub mod playwright;
pub mod runner;
pub mod session;
pub mod steps;
pub mod suites;

pub use error::{E2eError, E2eResult};
pub use feature::{FeatureFile, ScenarioSpec, StepSpec};
pub use runner::{RunnerConfig, Selection, TestResult, TestRunner, TestSuiteResult};
pub use session::{BrowserSession, PlaywrightLauncher, SessionLauncher};
pub use steps::{ScenarioContext, StepRegistry};

//! Runner that executes UI scenarios and API suites and aggregates results

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use bookcheck_common::{ApiConfig, Settings, UiConfig, DEFAULT_STEP_TIMEOUT};

use crate::error::{E2eError, E2eResult};
use crate::feature::{FeatureFile, ScenarioSpec};
use crate::session::SessionLauncher;
use crate::steps::{ScenarioContext, StepRegistry};
use crate::suites::{auth, booking, Suite};

/// Result of one step or hook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub screenshot_path: Option<String>,
}

/// Result of running a single test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
}

impl TestResult {
    fn failed(name: String, started: Instant, steps: Vec<StepResult>, error: String) -> Self {
        Self {
            name,
            success: false,
            duration_ms: elapsed_ms(started),
            steps,
            error: Some(error),
        }
    }
}

/// Result of running all tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn from_results(started_at: DateTime<Utc>, duration: Duration, results: Vec<TestResult>) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            started_at,
            duration_ms: duration.as_millis() as u64,
            results,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub features_dir: PathBuf,
    pub output_dir: PathBuf,
    pub screenshot_dir: PathBuf,

    /// Upper bound for every UI step and API case body
    pub step_timeout: Duration,

    /// Only run scenarios carrying this tag
    pub tag: Option<String>,

    /// Only run tests whose name contains this text
    pub name_filter: Option<String>,

    pub ui: UiConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            features_dir: PathBuf::from("features"),
            output_dir: PathBuf::from("test-results"),
            screenshot_dir: PathBuf::from("test-results/screenshots"),
            step_timeout: DEFAULT_STEP_TIMEOUT,
            tag: None,
            name_filter: None,
            ui: UiConfig::default(),
        }
    }
}

impl RunnerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            screenshot_dir: settings.browser.screenshot_dir.clone(),
            step_timeout: settings.step_timeout,
            ui: settings.ui.clone(),
            ..Default::default()
        }
    }
}

/// Sequential test runner; one failing test never stops the others
pub struct TestRunner {
    config: RunnerConfig,
}

impl TestRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    fn selected(&self, name: &str) -> bool {
        self.config
            .name_filter
            .as_deref()
            .map_or(true, |filter| name.contains(filter))
    }

    /// Scenarios below the features directory that pass the tag/name filters
    pub fn load_scenarios(&self) -> E2eResult<Vec<ScenarioSpec>> {
        let features = FeatureFile::load_all(&self.config.features_dir)?;
        let scenarios: Vec<ScenarioSpec> =
            FeatureFile::scenarios_tagged(&features, self.config.tag.as_deref())
                .filter(|s| self.selected(&s.full_name()))
                .cloned()
                .collect();
        debug!(
            "Loaded {} scenario(s) from {}",
            scenarios.len(),
            self.config.features_dir.display()
        );
        Ok(scenarios)
    }

    /// Run scenarios one after another
    pub async fn run_scenarios(
        &self,
        scenarios: &[ScenarioSpec],
        registry: &StepRegistry,
        launcher: &dyn SessionLauncher,
    ) -> Vec<TestResult> {
        info!("Running {} scenario(s)...", scenarios.len());
        let mut results = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            let result = self.run_scenario(scenario, registry, launcher).await;
            log_result(&result);
            results.push(result);
        }
        results
    }

    /// Run a single scenario in a fresh browser session
    ///
    /// Steps are bound before launch; the session is closed whatever the
    /// outcome.
    pub async fn run_scenario(
        &self,
        scenario: &ScenarioSpec,
        registry: &StepRegistry,
        launcher: &dyn SessionLauncher,
    ) -> TestResult {
        let start = Instant::now();
        let name = scenario.full_name();
        debug!("Running scenario: {}", name);

        let steps = match registry.resolve(scenario) {
            Ok(steps) => steps,
            Err(e) => return TestResult::failed(name, start, vec![], e.to_string()),
        };
        if let Err(e) = self.config.ui.base_url() {
            return TestResult::failed(name, start, vec![], E2eError::from(e).to_string());
        }

        let session = match launcher.launch().await {
            Ok(session) => session,
            Err(e) => return TestResult::failed(name, start, vec![], e.to_string()),
        };
        let mut ctx = ScenarioContext::new(session, self.config.ui.clone());

        let mut step_results = Vec::with_capacity(steps.len());
        let mut test_error = None;

        for step in &steps {
            let step_start = Instant::now();
            let outcome = match timeout(self.config.step_timeout, (step.handler)(&mut ctx)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(E2eError::Timeout(format!(
                    "step '{}' ({} ms)",
                    step.label,
                    self.config.step_timeout.as_millis()
                ))),
            };

            match outcome {
                Ok(()) => {
                    debug!("  ✓ {}", step.label);
                    step_results.push(StepResult {
                        name: step.label.clone(),
                        success: true,
                        duration_ms: elapsed_ms(step_start),
                        error: None,
                        screenshot_path: None,
                    });
                }
                Err(e) => {
                    debug!("  ✗ {} - {}", step.label, e);
                    let screenshot = self.failure_screenshot(&ctx, &name).await;
                    step_results.push(StepResult {
                        name: step.label.clone(),
                        success: false,
                        duration_ms: elapsed_ms(step_start),
                        error: Some(e.to_string()),
                        screenshot_path: screenshot.map(|p| p.to_string_lossy().into_owned()),
                    });
                    test_error = Some(format!("{}: {}", step.label, e));
                    break;
                }
            }
        }

        ctx.into_session().close().await;

        match test_error {
            Some(error) => TestResult::failed(name, start, step_results, error),
            None => TestResult {
                name,
                success: true,
                duration_ms: elapsed_ms(start),
                steps: step_results,
                error: None,
            },
        }
    }

    /// Best-effort screenshot of the page at the moment a step failed
    async fn failure_screenshot(&self, ctx: &ScenarioContext, test_name: &str) -> Option<PathBuf> {
        let path = self
            .config
            .screenshot_dir
            .join(format!("{}.png", file_stem(test_name)));
        if let Err(e) = std::fs::create_dir_all(&self.config.screenshot_dir) {
            warn!("Cannot create {}: {}", self.config.screenshot_dir.display(), e);
            return None;
        }

        match timeout(self.config.step_timeout, ctx.page().screenshot(&path)).await {
            Ok(Ok(())) => Some(path),
            Ok(Err(e)) => {
                warn!("Failure screenshot not taken: {}", e);
                None
            }
            Err(_) => {
                warn!("Failure screenshot timed out");
                None
            }
        }
    }

    /// Run every selected case of an API suite
    ///
    /// A failed `before_all` fails every case. `after_each` runs after every
    /// case whose `before_each` ran, and its failure fails the case.
    pub async fn run_suite<C: Send>(&self, suite: &Suite<C>, api: &ApiConfig) -> Vec<TestResult> {
        let cases: Vec<_> = suite
            .cases
            .iter()
            .filter(|case| self.selected(&suite.case_name(case)))
            .collect();
        if cases.is_empty() {
            return vec![];
        }
        info!("Running suite '{}' ({} case(s))...", suite.name, cases.len());

        let setup_start = Instant::now();
        let mut ctx = match self.bounded("before_all", (suite.before_all)(api)).await {
            Ok(ctx) => ctx,
            Err(e) => {
                error!("✗ {} setup - {}", suite.name, e);
                return cases
                    .iter()
                    .map(|case| {
                        TestResult::failed(
                            suite.case_name(case),
                            setup_start,
                            vec![],
                            format!("before_all: {}", e),
                        )
                    })
                    .collect();
            }
        };

        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            let start = Instant::now();
            let name = suite.case_name(case);
            let mut steps = Vec::new();
            let mut test_error = None;

            let prepared = match suite.before_each {
                Some(hook) => self.run_hook("before_each", hook, &mut ctx, &mut steps).await,
                None => Ok(()),
            };

            match prepared {
                Ok(()) => {
                    if let Err(e) = self.run_hook(case.name, case.run, &mut ctx, &mut steps).await {
                        test_error = Some(e.to_string());
                    }
                    if let Some(hook) = suite.after_each {
                        if let Err(e) = self.run_hook("after_each", hook, &mut ctx, &mut steps).await {
                            test_error.get_or_insert_with(|| format!("after_each: {}", e));
                        }
                    }
                }
                Err(e) => test_error = Some(format!("before_each: {}", e)),
            }

            let result = match test_error {
                Some(error) => TestResult::failed(name, start, steps, error),
                None => TestResult {
                    name,
                    success: true,
                    duration_ms: elapsed_ms(start),
                    steps,
                    error: None,
                },
            };
            log_result(&result);
            results.push(result);
        }
        results
    }

    async fn run_hook<C: Send>(
        &self,
        label: &str,
        hook: crate::suites::Hook<C>,
        ctx: &mut C,
        steps: &mut Vec<StepResult>,
    ) -> E2eResult<()> {
        let start = Instant::now();
        let outcome = self.bounded(label, hook(ctx)).await;
        steps.push(StepResult {
            name: label.to_string(),
            success: outcome.is_ok(),
            duration_ms: elapsed_ms(start),
            error: outcome.as_ref().err().map(|e| e.to_string()),
            screenshot_path: None,
        });
        outcome
    }

    async fn bounded<T, F>(&self, label: &str, fut: F) -> E2eResult<T>
    where
        F: std::future::Future<Output = E2eResult<T>>,
    {
        match timeout(self.config.step_timeout, fut).await {
            Ok(outcome) => outcome,
            Err(_) => Err(E2eError::Timeout(format!(
                "{} ({} ms)",
                label,
                self.config.step_timeout.as_millis()
            ))),
        }
    }

    /// Run the selected scenarios and suites and summarise them
    ///
    /// Targets without a base URL are not skipped; their tests fail with
    /// the missing variable.
    pub async fn run_selected(
        &self,
        selection: Selection,
        api: &ApiConfig,
        registry: &StepRegistry,
        launcher: &dyn SessionLauncher,
    ) -> E2eResult<TestSuiteResult> {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut results = Vec::new();

        if selection.includes_ui() {
            let scenarios = self.load_scenarios()?;
            results.extend(self.run_scenarios(&scenarios, registry, launcher).await);
        }
        if selection.includes_api() {
            results.extend(self.run_suite(&auth::suite(), api).await);
            results.extend(self.run_suite(&booking::suite(), api).await);
        }

        let summary = TestSuiteResult::from_results(started_at, start.elapsed(), results);
        info!("");
        info!(
            "Test Results: {} passed, {} failed ({} ms)",
            summary.passed, summary.failed, summary.duration_ms
        );
        Ok(summary)
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        write_results(&self.config.output_dir, results)
    }
}

/// Which tests a run covers
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Selection {
    Ui,
    Api,
    All,
}

impl Selection {
    pub fn includes_ui(self) -> bool {
        matches!(self, Selection::Ui | Selection::All)
    }

    pub fn includes_api(self) -> bool {
        matches!(self, Selection::Api | Selection::All)
    }
}

/// Write `test-results.json` into `output_dir`
pub fn write_results(output_dir: &Path, results: &TestSuiteResult) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let path = output_dir.join("test-results.json");
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

fn log_result(result: &TestResult) {
    if result.success {
        info!("✓ {} ({} ms)", result.name, result.duration_ms);
    } else {
        error!(
            "✗ {} - {}",
            result.name,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Test name reduced to a portable file name
fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let stem = stem
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if stem.is_empty() {
        "scenario".to_string()
    } else {
        stem
    }
}

//! API suites against the in-process booking service

use std::time::Duration;

use futures::future::BoxFuture;

use bookcheck_common::{ApiConfig, BrowserConfig, Credentials};
use bookcheck_e2e::suites::{auth, booking, Case, Suite};
use bookcheck_e2e::{
    ensure, E2eResult, PlaywrightLauncher, RunnerConfig, Selection, StepRegistry, TestRunner,
};
use bookcheck_testkit::{BookerOptions, FakeBooker};

fn runner() -> TestRunner {
    TestRunner::new(RunnerConfig {
        step_timeout: Duration::from_secs(10),
        ..Default::default()
    })
}

#[tokio::test]
async fn test_auth_suite_passes() {
    let service = FakeBooker::start().await.unwrap();
    let api = ApiConfig::new(service.base_url());

    let results = runner().run_suite(&auth::suite(), &api).await;

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.success), "{:#?}", results);
}

#[tokio::test]
async fn test_booking_suite_passes_and_cleans_up() {
    let service = FakeBooker::start().await.unwrap();
    let api = ApiConfig::new(service.base_url());

    let results = runner().run_suite(&booking::suite(), &api).await;

    assert_eq!(results.len(), 14);
    assert!(results.iter().all(|r| r.success), "{:#?}", results);
    for result in &results {
        let hooks: Vec<_> = result.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(hooks.first(), Some(&"before_each"), "{}", result.name);
        assert_eq!(hooks.last(), Some(&"after_each"), "{}", result.name);
    }
    assert_eq!(service.booking_count(), 0);
}

/// Run the booking suite against a service with changed quirks and
/// return the names of the failed cases
async fn failed_booking_cases(options: BookerOptions) -> Vec<String> {
    let service = FakeBooker::start_with(options).await.unwrap();
    let api = ApiConfig::new(service.base_url());

    let results = runner().run_suite(&booking::suite(), &api).await;

    assert_eq!(results.len(), 14);
    let failed: Vec<_> = results.iter().filter(|r| !r.success).collect();
    for result in &failed {
        let cleanup = result.steps.last().unwrap();
        assert_eq!(cleanup.name, "after_each", "{}", result.name);
        assert!(cleanup.success, "{}: {:?}", result.name, cleanup.error);
        let error = result.error.as_deref().unwrap_or_default();
        assert!(error.contains("expected HTTP"), "{}", error);
    }
    assert_eq!(service.booking_count(), 0);
    failed.iter().map(|r| r.name.clone()).collect()
}

#[tokio::test]
async fn test_incomplete_create_accepted_is_caught() {
    let failed = failed_booking_cases(BookerOptions {
        incomplete_create_status: 400,
        ..Default::default()
    })
    .await;

    assert_eq!(
        failed,
        ["Booking API > returns 500 for a create with missing fields"]
    );
}

#[tokio::test]
async fn test_missing_delete_answering_404_is_caught() {
    let failed = failed_booking_cases(BookerOptions {
        missing_delete_status: 404,
        ..Default::default()
    })
    .await;

    assert_eq!(
        failed,
        ["Booking API > returns 405 when deleting a missing booking"]
    );
}

#[tokio::test]
async fn test_name_filter_selects_cases() {
    let service = FakeBooker::start().await.unwrap();
    let api = ApiConfig::new(service.base_url());
    let runner = TestRunner::new(RunnerConfig {
        name_filter: Some("PATCH".to_string()),
        ..Default::default()
    });

    let results = runner.run_suite(&booking::suite(), &api).await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success), "{:#?}", results);
}

#[tokio::test]
async fn test_missing_base_url_fails_every_case() {
    let results = runner()
        .run_suite(&booking::suite(), &ApiConfig::default())
        .await;

    assert_eq!(results.len(), 14);
    for result in &results {
        assert!(!result.success);
        let error = result.error.as_deref().unwrap_or_default();
        assert!(error.contains("API_BASE_URL"), "{}", error);
    }
}

#[tokio::test]
async fn test_unconfigured_api_run_is_not_green() {
    let launcher = PlaywrightLauncher::new(BrowserConfig::default());

    let summary = runner()
        .run_selected(
            Selection::Api,
            &ApiConfig::default(),
            &StepRegistry::with_login_steps(),
            &launcher,
        )
        .await
        .unwrap();

    assert_eq!(summary.total, 17);
    assert_eq!(summary.passed, 0);
    assert_eq!(summary.failed, 17);
    assert!(!summary.all_passed());
}

#[tokio::test]
async fn test_wrong_admin_password_fails_booking_setup() {
    let service = FakeBooker::start().await.unwrap();
    let api = ApiConfig {
        admin: Credentials::new("admin", "letmein"),
        ..ApiConfig::new(service.base_url())
    };

    let results = runner().run_suite(&booking::suite(), &api).await;

    assert!(results.iter().all(|r| !r.success));
    assert!(results[0]
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("Bad credentials"));
}

#[derive(Default)]
struct Counters {
    cleanups: usize,
}

fn counters(_: &ApiConfig) -> BoxFuture<'_, E2eResult<Counters>> {
    Box::pin(async { Ok(Counters::default()) })
}

fn count_cleanup(ctx: &mut Counters) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        ctx.cleanups += 1;
        Ok(())
    })
}

fn failing_case(_: &mut Counters) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async {
        ensure!(1 + 1 == 3, "arithmetic still works");
        Ok(())
    })
}

fn check_cleanups(ctx: &mut Counters) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        ensure!(ctx.cleanups == 1, "expected one cleanup, saw {}", ctx.cleanups);
        Ok(())
    })
}

#[tokio::test]
async fn test_after_each_runs_when_case_fails() {
    let suite = Suite {
        name: "hooks",
        before_all: counters,
        before_each: None,
        after_each: Some(count_cleanup),
        cases: vec![
            Case::new("fails", failing_case),
            Case::new("sees the cleanup", check_cleanups),
        ],
    };

    let results = runner().run_suite(&suite, &ApiConfig::default()).await;

    assert!(!results[0].success);
    assert_eq!(
        results[0].error.as_deref(),
        Some("Assertion failed: arithmetic still works")
    );
    assert_eq!(results[0].steps.last().map(|s| s.name.as_str()), Some("after_each"));
    assert!(results[1].success, "{:?}", results[1].error);
}

//! Assertion helpers for API suites
//!
//! Every helper returns [`E2eError::AssertionFailed`] instead of panicking so
//! that a failed check ends only the current test and the runner can still
//! run cleanup hooks and sibling tests.

use serde_json::Value;

use bookcheck_api::ApiResponse;

use crate::error::{E2eError, E2eResult};

/// Fail the current test with a formatted message unless `cond` holds
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::E2eError::AssertionFailed(format!($($arg)+)));
        }
    };
}

pub fn expect_status(response: &ApiResponse, expected: u16) -> E2eResult<()> {
    if response.status() == expected {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed(format!(
            "expected HTTP {}, got {} (body: {})",
            expected,
            response.status(),
            truncate(&response.body, 200)
        )))
    }
}

pub fn expect_eq<T>(what: &str, actual: T, expected: T) -> E2eResult<()>
where
    T: PartialEq + std::fmt::Debug,
{
    if actual == expected {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed(format!(
            "{}: expected {:?}, got {:?}",
            what, expected, actual
        )))
    }
}

/// String comparison that ignores ASCII case
pub fn expect_eq_ignore_case(what: &str, actual: &str, expected: &str) -> E2eResult<()> {
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed(format!(
            "{}: expected {:?} (any case), got {:?}",
            what, expected, actual
        )))
    }
}

/// Every field of `expected` must be present in `actual` with an equal
/// value; objects are compared recursively, extra fields are allowed.
pub fn expect_subset(actual: &Value, expected: &Value) -> E2eResult<()> {
    match subset_mismatch(actual, expected, "$") {
        None => Ok(()),
        Some(path) => Err(E2eError::AssertionFailed(format!(
            "{} does not match: expected {} within {}",
            path, expected, actual
        ))),
    }
}

fn subset_mismatch(actual: &Value, expected: &Value, path: &str) -> Option<String> {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => {
            expected.iter().find_map(|(key, want)| {
                let path = format!("{}.{}", path, key);
                match actual.get(key) {
                    Some(got) => subset_mismatch(got, want, &path),
                    None => Some(path),
                }
            })
        }
        _ if actual == expected => None,
        _ => Some(path.to_string()),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

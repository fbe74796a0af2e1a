//! API suites
//!
//! A suite is a table of cases sharing one context value. The runner builds
//! the context with `before_all`, then for every case runs `before_each`, the
//! case body and `after_each`. `after_each` runs even when the body failed.

use futures::future::BoxFuture;

use bookcheck_common::ApiConfig;

use crate::error::E2eResult;

pub mod auth;
pub mod booking;

pub use auth::AuthContext;
pub use booking::BookingContext;

/// Hook or case body operating on the suite context
pub type Hook<C> = for<'a> fn(&'a mut C) -> BoxFuture<'a, E2eResult<()>>;

/// Builds the suite context once, before the first case
pub type Setup<C> = for<'a> fn(&'a ApiConfig) -> BoxFuture<'a, E2eResult<C>>;

pub struct Case<C> {
    pub name: &'static str,
    pub run: Hook<C>,
}

impl<C> Case<C> {
    pub fn new(name: &'static str, run: Hook<C>) -> Self {
        Self { name, run }
    }
}

pub struct Suite<C> {
    pub name: &'static str,
    pub before_all: Setup<C>,
    pub before_each: Option<Hook<C>>,
    pub after_each: Option<Hook<C>>,
    pub cases: Vec<Case<C>>,
}

impl<C> Suite<C> {
    /// Qualified case name used in reports and `--name` filters
    pub fn case_name(&self, case: &Case<C>) -> String {
        format!("{} > {}", self.name, case.name)
    }
}

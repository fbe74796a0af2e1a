//! Test doubles for the bookcheck suites
//!
//! - [`FakeBooker`]: an in-process HTTP service honouring the booking/auth
//!   contract, quirks included (500 on incomplete create, 405 on deleting a
//!   missing booking). [`BookerOptions`] changes those answers.
//! - [`FakeLoginPage`]: a scripted Playwright driver that speaks the JSON
//!   lines protocol over an in-memory pipe and simulates the login screen.

pub mod fake_booker;
pub mod fake_driver;

pub use fake_booker::{BookerOptions, FakeBooker};
pub use fake_driver::{FakeLoginPage, LOGIN_ERROR_TEXT};

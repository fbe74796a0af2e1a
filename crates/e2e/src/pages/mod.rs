//! Page objects

pub mod login;

pub use login::LoginPage;

//! Bookcheck API client
//!
//! A thin typed layer over the booking/auth REST service. Every request
//! returns the raw status and body so suites can assert on the service's
//! exact behaviour, including its inconsistent status codes.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | [`ApiClient::authenticate`] | `POST /auth` |
//! | [`ApiClient::list_bookings`] | `GET /booking?firstname=&lastname=&checkin=&checkout=` |
//! | [`ApiClient::get_booking`] | `GET /booking/{id}` |
//! | [`ApiClient::create_booking`] | `POST /booking` |
//! | [`ApiClient::update_booking`] | `PUT /booking/{id}` |
//! | [`ApiClient::partial_update_booking`] | `PATCH /booking/{id}` |
//! | [`ApiClient::delete_booking`] | `DELETE /booking/{id}` |
//! | [`ApiClient::ping`] | `GET /ping` |

pub mod booking;
pub mod client;
pub mod error;

pub use booking::{AuthOutcome, Booking, BookingDates, BookingFilter, BookingId, CreatedBooking};
pub use client::{ApiClient, ApiResponse};
pub use error::{ApiError, ApiResult};

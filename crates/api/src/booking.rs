//! Wire types of the booking/auth service

use serde::{Deserialize, Serialize};

/// Rejection reason returned by `POST /auth` for any bad login
pub const BAD_CREDENTIALS: &str = "Bad credentials";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDates {
    /// `YYYY-MM-DD`
    pub checkin: String,
    /// `YYYY-MM-DD`
    pub checkout: String,
}

impl BookingDates {
    pub fn new(checkin: impl Into<String>, checkout: impl Into<String>) -> Self {
        Self {
            checkin: checkin.into(),
            checkout: checkout.into(),
        }
    }
}

/// A booking as accepted by create/update and returned by get
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub firstname: String,
    pub lastname: String,
    pub totalprice: i64,
    pub depositpaid: bool,
    pub bookingdates: BookingDates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additionalneeds: Option<String>,
}

/// One entry of `GET /booking`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingId {
    pub bookingid: u64,
}

/// Response of `POST /booking`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedBooking {
    pub bookingid: u64,
    pub booking: Booking,
}

/// Query filters for `GET /booking`; unset fields are omitted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BookingFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout: Option<String>,
}

impl BookingFilter {
    pub fn by_lastname(lastname: impl Into<String>) -> Self {
        Self {
            lastname: Some(lastname.into()),
            ..Default::default()
        }
    }

    pub fn by_firstname(firstname: impl Into<String>) -> Self {
        Self {
            firstname: Some(firstname.into()),
            ..Default::default()
        }
    }

    pub fn checkin(mut self, date: impl Into<String>) -> Self {
        self.checkin = Some(date.into());
        self
    }

    pub fn checkout(mut self, date: impl Into<String>) -> Self {
        self.checkout = Some(date.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Body of `POST /auth`; the service answers 200 either way
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AuthOutcome {
    Token { token: String },
    Rejected { reason: String },
}

impl AuthOutcome {
    pub fn token(&self) -> Option<&str> {
        match self {
            AuthOutcome::Token { token } => Some(token),
            AuthOutcome::Rejected { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auth_outcome_shapes() {
        let ok: AuthOutcome = serde_json::from_value(json!({"token": "abc123"})).unwrap();
        assert_eq!(ok.token(), Some("abc123"));

        let rejected: AuthOutcome =
            serde_json::from_value(json!({"reason": "Bad credentials"})).unwrap();
        assert_eq!(
            rejected,
            AuthOutcome::Rejected {
                reason: BAD_CREDENTIALS.to_string()
            }
        );
        assert_eq!(rejected.token(), None);
    }

    #[test]
    fn test_booking_without_additional_needs() {
        let body = json!({
            "firstname": "Jim",
            "lastname": "Brown",
            "totalprice": 111,
            "depositpaid": true,
            "bookingdates": {"checkin": "2018-01-01", "checkout": "2019-01-01"}
        });
        let booking: Booking = serde_json::from_value(body).unwrap();
        assert_eq!(booking.additionalneeds, None);

        let back = serde_json::to_value(&booking).unwrap();
        assert!(back.get("additionalneeds").is_none());
    }

    #[test]
    fn test_filter_builder() {
        let filter = BookingFilter::by_lastname("Automation").checkin("2023-12-01");
        assert_eq!(filter.lastname.as_deref(), Some("Automation"));
        assert_eq!(filter.checkin.as_deref(), Some("2023-12-01"));
        assert!(filter.checkout.is_none());
        assert!(!filter.is_empty());
        assert!(BookingFilter::default().is_empty());
    }
}

//! Booking CRUD suite
//!
//! Every case starts with one freshly created booking (`before_each`) which
//! is deleted again afterwards (`after_each`, expecting 201). Cases that
//! create extra bookings delete those themselves.

use futures::future::BoxFuture;
use serde_json::{json, Value};
use tracing::debug;

use bookcheck_api::{ApiClient, Booking, BookingDates, BookingFilter, BookingId, CreatedBooking};
use bookcheck_common::ApiConfig;

use crate::ensure;
use crate::error::{E2eError, E2eResult};
use crate::expect::{expect_eq, expect_eq_ignore_case, expect_status, expect_subset};
use crate::suites::{Case, Suite};

/// Id that is never handed out by the service during a run
const MISSING_BOOKING_ID: u64 = 999_999;
const MISSING_DELETE_ID: u64 = 9_999_999;

pub struct BookingContext {
    /// Token-bearing client
    pub api: ApiClient,
    /// Client without the token cookie
    pub anonymous: ApiClient,
    /// Booking created for the current case
    pub booking_id: Option<u64>,
}

impl BookingContext {
    fn booking_id(&self) -> E2eResult<u64> {
        self.booking_id.ok_or_else(|| {
            E2eError::AssertionFailed("no booking was created for this case".to_string())
        })
    }
}

/// Payload created before every case
pub fn fixture_booking() -> Booking {
    Booking {
        firstname: "TestUser".to_string(),
        lastname: "Automation".to_string(),
        totalprice: 150,
        depositpaid: true,
        bookingdates: BookingDates::new("2023-12-01", "2023-12-10"),
        additionalneeds: Some("Wi-Fi".to_string()),
    }
}

pub fn suite() -> Suite<BookingContext> {
    Suite {
        name: "Booking API",
        before_all: setup,
        before_each: Some(create_fixture),
        after_each: Some(delete_fixture),
        cases: vec![
            Case::new("returns an array of booking ids", list_ids),
            Case::new("lists booking ids without a token", list_ids_anonymously),
            Case::new("filters by lastname", filter_by_lastname),
            Case::new("retrieves the created booking", get_created),
            Case::new("returns 404 for a missing booking", get_missing),
            Case::new("creates a booking with valid data", create_valid),
            Case::new("returns 500 for a create with missing fields", create_missing_fields),
            Case::new("replaces a booking with PUT", put_full_update),
            Case::new("rejects PUT without a token", put_unauthorized),
            Case::new("returns 400 for a PUT with missing fields", put_missing_fields),
            Case::new("partially updates a booking with PATCH", patch_partial),
            Case::new("drops unknown fields in PATCH", patch_unknown_field),
            Case::new("deletes an existing booking", delete_existing),
            Case::new("returns 405 when deleting a missing booking", delete_missing),
        ],
    }
}

fn setup(config: &ApiConfig) -> BoxFuture<'_, E2eResult<BookingContext>> {
    Box::pin(async move {
        let anonymous = ApiClient::new(config)?;
        let token = anonymous.login(&config.admin).await?;
        Ok(BookingContext {
            api: ApiClient::authenticated(config, &token)?,
            anonymous,
            booking_id: None,
        })
    })
}

fn create_fixture(ctx: &mut BookingContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let response = ctx.api.create_booking(&fixture_booking()).await?;
        expect_status(&response, 200)?;
        let created: CreatedBooking = response.json()?;
        debug!("Created fixture booking {}", created.bookingid);
        ctx.booking_id = Some(created.bookingid);
        Ok(())
    })
}

fn delete_fixture(ctx: &mut BookingContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        // nothing to clean up when the fixture was never created
        let Some(id) = ctx.booking_id.take() else {
            return Ok(());
        };
        let response = ctx.api.delete_booking(id).await?;
        expect_status(&response, 201)
    })
}

fn list_ids(ctx: &mut BookingContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move { expect_id_listing(&ctx.api).await.map(|_| ()) })
}

fn list_ids_anonymously(ctx: &mut BookingContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move { expect_id_listing(&ctx.anonymous).await.map(|_| ()) })
}

/// `GET /booking` must answer 200 with `[{bookingid: number}, ...]`
async fn expect_id_listing(client: &ApiClient) -> E2eResult<Vec<BookingId>> {
    let response = client.list_bookings(&BookingFilter::default()).await?;
    expect_status(&response, 200)?;

    let body = response.json_value()?;
    let entries = body
        .as_array()
        .ok_or_else(|| E2eError::AssertionFailed(format!("expected an array, got {}", body)))?;
    if let Some(first) = entries.first() {
        ensure!(
            first.get("bookingid").map_or(false, Value::is_number),
            "expected a numeric bookingid in {}",
            first
        );
    }
    Ok(response.json()?)
}

fn filter_by_lastname(ctx: &mut BookingContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let id = ctx.booking_id()?;
        let filter = BookingFilter::by_lastname(fixture_booking().lastname);
        let response = ctx.api.list_bookings(&filter).await?;
        expect_status(&response, 200)?;

        let ids: Vec<BookingId> = response.json()?;
        ensure!(
            ids.iter().any(|b| b.bookingid == id),
            "booking {} missing from lastname listing ({} entries)",
            id,
            ids.len()
        );
        Ok(())
    })
}

fn get_created(ctx: &mut BookingContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let id = ctx.booking_id()?;
        let response = ctx.api.get_booking(id).await?;
        expect_status(&response, 200)?;

        let got: Booking = response.json()?;
        let want = fixture_booking();
        expect_eq_ignore_case("firstname", &got.firstname, &want.firstname)?;
        expect_eq_ignore_case("lastname", &got.lastname, &want.lastname)?;
        expect_eq("totalprice", got.totalprice, want.totalprice)?;
        expect_eq("depositpaid", got.depositpaid, want.depositpaid)?;
        expect_eq_ignore_case(
            "additionalneeds",
            got.additionalneeds.as_deref().unwrap_or_default(),
            want.additionalneeds.as_deref().unwrap_or_default(),
        )?;
        expect_eq("bookingdates", got.bookingdates, want.bookingdates)
    })
}

fn get_missing(ctx: &mut BookingContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let response = ctx.api.get_booking(MISSING_BOOKING_ID).await?;
        expect_status(&response, 404)
    })
}

fn create_valid(ctx: &mut BookingContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let booking = json!({
            "firstname": "CreateTest",
            "lastname": "Independent",
            "totalprice": 200,
            "depositpaid": true,
            "bookingdates": {"checkin": "2023-09-01", "checkout": "2023-09-10"},
            "additionalneeds": "Dinner"
        });
        let response = ctx.api.create_booking(&booking).await?;
        expect_status(&response, 200)?;

        let body = response.json_value()?;
        let id = body
            .get("bookingid")
            .and_then(Value::as_u64)
            .ok_or_else(|| E2eError::AssertionFailed(format!("no bookingid in {}", body)))?;
        let echoed = expect_subset(&body["booking"], &booking);

        // separate from the fixture, so it is removed here
        let cleanup = ctx.api.delete_booking(id).await?;
        echoed?;
        expect_status(&cleanup, 201)
    })
}

fn create_missing_fields(ctx: &mut BookingContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let response = ctx
            .api
            .create_booking(&json!({ "firstname": "MissingFields" }))
            .await?;
        expect_status(&response, 500)
    })
}

fn put_full_update(ctx: &mut BookingContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let id = ctx.booking_id()?;
        let updated = json!({
            "firstname": "UpdatedFirst",
            "lastname": "UpdatedLast",
            "totalprice": 600,
            "depositpaid": false,
            "bookingdates": {"checkin": "2023-09-01", "checkout": "2023-09-15"},
            "additionalneeds": "Lunch"
        });
        let response = ctx.api.update_booking(id, &updated).await?;
        expect_status(&response, 200)?;
        expect_subset(&response.json_value()?, &updated)
    })
}

fn put_unauthorized(ctx: &mut BookingContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let id = ctx.booking_id()?;
        let updated = Booking {
            firstname: "Unauthorized".to_string(),
            lastname: "Update".to_string(),
            totalprice: 500,
            depositpaid: false,
            bookingdates: BookingDates::new("2023-11-01", "2023-11-10"),
            additionalneeds: Some("Nothing".to_string()),
        };
        let response = ctx.anonymous.update_booking(id, &updated).await?;
        expect_status(&response, 403)
    })
}

fn put_missing_fields(ctx: &mut BookingContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let id = ctx.booking_id()?;
        let response = ctx
            .api
            .update_booking(id, &json!({ "firstname": "OnlyName" }))
            .await?;
        expect_status(&response, 400)
    })
}

fn patch_partial(ctx: &mut BookingContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let id = ctx.booking_id()?;
        let patch = json!({
            "firstname": "PatchedName",
            "additionalneeds": "Late Checkout"
        });
        let response = ctx.api.partial_update_booking(id, &patch).await?;
        expect_status(&response, 200)?;
        expect_subset(&response.json_value()?, &patch)
    })
}

fn patch_unknown_field(ctx: &mut BookingContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let id = ctx.booking_id()?;
        let patch = json!({ "firstname": "ExtraFieldName", "hacker": true });
        let response = ctx.api.partial_update_booking(id, &patch).await?;
        expect_status(&response, 200)?;

        let body = response.json_value()?;
        expect_subset(&body, &json!({ "firstname": "ExtraFieldName" }))?;
        ensure!(body.get("hacker").is_none(), "unknown field kept: {}", body);
        Ok(())
    })
}

fn delete_existing(ctx: &mut BookingContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let booking = Booking {
            firstname: "ToDelete".to_string(),
            lastname: "User".to_string(),
            totalprice: 300,
            depositpaid: true,
            bookingdates: BookingDates::new("2023-11-01", "2023-11-05"),
            additionalneeds: Some("None".to_string()),
        };
        let response = ctx.api.create_booking(&booking).await?;
        expect_status(&response, 200)?;
        let created: CreatedBooking = response.json()?;

        let deleted = ctx.api.delete_booking(created.bookingid).await?;
        expect_status(&deleted, 201)?;

        let gone = ctx.api.get_booking(created.bookingid).await?;
        expect_status(&gone, 404)
    })
}

fn delete_missing(ctx: &mut BookingContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let response = ctx.api.delete_booking(MISSING_DELETE_ID).await?;
        expect_status(&response, 405)
    })
}

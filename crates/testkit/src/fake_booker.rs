//! In-process booking/auth service

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "password123";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Dates {
    checkin: String,
    checkout: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredBooking {
    firstname: String,
    lastname: String,
    totalprice: i64,
    depositpaid: bool,
    bookingdates: Dates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    additionalneeds: Option<String>,
}

/// Statuses for the contract's odd answers
///
/// The defaults match the live service. Changing one lets a test check
/// that the suite notices when the service stops behaving that way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookerOptions {
    /// Answer to a create whose body is missing required fields
    pub incomplete_create_status: u16,
    /// Answer to an authorized delete of an unknown id
    pub missing_delete_status: u16,
}

impl Default for BookerOptions {
    fn default() -> Self {
        Self {
            incomplete_create_status: 500,
            missing_delete_status: 405,
        }
    }
}

#[derive(Default)]
struct BookerState {
    options: BookerOptions,
    bookings: Mutex<BTreeMap<u64, StoredBooking>>,
    tokens: Mutex<HashSet<String>>,
    next_id: AtomicU64,
    next_token: AtomicU64,
}

impl BookerState {
    fn is_authorized(&self, headers: &HeaderMap) -> bool {
        let tokens = self.tokens.lock();
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().strip_prefix("token="))
            .any(|token| tokens.contains(token))
    }
}

/// Running fake service; stops when dropped
pub struct FakeBooker {
    addr: SocketAddr,
    state: Arc<BookerState>,
    task: JoinHandle<()>,
}

impl FakeBooker {
    /// Bind an ephemeral local port and start serving
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(BookerOptions::default()).await
    }

    pub async fn start_with(options: BookerOptions) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(BookerState {
            options,
            next_id: AtomicU64::new(1),
            ..Default::default()
        });

        let app = router(state.clone());
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                warn!("Fake booking service stopped: {}", e);
            }
        });

        debug!("Fake booking service listening on {}", addr);
        Ok(Self { addr, state, task })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Bookings currently stored
    pub fn booking_count(&self) -> usize {
        self.state.bookings.lock().len()
    }

    /// An id the service has not handed out
    pub fn unused_id(&self) -> u64 {
        self.state.next_id.load(Ordering::SeqCst) + 1_000_000
    }
}

impl Drop for FakeBooker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn router(state: Arc<BookerState>) -> Router {
    Router::new()
        .route("/ping", get(ping_handler))
        .route("/auth", post(auth_handler))
        .route("/booking", get(list_handler).post(create_handler))
        .route(
            "/booking/:id",
            get(get_handler)
                .put(update_handler)
                .patch(patch_handler)
                .delete(delete_handler),
        )
        .with_state(state)
}

fn plain(status: StatusCode, text: &'static str) -> Response {
    (status, text).into_response()
}

fn canned(code: u16) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, status.canonical_reason().unwrap_or_default()).into_response()
}

async fn ping_handler() -> Response {
    plain(StatusCode::CREATED, "Created")
}

async fn auth_handler(State(state): State<Arc<BookerState>>, body: Bytes) -> Response {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let username = body.get("username").and_then(Value::as_str);
    let password = body.get("password").and_then(Value::as_str);

    if username == Some(ADMIN_USERNAME) && password == Some(ADMIN_PASSWORD) {
        let n = state.next_token.fetch_add(1, Ordering::SeqCst);
        let token = format!("{:015x}", 0xb00c_0000_0000_u64 + n);
        state.tokens.lock().insert(token.clone());
        Json(json!({ "token": token })).into_response()
    } else {
        Json(json!({ "reason": "Bad credentials" })).into_response()
    }
}

async fn list_handler(
    State(state): State<Arc<BookerState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    for key in ["checkin", "checkout"] {
        if let Some(date) = params.get(key) {
            if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
                return plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
            }
        }
    }

    let bookings = state.bookings.lock();
    let ids: Vec<Value> = bookings
        .iter()
        .filter(|(_, b)| {
            params.get("firstname").map_or(true, |f| &b.firstname == f)
                && params.get("lastname").map_or(true, |l| &b.lastname == l)
                && params
                    .get("checkin")
                    .map_or(true, |d| b.bookingdates.checkin.as_str() >= d.as_str())
                && params
                    .get("checkout")
                    .map_or(true, |d| b.bookingdates.checkout.as_str() >= d.as_str())
        })
        .map(|(id, _)| json!({ "bookingid": id }))
        .collect();
    Json(ids).into_response()
}

async fn get_handler(State(state): State<Arc<BookerState>>, Path(id): Path<String>) -> Response {
    let found = id
        .parse::<u64>()
        .ok()
        .and_then(|id| state.bookings.lock().get(&id).cloned());
    match found {
        Some(booking) => Json(booking).into_response(),
        None => plain(StatusCode::NOT_FOUND, "Not Found"),
    }
}

async fn create_handler(State(state): State<Arc<BookerState>>, body: Bytes) -> Response {
    let booking: StoredBooking = match serde_json::from_slice(&body) {
        Ok(b) => b,
        Err(_) => return canned(state.options.incomplete_create_status),
    };
    let id = state.next_id.fetch_add(1, Ordering::SeqCst);
    state.bookings.lock().insert(id, booking.clone());
    Json(json!({ "bookingid": id, "booking": booking })).into_response()
}

/// Resolve an id for a write; writes to unknown ids answer 405
fn existing_id(state: &BookerState, id: &str) -> Option<u64> {
    let id = id.parse::<u64>().ok()?;
    state.bookings.lock().contains_key(&id).then_some(id)
}

async fn update_handler(
    State(state): State<Arc<BookerState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !state.is_authorized(&headers) {
        return plain(StatusCode::FORBIDDEN, "Forbidden");
    }
    let Some(id) = existing_id(&state, &id) else {
        return plain(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    };
    let booking: StoredBooking = match serde_json::from_slice(&body) {
        Ok(b) => b,
        Err(_) => return plain(StatusCode::BAD_REQUEST, "Bad Request"),
    };
    state.bookings.lock().insert(id, booking.clone());
    Json(booking).into_response()
}

async fn patch_handler(
    State(state): State<Arc<BookerState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !state.is_authorized(&headers) {
        return plain(StatusCode::FORBIDDEN, "Forbidden");
    }
    let Some(id) = existing_id(&state, &id) else {
        return plain(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    };
    let patch: Value = match serde_json::from_slice(&body) {
        Ok(v @ Value::Object(_)) => v,
        _ => return plain(StatusCode::BAD_REQUEST, "Bad Request"),
    };

    let mut bookings = state.bookings.lock();
    let Some(current) = bookings.get(&id) else {
        return plain(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    };
    let mut merged = match serde_json::to_value(current) {
        Ok(v) => v,
        Err(_) => return plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
    };
    merge_known_fields(&mut merged, &patch);

    match serde_json::from_value::<StoredBooking>(merged) {
        Ok(updated) => {
            bookings.insert(id, updated.clone());
            Json(updated).into_response()
        }
        Err(_) => plain(StatusCode::BAD_REQUEST, "Bad Request"),
    }
}

/// Copy only keys the target already has; unknown keys are dropped
fn merge_known_fields(target: &mut Value, patch: &Value) {
    const KNOWN: [&str; 6] = [
        "firstname",
        "lastname",
        "totalprice",
        "depositpaid",
        "bookingdates",
        "additionalneeds",
    ];
    let (Some(target), Some(patch)) = (target.as_object_mut(), patch.as_object()) else {
        return;
    };
    for (key, value) in patch {
        if !KNOWN.contains(&key.as_str()) {
            continue;
        }
        match (target.get_mut(key), value) {
            (Some(Value::Object(dates)), Value::Object(update)) => {
                for (k, v) in update {
                    if dates.contains_key(k) {
                        dates.insert(k.clone(), v.clone());
                    }
                }
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

async fn delete_handler(
    State(state): State<Arc<BookerState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !state.is_authorized(&headers) {
        return plain(StatusCode::FORBIDDEN, "Forbidden");
    }
    let Some(id) = existing_id(&state, &id) else {
        return canned(state.options.missing_delete_status);
    };
    state.bookings.lock().remove(&id);
    plain(StatusCode::CREATED, "Created")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_drops_unknown_fields() {
        let mut target = json!({
            "firstname": "A",
            "bookingdates": {"checkin": "2023-01-01", "checkout": "2023-01-02"}
        });
        merge_known_fields(
            &mut target,
            &json!({
                "firstname": "B",
                "hacker": true,
                "bookingdates": {"checkout": "2023-01-05", "extra": 1}
            }),
        );
        assert_eq!(target["firstname"], "B");
        assert!(target.get("hacker").is_none());
        assert_eq!(target["bookingdates"]["checkout"], "2023-01-05");
        assert!(target["bookingdates"].get("extra").is_none());
    }
}

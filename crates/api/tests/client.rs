//! Request shape of the API client, checked against a mock server

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bookcheck_api::{ApiClient, ApiError, BookingFilter};
use bookcheck_common::{ApiConfig, Credentials};
use bookcheck_testkit::FakeBooker;

#[tokio::test]
async fn test_authenticated_client_sends_token_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/booking/7"))
        .and(header("cookie", "token=abc123"))
        .and(header("content-type", "application/json"))
        .and(header("accept", "application/json"))
        .and(body_json(json!({ "firstname": "Jim" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "firstname": "Jim" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::authenticated(&ApiConfig::new(server.uri()), "abc123").unwrap();
    assert!(client.is_authenticated());

    let response = client
        .update_booking(7, &json!({ "firstname": "Jim" }))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.json_value().unwrap()["firstname"], "Jim");
}

#[tokio::test]
async fn test_anonymous_client_sends_no_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/booking"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = ApiClient::new(&ApiConfig::new(format!("{}/", server.uri()))).unwrap();
    client.list_bookings(&BookingFilter::default()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("cookie").is_none());
    assert_eq!(requests[0].url.query(), None);
}

#[tokio::test]
async fn test_filters_become_query_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/booking"))
        .and(query_param("lastname", "Automation"))
        .and(query_param("checkin", "2023-12-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "bookingid": 4 }])))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(&ApiConfig::new(server.uri())).unwrap();
    let filter = BookingFilter::by_lastname("Automation").checkin("2023-12-01");
    let response = client.list_bookings(&filter).await.unwrap();

    assert_eq!(response.status(), 200);
    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap_or_default();
    assert!(!query.contains("firstname"), "{}", query);
}

#[tokio::test]
async fn test_login_maps_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth"))
        .and(body_json(json!({ "username": "admin", "password": "nope" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "reason": "Bad credentials" })),
        )
        .mount(&server)
        .await;

    let client = ApiClient::new(&ApiConfig::new(server.uri())).unwrap();
    let err = client
        .login(&Credentials::new("admin", "nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Rejected(ref reason) if reason == "Bad credentials"));
}

#[tokio::test]
async fn test_login_reports_unexpected_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .mount(&server)
        .await;

    let client = ApiClient::new(&ApiConfig::new(server.uri())).unwrap();
    let err = client.login(&ApiConfig::default().admin).await.unwrap_err();
    assert!(matches!(err, ApiError::UnexpectedStatus { status: 503, .. }));
}

#[tokio::test]
async fn test_booking_lifecycle_against_fake_service() {
    let service = FakeBooker::start().await.unwrap();
    let config = ApiConfig::new(service.base_url());

    let anonymous = ApiClient::new(&config).unwrap();
    assert_eq!(anonymous.ping().await.unwrap().status(), 201);

    let token = anonymous.login(&config.admin).await.unwrap();
    let client = ApiClient::authenticated(&config, &token).unwrap();

    let created = client
        .create_booking(&json!({
            "firstname": "Sally",
            "lastname": "Brown",
            "totalprice": 111,
            "depositpaid": true,
            "bookingdates": {"checkin": "2024-01-01", "checkout": "2024-01-03"}
        }))
        .await
        .unwrap();
    assert_eq!(created.status(), 200);
    let id = created.json_value().unwrap()["bookingid"].as_u64().unwrap();

    assert_eq!(anonymous.delete_booking(id).await.unwrap().status(), 403);
    assert_eq!(client.delete_booking(id).await.unwrap().status(), 201);
    assert_eq!(client.get_booking(id).await.unwrap().status(), 404);
    assert_eq!(client.delete_booking(id).await.unwrap().status(), 405);

    let unknown = service.unused_id();
    assert_eq!(client.get_booking(unknown).await.unwrap().status(), 404);
    assert_eq!(client.delete_booking(unknown).await.unwrap().status(), 405);
    assert_eq!(service.booking_count(), 0);
}

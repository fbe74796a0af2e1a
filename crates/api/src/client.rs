//! HTTP context for the booking/auth service

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE};
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use bookcheck_common::{ApiConfig, Credentials};

use crate::booking::{AuthOutcome, BookingFilter};
use crate::error::{ApiError, ApiResult};

/// Status and body of a completed request
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn status(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        Ok(serde_json::from_str(&self.body)?)
    }

    pub fn json_value(&self) -> ApiResult<serde_json::Value> {
        self.json()
    }
}

/// HTTP client bound to one service root
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    authenticated: bool,
}

impl ApiClient {
    /// Unauthenticated client with JSON headers
    pub fn new(config: &ApiConfig) -> ApiResult<Self> {
        Self::build(config.base_url()?, None)
    }

    /// Client that sends `Cookie: token=<token>` on every request
    pub fn authenticated(config: &ApiConfig, token: &str) -> ApiResult<Self> {
        Self::build(config.base_url()?, Some(token))
    }

    fn build(base_url: &str, token: Option<&str>) -> ApiResult<Self> {
        let parsed = Url::parse(base_url).map_err(|e| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = token {
            let cookie = HeaderValue::from_str(&format!("token={}", token))
                .map_err(|e| ApiError::InvalidToken(e.to_string()))?;
            headers.insert(COOKIE, cookie);
        }

        let http = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            authenticated: token.is_some(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// `POST /auth`
    pub async fn authenticate(&self, credentials: &Credentials) -> ApiResult<ApiResponse> {
        let body = json!({
            "username": credentials.username,
            "password": credentials.password,
        });
        self.send(self.request(Method::POST, "/auth").json(&body)).await
    }

    /// Exchange credentials for a token
    ///
    /// The service answers 200 with a `reason` on bad credentials, which is
    /// mapped to [`ApiError::Rejected`].
    pub async fn login(&self, credentials: &Credentials) -> ApiResult<String> {
        let response = self.authenticate(credentials).await?;
        if !response.status.is_success() {
            return Err(ApiError::UnexpectedStatus {
                status: response.status(),
                body: response.body,
            });
        }
        match response.json::<AuthOutcome>()? {
            AuthOutcome::Token { token } => {
                info!("Authenticated as {}", credentials.username);
                Ok(token)
            }
            AuthOutcome::Rejected { reason } => Err(ApiError::Rejected(reason)),
        }
    }

    /// `GET /booking`, optionally filtered
    pub async fn list_bookings(&self, filter: &BookingFilter) -> ApiResult<ApiResponse> {
        let mut request = self.request(Method::GET, "/booking");
        if !filter.is_empty() {
            request = request.query(filter);
        }
        self.send(request).await
    }

    /// `GET /booking/{id}`
    pub async fn get_booking(&self, id: u64) -> ApiResult<ApiResponse> {
        self.send(self.request(Method::GET, &booking_path(id))).await
    }

    /// `POST /booking`
    ///
    /// Takes any serializable body so incomplete payloads can be sent.
    pub async fn create_booking<B>(&self, body: &B) -> ApiResult<ApiResponse>
    where
        B: Serialize + ?Sized,
    {
        self.send(self.request(Method::POST, "/booking").json(body))
            .await
    }

    /// `PUT /booking/{id}`
    pub async fn update_booking<B>(&self, id: u64, body: &B) -> ApiResult<ApiResponse>
    where
        B: Serialize + ?Sized,
    {
        self.send(self.request(Method::PUT, &booking_path(id)).json(body))
            .await
    }

    /// `PATCH /booking/{id}`
    pub async fn partial_update_booking<B>(&self, id: u64, body: &B) -> ApiResult<ApiResponse>
    where
        B: Serialize + ?Sized,
    {
        self.send(self.request(Method::PATCH, &booking_path(id)).json(body))
            .await
    }

    /// `DELETE /booking/{id}`
    pub async fn delete_booking(&self, id: u64) -> ApiResult<ApiResponse> {
        self.send(self.request(Method::DELETE, &booking_path(id)))
            .await
    }

    /// `GET /ping`; a healthy service answers 201
    pub async fn ping(&self) -> ApiResult<ApiResponse> {
        self.send(self.request(Method::GET, "/ping")).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
    }

    async fn send(&self, builder: RequestBuilder) -> ApiResult<ApiResponse> {
        let request = builder.build()?;
        let method = request.method().clone();
        let url = request.url().clone();

        let response = self.http.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;

        debug!("{} {} -> {}", method, url.path(), status);
        Ok(ApiResponse { status, body })
    }
}

fn booking_path(id: u64) -> String {
    format!("/booking/{}", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_missing_base_url() {
        let err = ApiClient::new(&ApiConfig::default()).unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn test_rejects_malformed_base_url() {
        let err = ApiClient::new(&ApiConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidBaseUrl { .. }));

        let err = ApiClient::new(&ApiConfig::new("ftp://example.test")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = ApiClient::new(&ApiConfig::new("http://127.0.0.1:3001/")).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:3001");
        assert!(!client.is_authenticated());
    }

    #[test]
    fn test_token_with_newline_is_rejected() {
        let err =
            ApiClient::authenticated(&ApiConfig::new("http://127.0.0.1:3001"), "bad\ntoken")
                .unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken(_)));
    }
}

//! Storefront backend API client.
//!
//! Provides authenticated JSON-over-HTTP communication with the storefront
//! backend. Every store talks to the backend through [`ApiClient`], which in
//! turn sends through a [`Transport`] so tests can substitute a fake.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::Value;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::ApiError;

/// Default timeout for API requests (10 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the backend base URL:
/// - ensure a scheme is present (http for local/LAN hosts, https otherwise)
/// - strip trailing slashes
/// - strip a trailing `/api` segment
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();
    if url.is_empty() {
        return url;
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if is_local_host(&url) {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }
    if url.ends_with("/api") {
        url.truncate(url.len() - 4);
    }
    while url.ends_with('/') {
        url.pop();
    }

    url
}

/// Development backends run on the LAN (phones cannot reach `localhost` on
/// the dev machine), so private IPv4 ranges get plain http too.
fn is_local_host(url: &str) -> bool {
    url.starts_with("localhost")
        || url.starts_with("127.0.0.1")
        || url.starts_with("10.")
        || url.starts_with("192.168.")
}

/// Append query pairs to an API path, e.g. `/api/products/public?category=x`.
pub fn path_with_query(path: &str, pairs: &[(&str, String)]) -> String {
    if pairs.is_empty() {
        return path.to_string();
    }
    let mut url = match Url::parse(&format!("http://localhost{path}")) {
        Ok(url) => url,
        Err(_) => return path.to_string(),
    };
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in pairs {
            query.append_pair(key, value);
        }
    }
    match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly error.
fn friendly_error(url: &str, err: &reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout(format!("Connection to {url} timed out"));
    }
    if err.is_connect() {
        return ApiError::Network(format!("Cannot reach storefront backend at {url}"));
    }
    if err.is_builder() {
        return ApiError::InvalidUrl(url.to_string());
    }
    ApiError::Network(format!("Network error communicating with {url}: {err}"))
}

/// Fallback message for an HTTP status code without a usable body.
fn status_message(status: StatusCode) -> String {
    match status.as_u16() {
        400 => "Request was rejected by the server".to_string(),
        401 => "Session expired. Please login again".to_string(),
        403 => "You are not allowed to do that".to_string(),
        404 => "Requested resource was not found".to_string(),
        s if s >= 500 => format!("Storefront server error (HTTP {s})"),
        s => format!("Unexpected response from storefront (HTTP {s})"),
    }
}

/// Extract the backend's `message` (or `error`) field from an error body.
fn backend_message(body_text: &str) -> Option<String> {
    let json = serde_json::from_str::<Value>(body_text).ok()?;
    json.get("message")
        .or_else(|| json.get("error"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// One outgoing request as seen by a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub bearer: Option<String>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and return the JSON body (`Value::Null` when empty).
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError>;
}

/// reqwest-backed transport for the real backend.
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = normalize_base_url(base_url);
        if base_url.is_empty() {
            return Err(ApiError::InvalidUrl("empty base URL".into()));
        }
        Url::parse(&base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let full_url = format!("{}{}", self.base_url, request.path);
        let mut req = self
            .client
            .request(request.method.clone(), &full_url)
            .header("Content-Type", "application/json");
        if let Some(token) = request.bearer.as_deref() {
            req = req.bearer_auth(token);
        }
        if let Some(body) = request.body.as_ref() {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;
        let status = resp.status();
        let body_text = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            let message = backend_message(&body_text).unwrap_or_else(|| status_message(status));
            debug!(
                method = %request.method,
                path = %request.path,
                status = status.as_u16(),
                message = %message,
                "storefront request failed"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        if body_text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body_text).map_err(|e| ApiError::InvalidJson(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Authenticated client
// ---------------------------------------------------------------------------

/// Backend client shared by every store. Once a token is set it is attached
/// as `Authorization: Bearer <token>` to every request.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    token: RwLock<Option<Zeroizing<String>>>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            token: RwLock::new(None),
        }
    }

    pub fn set_token(&self, token: &str) {
        match self.token.write() {
            Ok(mut guard) => *guard = Some(Zeroizing::new(token.to_string())),
            Err(poisoned) => *poisoned.into_inner() = Some(Zeroizing::new(token.to_string())),
        }
    }

    pub fn clear_token(&self) {
        match self.token.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    pub fn has_token(&self) -> bool {
        self.bearer().is_some()
    }

    fn bearer(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.as_ref().map(|t| t.to_string()),
            Err(poisoned) => poisoned.into_inner().as_ref().map(|t| t.to_string()),
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let request = ApiRequest {
            method: method.clone(),
            path: path.to_string(),
            body,
            bearer: self.bearer(),
        };
        let result = self.transport.send(request).await;
        if let Err(ref e) = result {
            warn!(method = %method, path = %path, error = %e, "storefront API call failed");
        }
        result
    }

    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        self.request(Method::POST, path, body).await
    }

    pub async fn patch(&self, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        self.request(Method::PATCH, path, body).await
    }

    pub async fn delete(&self, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        self.request(Method::DELETE, path, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use serde_json::json;

    #[test]
    fn normalize_base_url_adds_scheme_and_strips_api() {
        assert_eq!(
            normalize_base_url("192.168.88.7:5000/api/"),
            "http://192.168.88.7:5000"
        );
        assert_eq!(
            normalize_base_url("localhost:5000"),
            "http://localhost:5000"
        );
        assert_eq!(
            normalize_base_url(" shop.ktl.app/ "),
            "https://shop.ktl.app"
        );
        assert_eq!(
            normalize_base_url("https://shop.ktl.app/api"),
            "https://shop.ktl.app"
        );
        assert_eq!(normalize_base_url("   "), "");
    }

    #[test]
    fn path_with_query_encodes_values() {
        assert_eq!(
            path_with_query(
                "/api/products/public",
                &[("category", "fruits & veg".into()), ("limit", "10".into())]
            ),
            "/api/products/public?category=fruits+%26+veg&limit=10"
        );
        assert_eq!(path_with_query("/api/stores", &[]), "/api/stores");
    }

    #[test]
    fn backend_message_reads_message_or_error() {
        assert_eq!(
            backend_message(r#"{"message":"Invalid credentials"}"#).as_deref(),
            Some("Invalid credentials")
        );
        assert_eq!(
            backend_message(r#"{"error":"Cart not found"}"#).as_deref(),
            Some("Cart not found")
        );
        assert_eq!(backend_message("<html>"), None);
        assert_eq!(backend_message(r#"{"message":"  "}"#), None);
    }

    #[test]
    fn http_transport_rejects_empty_base_url() {
        let err = HttpTransport::new("", DEFAULT_TIMEOUT)
            .err()
            .expect("empty url should fail");
        assert!(matches!(err, ApiError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn bearer_token_is_attached_after_set_and_dropped_after_clear() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond(Method::GET, "/api/cart", json!({ "totalItems": 0 }));
        let client = ApiClient::new(fake.clone());

        client.get("/api/cart").await.expect("anonymous call");
        client.set_token("tok-1");
        client.get("/api/cart").await.expect("authenticated call");
        client.clear_token();
        client.get("/api/cart").await.expect("anonymous again");

        let bearers: Vec<Option<String>> =
            fake.requests().into_iter().map(|r| r.bearer).collect();
        assert_eq!(bearers, vec![None, Some("tok-1".to_string()), None]);
        assert!(!client.has_token());
    }
}

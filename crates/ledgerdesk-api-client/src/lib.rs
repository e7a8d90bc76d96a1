//! Reqwest boundary for the Ledgerdesk backend API.
//!
//! Every request goes out with JSON content/accept headers, a fixed
//! timeout, and (unless opted out per request) the stored bearer token.
//! The busy counter is held for the whole exchange through a drop guard,
//! a 401 anywhere fires the unauthorized hook so the shell can tear the
//! session down, and response bodies are decoded exactly once into the
//! core's [`Exchange`] / [`ListResult`] shapes.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use ledgerdesk_client_core::busy::BusyCounter;
use ledgerdesk_client_core::envelope::{ApiEnvelope, ApiError, Exchange, ListResult};
use ledgerdesk_client_core::pagination::ListQuery;
use ledgerdesk_client_core::session::{AuthTransport, Identity};

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
/// Versioned path prefix appended to the configured base URL.
pub const API_PREFIX: &str = "/api/v1";
/// Identity probe used by the session's auth check.
pub const ME_PATH: &str = "/me";

#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl ApiClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Per-request opt-outs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
    /// Skip the `Authorization` header even when a token is stored.
    pub skip_auth: bool,
    /// Leave the global busy counter untouched for this request.
    pub skip_busy: bool,
}

type UnauthorizedHook = Arc<dyn Fn() + Send + Sync>;

pub struct ApiClient {
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
    busy: Arc<BusyCounter>,
    token: Mutex<Option<String>>,
    on_unauthorized: Option<UnauthorizedHook>,
}

impl ApiClient {
    pub fn new(config: ApiClientConfig) -> Result<Self, ApiError> {
        let base_url = normalize_base_url(&config.base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|error| ApiError::Config {
                message: error.to_string(),
            })?;

        Ok(Self {
            base_url,
            timeout: Duration::from_millis(config.timeout_ms.max(250)),
            http,
            busy: Arc::new(BusyCounter::new()),
            token: Mutex::new(None),
            on_unauthorized: None,
        })
    }

    /// Install the hook invoked on any 401 response.
    #[must_use]
    pub fn with_unauthorized_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_unauthorized = Some(Arc::new(hook));
        self
    }

    /// Store (or clear) the bearer token attached to subsequent requests.
    pub fn set_token(&self, token: Option<String>) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// The counter behind the global busy flag.
    #[must_use]
    pub fn busy(&self) -> Arc<BusyCounter> {
        Arc::clone(&self.busy)
    }

    /// Absolute URL for a request path; `None` for an empty path.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> Option<String> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with('/') {
            Some(format!("{}{}", self.base_url, trimmed))
        } else {
            Some(format!("{}/{}", self.base_url, trimmed))
        }
    }

    pub async fn get(&self, path: &str, options: RequestOptions) -> Result<Exchange, ApiError> {
        let (status, body) = self.send(Method::GET, path, None, None, options).await?;
        into_exchange(status, &body)
    }

    pub async fn post<Req>(
        &self,
        path: &str,
        payload: &Req,
        options: RequestOptions,
    ) -> Result<Exchange, ApiError>
    where
        Req: Serialize + ?Sized,
    {
        let body = encode_body(payload)?;
        let (status, bytes) = self
            .send(Method::POST, path, Some(body), None, options)
            .await?;
        into_exchange(status, &bytes)
    }

    pub async fn put<Req>(
        &self,
        path: &str,
        payload: &Req,
        options: RequestOptions,
    ) -> Result<Exchange, ApiError>
    where
        Req: Serialize + ?Sized,
    {
        let body = encode_body(payload)?;
        let (status, bytes) = self
            .send(Method::PUT, path, Some(body), None, options)
            .await?;
        into_exchange(status, &bytes)
    }

    pub async fn delete(&self, path: &str, options: RequestOptions) -> Result<Exchange, ApiError> {
        let (status, body) = self.send(Method::DELETE, path, None, None, options).await?;
        into_exchange(status, &body)
    }

    /// Fetch a list endpoint, deciding array-vs-envelope once at decode.
    pub async fn fetch_list<T>(
        &self,
        path: &str,
        query: &ListQuery,
        options: RequestOptions,
    ) -> Result<ListResult<T>, ApiError>
    where
        T: DeserializeOwned,
    {
        let pairs = query.to_query_pairs();
        let (status, body) = self
            .send(Method::GET, path, None, Some(&pairs), options)
            .await?;
        decode_list(status, &body)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: Option<&[(String, String)]>,
        options: RequestOptions,
    ) -> Result<(StatusCode, Vec<u8>), ApiError> {
        let url = self.endpoint(path).ok_or_else(|| ApiError::Config {
            message: "empty request path".to_string(),
        })?;

        let _busy = (!options.skip_busy).then(|| self.busy.begin());

        let mut request = self.http.request(method, url).timeout(self.timeout);
        if let Some(query) = query {
            request = request.query(query);
        }
        if !options.skip_auth {
            if let Some(token) = self.current_token() {
                request = request.bearer_auth(token);
            }
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|error| ApiError::Network {
            message: error.to_string(),
        })?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|error| ApiError::Network {
            message: error.to_string(),
        })?;

        if status == StatusCode::UNAUTHORIZED {
            tracing::debug!(path = %path, "unauthorized response, firing session teardown hook");
            if let Some(hook) = &self.on_unauthorized {
                hook();
            }
        }

        Ok((status, bytes.to_vec()))
    }

    fn current_token(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AuthTransport for ApiClient {
    /// Identity probe with an explicit token, bypassing the stored one.
    ///
    /// The unauthorized hook stays quiet here: a failed probe already
    /// tears the session down in the caller.
    async fn fetch_identity(&self, token: &str) -> Result<Identity, ApiError> {
        let url = self.endpoint(ME_PATH).ok_or_else(|| ApiError::Config {
            message: "empty request path".to_string(),
        })?;
        let _busy = self.busy.begin();

        let response = self
            .http
            .get(url)
            .timeout(self.timeout)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|error| ApiError::Network {
                message: error.to_string(),
            })?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|error| ApiError::Network {
            message: error.to_string(),
        })?;

        let exchange = into_exchange(status, &bytes)?;
        decode_data(&exchange)
    }
}

/// Decode the typed payload out of an exchange's `data` field.
pub fn decode_data<T: DeserializeOwned>(exchange: &Exchange) -> Result<T, ApiError> {
    serde_json::from_value(exchange.payload.data.clone()).map_err(|error| ApiError::Decode {
        status: exchange.status,
        message: error.to_string(),
    })
}

fn encode_body<Req: Serialize + ?Sized>(payload: &Req) -> Result<Value, ApiError> {
    serde_json::to_value(payload).map_err(|error| ApiError::Config {
        message: format!("request body serialization failed: {error}"),
    })
}

fn normalize_base_url(base_url: &str) -> Result<String, ApiError> {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ApiError::Config {
            message: "base url must not be empty".to_string(),
        });
    }
    Ok(format!("{trimmed}{API_PREFIX}"))
}

/// Turn a settled response into an [`Exchange`] or the matching failure.
fn into_exchange(status: StatusCode, body: &[u8]) -> Result<Exchange, ApiError> {
    if !status.is_success() {
        return Err(classify_failure(status, body));
    }
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(body).map_err(|error| ApiError::Decode {
            status,
            message: error.to_string(),
        })?
    };
    Ok(Exchange {
        status,
        payload: ApiEnvelope::from_value(value),
    })
}

/// Map a non-2xx response onto the failure taxonomy.
///
/// A parseable `{errors: {..}}` map makes it a validation failure; any
/// other reachable-server answer is a request failure carrying whatever
/// message the body had.
fn classify_failure(status: StatusCode, body: &[u8]) -> ApiError {
    let envelope = serde_json::from_slice::<Value>(body)
        .map(ApiEnvelope::from_value)
        .unwrap_or_default();
    if envelope.has_field_errors() {
        ApiError::Validation {
            status,
            message: envelope.message,
            errors: envelope.errors.unwrap_or_default(),
        }
    } else {
        ApiError::Request {
            status,
            message: envelope.message,
        }
    }
}

fn decode_list<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<ListResult<T>, ApiError> {
    if !status.is_success() {
        return Err(classify_failure(status, body));
    }
    serde_json::from_slice(body).map_err(|error| ApiError::Decode {
        status,
        message: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> ApiClient {
        ApiClient::new(ApiClientConfig::new(base_url)).expect("api client")
    }

    #[test]
    fn endpoint_builder_normalizes_paths() {
        let client = client("https://console.example.com/");
        assert_eq!(
            client.endpoint("/users"),
            Some("https://console.example.com/api/v1/users".to_string())
        );
        assert_eq!(
            client.endpoint("users"),
            Some("https://console.example.com/api/v1/users".to_string())
        );
        assert_eq!(client.endpoint("  "), None);
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let result = ApiClient::new(ApiClientConfig::new("   "));
        assert!(matches!(result, Err(ApiError::Config { .. })));
    }

    #[test]
    fn non_2xx_with_structured_errors_is_a_validation_failure() {
        let body = br#"{"message":"The given data was invalid.","errors":{"email":["taken"]}}"#;
        let error = classify_failure(StatusCode::UNPROCESSABLE_ENTITY, body);

        let ApiError::Validation {
            status,
            message,
            errors,
        } = error
        else {
            panic!("expected a validation failure");
        };
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(message.as_deref(), Some("The given data was invalid."));
        assert_eq!(errors["email"], vec!["taken".to_string()]);
    }

    #[test]
    fn non_2xx_without_errors_is_a_request_failure() {
        let error = classify_failure(StatusCode::NOT_FOUND, br#"{"message":"No such user"}"#);
        assert!(matches!(
            error,
            ApiError::Request { status, .. } if status == StatusCode::NOT_FOUND
        ));

        // Unparseable bodies still map cleanly.
        let error = classify_failure(StatusCode::BAD_GATEWAY, b"<html>upstream died</html>");
        assert!(matches!(
            error,
            ApiError::Request { status, message: None } if status == StatusCode::BAD_GATEWAY
        ));
    }

    #[test]
    fn success_body_becomes_an_exchange() {
        let exchange = into_exchange(
            StatusCode::CREATED,
            br#"{"message":"User created","data":{"id":7}}"#,
        )
        .expect("exchange");
        assert_eq!(exchange.payload.message.as_deref(), Some("User created"));

        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct Created {
            id: u64,
        }
        assert_eq!(decode_data::<Created>(&exchange).expect("data"), Created { id: 7 });
    }

    #[test]
    fn empty_success_body_is_a_null_envelope() {
        let exchange = into_exchange(StatusCode::NO_CONTENT, b"").expect("exchange");
        assert!(exchange.payload.message.is_none());
        assert!(!exchange.payload.has_field_errors());
    }

    #[test]
    fn malformed_success_body_is_a_decode_failure() {
        let error = into_exchange(StatusCode::OK, b"not json").expect_err("decode failure");
        assert!(matches!(error, ApiError::Decode { .. }));
    }

    #[test]
    fn list_bodies_decode_as_array_or_envelope() {
        let bare: ListResult<u32> = decode_list(StatusCode::OK, b"[1,2,3]").expect("bare list");
        assert_eq!(bare, ListResult::Items(vec![1, 2, 3]));

        let paged: ListResult<u32> = decode_list(
            StatusCode::OK,
            br#"{"data":[4,5],"current_page":1,"per_page":2,"total":2}"#,
        )
        .expect("page envelope");
        assert!(matches!(paged, ListResult::Page(_)));
    }
}

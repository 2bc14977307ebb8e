use std::fmt;
use std::sync::Arc;

use atelier_config::{ClientConfig, ServiceEndpoints};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, info};

use super::auth_retry::{AuthRetry, HttpTokenRefresher, TokenRefresher};
use super::routing::resolve_url;
use super::transport::{OutboundRequest, RawResponse, ReqwestTransport, Transport};
use crate::errors::{ApiError, ApiResult};
use crate::session::SessionStore;

const JSON: &str = "application/json";

/// Relative request description, the fetch-style input of the request
/// layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> ApiResult<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn with_query(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Decoded success body. `Empty` covers 204 and zero-length bodies, which
/// are never handed to the JSON parser.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Json(Value),
}

impl ResponseBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, ResponseBody::Empty)
    }

    pub fn into_value(self) -> Value {
        match self {
            ResponseBody::Empty => Value::Null,
            ResponseBody::Json(value) => value,
        }
    }

    /// Deserialize into `T`; an empty body reads as `null`, which `()` and
    /// `Option<_>` accept.
    pub fn deserialize<T: DeserializeOwned>(self) -> ApiResult<T> {
        Ok(serde_json::from_value(self.into_value())?)
    }
}

/// Route `request`, attach the JSON content headers and serialize the
/// body. Authorization is added later by [`AuthRetry`].
pub fn prepare_request(
    endpoints: &ServiceEndpoints,
    request: &ApiRequest,
) -> ApiResult<OutboundRequest> {
    let url = resolve_url(endpoints, &request.path, &request.query)?;
    let mut outbound = OutboundRequest::new(request.method.clone(), url);
    outbound
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
    outbound.headers.insert(ACCEPT, HeaderValue::from_static(JSON));
    if let Some(body) = &request.body {
        outbound.body = Some(serde_json::to_vec(body)?);
    }
    Ok(outbound)
}

/// Turn a raw response into a body or a status error.
pub fn interpret_response(response: RawResponse) -> ApiResult<ResponseBody> {
    let status = response.status;
    if !status.is_success() {
        return Err(ApiError::Status {
            status,
            message: error_message(status, &response.body),
        });
    }

    if status == StatusCode::NO_CONTENT
        || response.body.iter().all(u8::is_ascii_whitespace)
    {
        return Ok(ResponseBody::Empty);
    }

    Ok(ResponseBody::Json(serde_json::from_slice(&response.body)?))
}

/// Server-provided `message`/`error` text, falling back to the status'
/// reason phrase.
pub fn error_message(status: StatusCode, body: &[u8]) -> String {
    let from_body = serde_json::from_slice::<Value>(body).ok().and_then(|value| {
        ["message", "error"].iter().find_map(|key| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        })
    });

    from_body.unwrap_or_else(|| match status.canonical_reason() {
        Some(reason) => reason.to_string(),
        None => format!("Request failed with status {}", status.as_u16()),
    })
}

/// API client with session-aware request handling
#[derive(Clone)]
pub struct ApiClient {
    endpoints: Arc<ServiceEndpoints>,
    transport: Arc<dyn Transport>,
    auth: Arc<AuthRetry>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("endpoints", &self.endpoints)
            .field("transport", &self.transport)
            .field("has_token", &self.auth.session().is_authenticated())
            .finish()
    }
}

impl ApiClient {
    pub fn new(
        endpoints: ServiceEndpoints,
        transport: Arc<dyn Transport>,
        session: SessionStore,
        refresher: Option<Arc<dyn TokenRefresher>>,
    ) -> Self {
        let auth = match refresher {
            Some(refresher) => AuthRetry::new(session, refresher),
            None => AuthRetry::without_refresh(session),
        };
        Self {
            endpoints: Arc::new(endpoints),
            transport,
            auth: Arc::new(auth),
        }
    }

    /// Production wiring: reqwest transport with the configured timeout and
    /// a refresher that calls the auth service's refresh endpoint.
    pub fn from_config(config: &ClientConfig, session: SessionStore) -> ApiResult<Self> {
        let transport: Arc<dyn Transport> =
            Arc::new(ReqwestTransport::new(config.request_timeout())?);
        let refresher: Arc<dyn TokenRefresher> = Arc::new(HttpTokenRefresher::new(
            config.endpoints.clone(),
            transport.clone(),
        ));

        info!(
            "[ApiClient] Creating API client (auth: {}, gallery: {}, treasury: {}, user: {})",
            config.endpoints.auth,
            config.endpoints.gallery,
            config.endpoints.treasury,
            config.endpoints.user
        );

        Ok(Self::new(
            config.endpoints.clone(),
            transport,
            session,
            Some(refresher),
        ))
    }

    pub fn session(&self) -> &SessionStore {
        self.auth.session()
    }

    pub fn endpoints(&self) -> &ServiceEndpoints {
        &self.endpoints
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// Execute a request through the auth-retry stage
    pub async fn execute(&self, request: ApiRequest) -> ApiResult<ResponseBody> {
        let outbound = prepare_request(&self.endpoints, &request)?;
        debug!("[ApiClient] {} {}", outbound.method, outbound.url);

        let response = self.auth.execute(self.transport.as_ref(), outbound).await?;
        interpret_response(response)
    }

    /// Execute and deserialize the body
    pub async fn execute_json<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<T> {
        self.execute(request).await?.deserialize()
    }

    /// GET request with authentication
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.execute_json(ApiRequest::get(path)).await
    }

    /// GET request with query pairs
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        let request = query
            .iter()
            .fold(ApiRequest::get(path), |request, (key, value)| {
                request.with_query(*key, value.clone())
            });
        self.execute_json(request).await
    }

    /// POST request with authentication
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.execute_json(ApiRequest::post(path).with_json(body)?).await
    }

    /// PUT request
    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.execute_json(ApiRequest::put(path).with_json(body)?).await
    }

    /// DELETE request
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.execute_json(ApiRequest::delete(path)).await
    }
}

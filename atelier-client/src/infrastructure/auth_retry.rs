//! Auth-retry stage
//!
//! Sits between the API client and the transport. It attaches the bearer
//! token and, on a 401, refreshes the session once and reissues the
//! original request once. Nothing else in the request layer retries.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use atelier_config::ServiceEndpoints;
use atelier_model::SessionTokens;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::api_client::{ApiRequest, interpret_response, prepare_request};
use super::transport::{OutboundRequest, RawResponse, Transport};
use crate::api_routes;
use crate::errors::{ApiError, ApiResult};
use crate::session::SessionStore;

/// Exchanges a refresh token for a new session.
#[async_trait]
pub trait TokenRefresher: Send + Sync + fmt::Debug {
    async fn refresh(&self, refresh_token: &str) -> ApiResult<SessionTokens>;
}

/// Refresher that posts to the auth service directly on the transport,
/// bypassing [`AuthRetry`] so a failing refresh can never recurse.
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    endpoints: ServiceEndpoints,
    transport: Arc<dyn Transport>,
}

impl HttpTokenRefresher {
    pub fn new(endpoints: ServiceEndpoints, transport: Arc<dyn Transport>) -> Self {
        Self {
            endpoints,
            transport,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> ApiResult<SessionTokens> {
        let request = ApiRequest::post(api_routes::auth::REFRESH)
            .with_json(&RefreshRequest { refresh_token })?;
        let outbound = prepare_request(&self.endpoints, &request)?;
        let response = self.transport.send(outbound).await?;
        interpret_response(response)?.deserialize()
    }
}

/// Single-retry authorization middleware.
pub struct AuthRetry {
    session: SessionStore,
    refresher: Option<Arc<dyn TokenRefresher>>,
    /// Serializes refreshes so concurrent 401s share one refresh call.
    refresh_lock: Mutex<()>,
}

impl fmt::Debug for AuthRetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRetry")
            .field("session", &self.session)
            .field("can_refresh", &self.refresher.is_some())
            .finish()
    }
}

impl AuthRetry {
    pub fn new(session: SessionStore, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            session,
            refresher: Some(refresher),
            refresh_lock: Mutex::new(()),
        }
    }

    /// A stage that never refreshes; every 401 ends the session.
    pub fn without_refresh(session: SessionStore) -> Self {
        Self {
            session,
            refresher: None,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Send `request`, retrying exactly once after a successful refresh.
    ///
    /// Non-401 responses (including other error statuses) are returned
    /// unchanged for the caller to interpret, as is a 401 to a request sent
    /// without a session (a rejected login). Transport errors propagate
    /// as-is.
    pub async fn execute(
        &self,
        transport: &dyn Transport,
        request: OutboundRequest,
    ) -> ApiResult<RawResponse> {
        let sent_with = self.session.access_token();
        let response = transport.send(self.authorize(request.clone())).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        if sent_with.is_none() && !self.session.is_authenticated() {
            debug!(
                "[AuthRetry] {} {} returned 401 without a session, nothing to refresh",
                request.method,
                request.url.path()
            );
            return Ok(response);
        }

        info!(
            "[AuthRetry] {} {} returned 401, attempting token refresh",
            request.method,
            request.url.path()
        );
        self.refresh_session(sent_with.as_deref()).await?;

        let retried = transport.send(self.authorize(request)).await?;
        if retried.status == StatusCode::UNAUTHORIZED {
            warn!("[AuthRetry] Request still unauthorized after refresh, ending session");
            self.session.clear();
            return Err(ApiError::SessionExpired);
        }
        Ok(retried)
    }

    fn authorize(&self, mut request: OutboundRequest) -> OutboundRequest {
        let header = self
            .session
            .bearer()
            .and_then(|bearer| HeaderValue::from_str(&bearer).ok());
        match header {
            Some(value) => {
                request.headers.insert(AUTHORIZATION, value);
            }
            None => {
                request.headers.remove(AUTHORIZATION);
            }
        }
        request
    }

    async fn refresh_session(&self, sent_with: Option<&str>) -> ApiResult<()> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.session.get();
        let current_access = current.as_ref().map(|tokens| tokens.access_token.as_str());
        if current_access.is_some() && current_access != sent_with {
            debug!("[AuthRetry] Session already refreshed by a concurrent request");
            return Ok(());
        }

        let refresh_token = current
            .as_ref()
            .and_then(|tokens| tokens.refresh_token.clone())
            .filter(|token| !token.is_empty());

        let (Some(refresh_token), Some(refresher)) = (refresh_token, self.refresher.as_ref())
        else {
            warn!("[AuthRetry] No refresh available, ending session");
            self.session.clear();
            return Err(ApiError::SessionExpired);
        };

        match refresher.refresh(&refresh_token).await {
            Ok(mut tokens) => {
                if tokens.refresh_token.is_none() {
                    // Servers that do not rotate refresh tokens omit it.
                    tokens.refresh_token = Some(refresh_token);
                }
                info!("[AuthRetry] Token refreshed successfully, retrying request");
                self.session.set(tokens);
                Ok(())
            }
            Err(err) => {
                warn!("[AuthRetry] Token refresh failed: {}", err);
                self.session.clear();
                Err(ApiError::SessionExpired)
            }
        }
    }
}

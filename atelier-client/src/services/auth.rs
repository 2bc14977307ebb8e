use atelier_model::SessionTokens;
use serde::Serialize;
use tracing::{info, warn};

use crate::api_routes::auth;
use crate::errors::{ApiError, ApiResult};
use crate::infrastructure::{ApiClient, ApiRequest};
use crate::security::SecureCredential;

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogoutRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

/// Sign-in and sign-out against the auth service.
#[derive(Debug, Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Authenticate and store the issued tokens in the session.
    pub async fn login(
        &self,
        username: &str,
        password: SecureCredential,
    ) -> ApiResult<()> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(ApiError::Validation(
                "Username and password are required".to_string(),
            ));
        }

        let body = LoginRequest {
            username,
            password: password.as_str(),
        };
        let tokens: SessionTokens = self.client.post(auth::LOGIN, &body).await?;
        if tokens.access_token.is_empty() {
            return Err(ApiError::Validation(
                "Server returned an empty access token".to_string(),
            ));
        }

        info!("[Auth] Signed in as {}", username);
        self.client.session().set(tokens);
        Ok(())
    }

    /// Tell the server the session is over, then drop it locally.
    ///
    /// The server call is best-effort; the local session is cleared even
    /// when it fails.
    pub async fn logout(&self) -> ApiResult<()> {
        let session = self.client.session();
        if !session.is_authenticated() {
            return Ok(());
        }

        let body = LogoutRequest {
            refresh_token: session.refresh_token(),
        };
        let result = match ApiRequest::post(auth::LOGOUT).with_json(&body) {
            Ok(request) => self.client.execute(request).await.map(|_| ()),
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            warn!("[Auth] Server logout failed, clearing session anyway: {}", err);
        }

        session.clear();
        info!("[Auth] Signed out");
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.session().is_authenticated()
    }
}

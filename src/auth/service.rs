//! Auth endpoints on top of [`HttpClient`]

use super::types::{AuthResponse, LoginCredentials, RegisterData, User};
use crate::error::{ApiError, ApiResult, ErrorKind};
use crate::http::HttpClient;
use crate::types::{JsonValue, RequestOptions};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{info, warn};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const CURRENT_USER_PATH: &str = "/auth/me";

/// Login, registration and session helpers
#[derive(Debug, Clone)]
pub struct AuthService {
    client: HttpClient,
}

impl AuthService {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Underlying client
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Sign in and persist the returned token pair
    pub async fn login(&self, credentials: &LoginCredentials) -> ApiResult<AuthResponse> {
        let response = self
            .client
            .post::<_, AuthResponse>(LOGIN_PATH, credentials, anonymous())
            .await?
            .data;

        self.store_session(&response).await?;
        info!(user = %response.user.email, "Signed in");
        Ok(response)
    }

    /// Create an account and persist the returned token pair
    ///
    /// Mismatched passwords are rejected without contacting the server.
    pub async fn register(&self, data: &RegisterData) -> ApiResult<AuthResponse> {
        if data.password != data.confirm_password {
            let mut errors = BTreeMap::new();
            errors.insert(
                "confirmPassword".to_string(),
                vec!["Passwords do not match".to_string()],
            );
            return Err(
                ApiError::new(ErrorKind::Validation, 422, "Passwords do not match")
                    .with_errors(errors),
            );
        }

        let response = self
            .client
            .post::<_, AuthResponse>(REGISTER_PATH, data, anonymous())
            .await?
            .data;

        self.store_session(&response).await?;
        info!(user = %response.user.email, "Registered");
        Ok(response)
    }

    /// Sign out
    ///
    /// The local session is always cleared; a failed server call is only
    /// logged.
    pub async fn logout(&self) -> ApiResult<()> {
        let options = RequestOptions::new().skip_cache().skip_deduplication();
        if let Err(e) = self
            .client
            .post::<_, JsonValue>(LOGOUT_PATH, &json!({}), options)
            .await
        {
            warn!(error = %e, "Logout request failed, clearing local session anyway");
        }

        self.client.clear_session().await?;
        info!("Signed out");
        Ok(())
    }

    /// The signed-in user, always fetched fresh
    pub async fn current_user(&self) -> ApiResult<User> {
        Ok(self
            .client
            .get::<User>(CURRENT_USER_PATH, RequestOptions::new().skip_cache())
            .await?
            .data)
    }

    /// Whether an access token is stored
    pub async fn is_authenticated(&self) -> bool {
        matches!(self.client.tokens().access_token().await, Ok(Some(token)) if !token.is_empty())
    }

    async fn store_session(&self, response: &AuthResponse) -> ApiResult<()> {
        self.client
            .tokens()
            .set_tokens(&response.access_token, &response.refresh_token)
            .await?;
        // a different user must not see the previous user's responses
        self.client.cache().clear();
        Ok(())
    }
}

fn anonymous() -> RequestOptions {
    RequestOptions::new()
        .skip_auth()
        .skip_cache()
        .skip_deduplication()
}

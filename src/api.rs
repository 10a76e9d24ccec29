// Account API
// Typed authentication surface over the client. Tokens always travel in
// Authorization response headers, never in JSON bodies.

use reqwest::Method;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::auth::{bearer_token, TokenStore};
use crate::client::AuthClient;
use crate::error::ApiError;

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignupRequest<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    locale: Option<&'a str>,
}

/// Payload for the OAuth authorization-code exchange
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthExchange<'a> {
    pub code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<&'a str>,
}

/// Result of the first login step
#[derive(Debug)]
pub enum LoginOutcome {
    /// Credentials accepted; the session token is stored
    LoggedIn,

    /// A second factor is required; complete it with [`AccountApi::verify_two_factor`]
    TwoFactorRequired { challenge: String },
}

/// Authentication operations of the Autoflow API
pub struct AccountApi {
    client: Arc<AuthClient>,
    store: Arc<TokenStore>,
}

impl AccountApi {
    pub fn new(client: Arc<AuthClient>, store: Arc<TokenStore>) -> Self {
        Self { client, store }
    }

    /// Password login.
    ///
    /// A 200 carries the session token in the response header and it is
    /// stored immediately. A 202 means two-factor verification is required:
    /// the header carries a short-lived challenge token instead, which is
    /// returned to the caller and NOT stored.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        let response = self
            .client
            .post("/auth/login", &LoginRequest { email, password })
            .await?;

        if response.status().as_u16() == 202 {
            let challenge = bearer_token(response.headers()).ok_or(ApiError::MissingToken)?;
            tracing::debug!("Login requires a second factor");
            return Ok(LoginOutcome::TwoFactorRequired { challenge });
        }

        let token = bearer_token(response.headers()).ok_or(ApiError::MissingToken)?;
        self.store.set(&token).await;
        tracing::info!("Signed in");
        Ok(LoginOutcome::LoggedIn)
    }

    /// Second login step. The challenge token authenticates the verify call
    /// itself, so this bypasses the stored token and expiry recovery.
    pub async fn verify_two_factor(&self, challenge: &str, code: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .execute_with_bearer(
                Method::POST,
                "/auth/2fa/verify",
                Some(json!({ "code": code })),
                Some(challenge),
            )
            .await?;

        let token = bearer_token(response.headers()).ok_or(ApiError::MissingToken)?;
        self.store.set(&token).await;
        tracing::info!("Signed in");
        Ok(())
    }

    /// Exchange an OAuth authorization code for a session token
    pub async fn oauth_login(
        &self,
        provider: &str,
        exchange: &OAuthExchange<'_>,
    ) -> Result<(), ApiError> {
        let path = format!("/auth/login/{}", provider);
        let response = self.client.post(&path, exchange).await?;

        let token = bearer_token(response.headers()).ok_or(ApiError::MissingToken)?;
        self.store.set(&token).await;
        tracing::info!(provider, "Signed in");
        Ok(())
    }

    /// Create an account. Sign-in still requires e-mail verification.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        locale: Option<&str>,
    ) -> Result<(), ApiError> {
        self.client
            .post(
                "/auth/signup",
                &SignupRequest {
                    email,
                    password,
                    locale,
                },
            )
            .await?;
        Ok(())
    }

    /// Confirm the e-mail verification code from the signup mail
    pub async fn verify_email(&self, code: &str) -> Result<(), ApiError> {
        self.client.get(&format!("/auth/verify/{}", code)).await?;
        Ok(())
    }

    /// Drop the local session. There is no server-side logout call.
    pub async fn logout(&self) {
        self.store.clear().await;
        tracing::info!("Signed out");
    }
}

// Authenticated HTTP client
// Attaches the current token to outgoing requests and transparently recovers
// from token expiry with a single refresh-and-resend cycle

use anyhow::Context;
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{RefreshCoordinator, TokenStore};
use crate::error::ApiError;

/// HTTP client for the Autoflow API.
///
/// Every request carries `Authorization: Bearer <token>` from the store when
/// a token is present (its absence is not an error; some endpoints are
/// public). A 401 response starts, or joins, a refresh cycle and the
/// original request is resent exactly once with the fresh token. Callers
/// never see the refresh machinery.
pub struct AuthClient {
    /// Shared HTTP client with connection pooling
    http: Client,

    base_url: Url,

    store: Arc<TokenStore>,

    coordinator: Arc<RefreshCoordinator>,
}

impl AuthClient {
    pub fn new(
        base_url: Url,
        store: Arc<TokenStore>,
        coordinator: Arc<RefreshCoordinator>,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url,
            store,
            coordinator,
        })
    }

    pub async fn get(&self, path: &str) -> Result<Response, ApiError> {
        self.execute(Method::GET, path, None).await
    }

    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Response, ApiError> {
        let body = serde_json::to_value(body).context("Failed to serialize request body")?;
        self.execute(Method::POST, path, Some(body)).await
    }

    pub async fn patch<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Response, ApiError> {
        let body = serde_json::to_value(body).context("Failed to serialize request body")?;
        self.execute(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Response, ApiError> {
        self.execute(Method::DELETE, path, None).await
    }

    /// Send with the stored token, recovering from expiry once
    pub(crate) async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Response, ApiError> {
        let token = self.store.get().await;
        let response = self
            .send(method.clone(), path, body.as_ref(), token.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return finalize(response).await;
        }

        // First 401 on this request: one refresh-and-resend cycle. Whatever
        // the resend returns stands; a repeat 401 is terminal.
        tracing::debug!(%method, path, "Received 401, entering refresh cycle");
        let fresh = self.coordinator.refresh_token().await?;

        let response = self.send(method, path, body.as_ref(), Some(&fresh)).await?;
        finalize(response).await
    }

    /// Send with an explicit bearer credential and no expiry recovery.
    /// Used by authentication flows that carry short-lived challenge tokens
    /// instead of the stored session token.
    pub(crate) async fn execute_with_bearer(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        bearer: Option<&str>,
    ) -> Result<Response, ApiError> {
        let response = self.send(method, path, body.as_ref(), bearer).await?;
        finalize(response).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> Result<Response, ApiError> {
        let url = self
            .base_url
            .join(path)
            .with_context(|| format!("Invalid request path: {}", path))?;

        let mut request = self.http.request(method.clone(), url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(%method, path, "Sending request");
        let response = request.send().await?;

        tracing::debug!(
            %method,
            path,
            status = response.status().as_u16(),
            "Received response"
        );
        Ok(response)
    }
}

/// Pass success responses through unchanged; surface anything else as a
/// typed status failure
async fn finalize(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), "Request failed");
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

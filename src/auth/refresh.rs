// Token refresh channel
//
// The refresh call gets its own HTTP client so it never passes through the
// authenticated client's recovery logic: a 401 from the refresh endpoint must
// surface as a refresh failure, not trigger another refresh.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;

use crate::error::RefreshError;

use super::token::bearer_token;

/// Upstream seam for the refresh call.
///
/// The coordinator depends only on this trait, so tests can gate or count
/// refresh attempts without a live server.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Exchange the expiring token for a fresh one
    async fn refresh(&self, expiring: Option<&str>) -> std::result::Result<String, RefreshError>;
}

/// HTTP implementation of the refresh call: `POST /auth/refresh` against the
/// configured origin, same timeout and cookie policy as ordinary requests.
pub struct RefreshChannel {
    http: Client,
    refresh_url: Url,
}

impl RefreshChannel {
    pub fn new(base_url: &Url, connect_timeout: u64, request_timeout: u64) -> Result<Self> {
        let http = Client::builder()
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create refresh HTTP client")?;

        let refresh_url = base_url
            .join("auth/refresh")
            .context("Invalid base URL for refresh endpoint")?;

        Ok(Self { http, refresh_url })
    }
}

#[async_trait]
impl TokenRefresher for RefreshChannel {
    async fn refresh(&self, expiring: Option<&str>) -> std::result::Result<String, RefreshError> {
        tracing::debug!(url = %self.refresh_url, "Requesting token refresh");

        // The expiring credential authenticates the refresh itself; this
        // system has no separate refresh secret.
        let mut request = self.http.post(self.refresh_url.clone());
        if let Some(token) = expiring {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Token refresh rejected");
            return Err(RefreshError::Failed {
                status: status.as_u16(),
                message,
            });
        }

        // The new token comes back in the Authorization response header,
        // never in the body. A 2xx without it counts as a failed refresh.
        match bearer_token(response.headers()) {
            Some(token) => {
                tracing::debug!("Token refresh succeeded");
                Ok(token)
            }
            None => {
                tracing::warn!("Refresh response carried no usable Authorization header");
                Err(RefreshError::Malformed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_for(server: &mockito::ServerGuard) -> RefreshChannel {
        let base = Url::parse(&server.url()).unwrap();
        RefreshChannel::new(&base, 5, 10).unwrap()
    }

    #[tokio::test]
    async fn test_refresh_returns_header_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/refresh")
            .match_header("authorization", "Bearer T1")
            .with_status(200)
            .with_header("authorization", "Bearer T2")
            .create_async()
            .await;

        let channel = channel_for(&server);
        let token = channel.refresh(Some("T1")).await.unwrap();

        assert_eq!(token, "T2");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_rejection_is_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/refresh")
            .with_status(400)
            .with_body("invalid token")
            .create_async()
            .await;

        let channel = channel_for(&server);
        let err = channel.refresh(Some("T1")).await.unwrap_err();

        match err {
            RefreshError::Failed { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid token");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_header_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/refresh")
            .with_status(200)
            .create_async()
            .await;

        let channel = channel_for(&server);
        let err = channel.refresh(Some("T1")).await.unwrap_err();

        assert!(matches!(err, RefreshError::Malformed));
    }

    #[tokio::test]
    async fn test_no_stored_token_sends_no_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/refresh")
            .match_header("authorization", mockito::Matcher::Missing)
            .with_status(401)
            .create_async()
            .await;

        let channel = channel_for(&server);
        let err = channel.refresh(None).await.unwrap_err();

        assert!(matches!(err, RefreshError::Failed { status: 401, .. }));
        mock.assert_async().await;
    }
}

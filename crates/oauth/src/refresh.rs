//! OAuth refresh-grant exchange.

use {
    async_trait::async_trait,
    chrono::{TimeDelta, Utc},
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::{debug, warn},
};

use crate::{
    error::AuthError,
    types::{OAuthClient, RefreshedTokens},
};

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// One exchange, no retries.
    async fn refresh(
        &self,
        refresh_token: &Secret<String>,
        client: &OAuthClient,
    ) -> Result<RefreshedTokens, AuthError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Refreshes against the provider's token endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    http: reqwest::Client,
}

impl HttpTokenRefresher {
    /// `http` should carry the request timeout.
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(
        &self,
        refresh_token: &Secret<String>,
        client: &OAuthClient,
    ) -> Result<RefreshedTokens, AuthError> {
        // Launchpad expects `type=refresh`; `grant_type` covers standard servers.
        let form = [
            ("type", "refresh"),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose_secret().as_str()),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.expose_secret().as_str()),
            ("redirect_uri", client.redirect_uri.as_str()),
        ];

        debug!(token_url = %client.token_url, "requesting token refresh");
        let response = self
            .http
            .post(client.token_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(AuthError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "token endpoint rejected refresh");
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(AuthError::Transport)?;
        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        if parsed.access_token.trim().is_empty() {
            return Err(AuthError::MalformedResponse(
                "empty access_token".to_string(),
            ));
        }

        let expires_at = parsed
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(TimeDelta::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));

        Ok(RefreshedTokens {
            access_token: Secret::new(parsed.access_token),
            refresh_token: parsed
                .refresh_token
                .filter(|t| !t.trim().is_empty())
                .map(Secret::new),
            expires_at,
        })
    }
}

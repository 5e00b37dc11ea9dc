//! The single gate through which outbound calls obtain authorization headers.

use std::{sync::Arc, time::Duration};

use {
    chrono::Utc,
    reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT},
    secrecy::ExposeSecret,
    tracing::{debug, info, warn},
};

use crate::{
    error::AuthError,
    refresh::TokenRefresher,
    store::{PersistOutcome, TokenStore},
    types::{ClientConfig, Credential},
};

pub struct AuthHeaderProvider {
    store: Arc<TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    client: ClientConfig,
    skew: Duration,
}

impl AuthHeaderProvider {
    pub fn new(
        store: Arc<TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        client: ClientConfig,
        skew: Duration,
    ) -> Self {
        Self {
            store,
            refresher,
            client,
            skew,
        }
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Headers for one outbound request, refreshing the token first if it is
    /// expired or about to expire.
    pub async fn headers(&self) -> Result<HeaderMap, AuthError> {
        if !self.store.is_valid(self.skew).await {
            self.refresh_if_stale().await?;
        }
        let credential = self.store.current().await;
        build_headers(&credential, &self.client.user_agent)
    }

    /// Refresh regardless of expiry.
    pub async fn force_refresh(&self) -> Result<PersistOutcome, AuthError> {
        let _gate = self.store.refresh_gate().await;
        let credential = self.store.current().await;
        self.refresh_with(&credential).await?.ok_or(
            AuthError::RefreshUnavailable(
                "needs a refresh token and BASECAMP_CLIENT_ID, BASECAMP_CLIENT_SECRET, BASECAMP_REDIRECT_URI",
            ),
        )
    }

    async fn refresh_if_stale(&self) -> Result<(), AuthError> {
        let _gate = self.store.refresh_gate().await;

        // Another caller may have refreshed while this one waited for the gate.
        let credential = self.store.current().await;
        if credential.is_valid_at(Utc::now(), self.skew) {
            debug!("token refreshed by a concurrent caller");
            return Ok(());
        }

        if self.refresh_with(&credential).await?.is_none() {
            warn!(
                expires_at = ?credential.expires_at,
                has_refresh_token = credential.can_refresh(),
                oauth_client_configured = self.client.oauth_client().is_some(),
                "token expired and cannot be refreshed, using it as-is"
            );
        }
        Ok(())
    }

    /// `Ok(None)` when refresh is not possible. Callers must hold the gate.
    async fn refresh_with(
        &self,
        credential: &Credential,
    ) -> Result<Option<PersistOutcome>, AuthError> {
        let (Some(refresh_token), Some(oauth)) =
            (credential.refresh_token.as_ref(), self.client.oauth_client())
        else {
            return Ok(None);
        };

        debug!(expires_at = ?credential.expires_at, "refreshing access token");
        let tokens = self.refresher.refresh(refresh_token, &oauth).await?;
        let next = credential.with_refreshed(tokens);
        info!(expires_at = ?next.expires_at, "access token refreshed");
        Ok(Some(self.store.replace(next).await))
    }
}

fn build_headers(credential: &Credential, user_agent: &str) -> Result<HeaderMap, AuthError> {
    let mut bearer = HeaderValue::try_from(format!(
        "Bearer {}",
        credential.access_token.expose_secret()
    ))
    .map_err(|_| AuthError::InvalidHeader("access token"))?;
    bearer.set_sensitive(true);

    let user_agent =
        HeaderValue::try_from(user_agent).map_err(|_| AuthError::InvalidHeader("user agent"))?;

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, bearer);
    headers.insert(USER_AGENT, user_agent);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::types::{OAuthClient, RefreshedTokens},
        async_trait::async_trait,
        chrono::{DateTime, TimeDelta},
        secrecy::Secret,
        std::sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        url::Url,
    };

    const SKEW: Duration = Duration::from_secs(300);

    /// Rotates tokens on every call and rejects refresh tokens it already rotated.
    struct RotatingRefresher {
        calls: AtomicUsize,
        latest_refresh: Mutex<String>,
        delay: Duration,
        fail: bool,
    }

    impl RotatingRefresher {
        fn build(initial_refresh: &str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                latest_refresh: Mutex::new(initial_refresh.into()),
                delay: Duration::from_millis(50),
                fail,
            })
        }

        fn new(initial_refresh: &str) -> Arc<Self> {
            Self::build(initial_refresh, false)
        }

        fn failing() -> Arc<Self> {
            Self::build("refresh-0", true)
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenRefresher for RotatingRefresher {
        async fn refresh(
            &self,
            refresh_token: &Secret<String>,
            _client: &OAuthClient,
        ) -> Result<RefreshedTokens, AuthError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(AuthError::Rejected {
                    status: 500,
                    body: "boom".into(),
                });
            }
            {
                let mut latest = self.latest_refresh.lock().unwrap();
                if *latest != *refresh_token.expose_secret() {
                    return Err(AuthError::Rejected {
                        status: 400,
                        body: "invalid_grant: stale refresh token".into(),
                    });
                }
                *latest = format!("refresh-{n}");
            }
            tokio::time::sleep(self.delay).await;
            Ok(RefreshedTokens {
                access_token: Secret::new(format!("access-{n}")),
                refresh_token: Some(Secret::new(format!("refresh-{n}"))),
                expires_at: Some(Utc::now() + TimeDelta::hours(1)),
            })
        }
    }

    fn client_config() -> ClientConfig {
        ClientConfig {
            client_id: Some("client".into()),
            client_secret: Some(Secret::new("secret".into())),
            redirect_uri: Some("http://localhost/callback".into()),
            token_url: Url::parse("https://launchpad.example/authorization/token").unwrap(),
            user_agent: "Camper Tests (dev@example.com)".into(),
        }
    }

    fn credential(expires_at: Option<DateTime<Utc>>, refresh: Option<&str>) -> Credential {
        Credential {
            access_token: Secret::new("access-0".into()),
            refresh_token: refresh.map(|r| Secret::new(r.to_string())),
            expires_at,
            account_id: "4711".into(),
        }
    }

    fn provider(
        credential: Credential,
        refresher: Arc<RotatingRefresher>,
        client: ClientConfig,
    ) -> AuthHeaderProvider {
        AuthHeaderProvider::new(
            Arc::new(TokenStore::in_memory(credential)),
            refresher,
            client,
            SKEW,
        )
    }

    fn bearer(headers: &HeaderMap) -> &str {
        headers.get(AUTHORIZATION).unwrap().to_str().unwrap()
    }

    #[tokio::test]
    async fn valid_token_is_used_without_refresh() {
        let refresher = RotatingRefresher::new("refresh-0");
        let provider = provider(
            credential(Some(Utc::now() + TimeDelta::hours(3)), Some("refresh-0")),
            Arc::clone(&refresher),
            client_config(),
        );

        let headers = provider.headers().await.unwrap();
        assert_eq!(bearer(&headers), "Bearer access-0");
        assert_eq!(
            headers.get(USER_AGENT).unwrap(),
            "Camper Tests (dev@example.com)"
        );
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert!(headers.get(AUTHORIZATION).unwrap().is_sensitive());
        assert_eq!(refresher.calls(), 0);
        assert_eq!(provider.store().revision(), 0);
    }

    #[tokio::test]
    async fn token_inside_skew_is_refreshed_once() {
        let refresher = RotatingRefresher::new("refresh-0");
        let provider = provider(
            credential(Some(Utc::now() + TimeDelta::seconds(30)), Some("refresh-0")),
            Arc::clone(&refresher),
            client_config(),
        );

        let headers = provider.headers().await.unwrap();
        assert_eq!(bearer(&headers), "Bearer access-1");
        assert_eq!(refresher.calls(), 1);
        assert_eq!(provider.store().revision(), 1);

        let current = provider.store().current().await;
        assert_eq!(current.account_id, "4711");
        assert_eq!(
            current.refresh_token.as_ref().map(|t| t.expose_secret().as_str()),
            Some("refresh-1")
        );

        // Now valid again: no further refresh.
        provider.headers().await.unwrap();
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed() {
        let refresher = RotatingRefresher::new("refresh-0");
        let provider = provider(
            credential(Some(Utc::now() - TimeDelta::days(1)), Some("refresh-0")),
            Arc::clone(&refresher),
            client_config(),
        );
        assert_eq!(bearer(&provider.headers().await.unwrap()), "Bearer access-1");
        assert_eq!(refresher.calls(), 1);
        assert_eq!(provider.store().revision(), 1);
    }

    #[tokio::test]
    async fn environment_token_without_expiry_never_refreshes() {
        let refresher = RotatingRefresher::new("refresh-0");
        let provider = AuthHeaderProvider::new(
            Arc::new(TokenStore::in_memory(credential(None, None))),
            Arc::clone(&refresher) as Arc<dyn TokenRefresher>,
            client_config(),
            // A skew far larger than any real token lifetime.
            Duration::from_secs(100 * 365 * 24 * 3600),
        );

        for _ in 0..3 {
            assert_eq!(bearer(&provider.headers().await.unwrap()), "Bearer access-0");
        }
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn expired_without_refresh_token_proceeds_as_is() {
        let refresher = RotatingRefresher::new("refresh-0");
        let provider = provider(
            credential(Some(Utc::now() - TimeDelta::hours(1)), None),
            Arc::clone(&refresher),
            client_config(),
        );
        assert_eq!(bearer(&provider.headers().await.unwrap()), "Bearer access-0");
        assert_eq!(refresher.calls(), 0);
        assert_eq!(provider.store().revision(), 0);
    }

    #[tokio::test]
    async fn expired_without_client_config_proceeds_as_is() {
        let refresher = RotatingRefresher::new("refresh-0");
        let mut client = client_config();
        client.client_secret = None;
        let provider = provider(
            credential(Some(Utc::now() - TimeDelta::hours(1)), Some("refresh-0")),
            Arc::clone(&refresher),
            client,
        );
        assert_eq!(bearer(&provider.headers().await.unwrap()), "Bearer access-0");
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn refresh_failure_surfaces_and_keeps_credential() {
        let refresher = RotatingRefresher::failing();
        let provider = provider(
            credential(Some(Utc::now() - TimeDelta::hours(1)), Some("refresh-0")),
            Arc::clone(&refresher),
            client_config(),
        );

        let err = provider.headers().await.unwrap_err();
        assert!(matches!(err, AuthError::Rejected { status: 500, .. }));
        assert_eq!(refresher.calls(), 1);
        assert_eq!(provider.store().revision(), 0);
        assert_eq!(
            provider.store().current().await.access_token.expose_secret(),
            "access-0"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_expired_calls_share_one_refresh() {
        let refresher = RotatingRefresher::new("refresh-0");
        let provider = Arc::new(provider(
            credential(Some(Utc::now() - TimeDelta::minutes(5)), Some("refresh-0")),
            Arc::clone(&refresher),
            client_config(),
        ));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let provider = Arc::clone(&provider);
                tokio::spawn(async move { provider.headers().await })
            })
            .collect();
        for task in tasks {
            let headers = task.await.unwrap().unwrap();
            assert_eq!(bearer(&headers), "Bearer access-1");
        }

        assert_eq!(refresher.calls(), 1);
        assert_eq!(provider.store().revision(), 1);
        let current = provider.store().current().await;
        assert_eq!(
            current.refresh_token.as_ref().map(|t| t.expose_secret().as_str()),
            Some("refresh-1")
        );
    }

    #[tokio::test]
    async fn force_refresh_requires_capability() {
        let refresher = RotatingRefresher::new("refresh-0");
        let provider = provider(
            credential(Some(Utc::now() + TimeDelta::hours(3)), Some("refresh-0")),
            Arc::clone(&refresher),
            client_config(),
        );
        assert_eq!(provider.force_refresh().await.unwrap(), PersistOutcome::MemoryOnly);
        assert_eq!(refresher.calls(), 1);

        let no_refresh = AuthHeaderProvider::new(
            Arc::new(TokenStore::in_memory(credential(None, None))),
            RotatingRefresher::new("x"),
            client_config(),
            SKEW,
        );
        assert!(matches!(
            no_refresh.force_refresh().await.unwrap_err(),
            AuthError::RefreshUnavailable(_)
        ));
    }

    #[test]
    fn invalid_header_text_is_rejected() {
        let mut cred = credential(None, None);
        cred.access_token = Secret::new("bad\ntoken".into());
        let err = build_headers(&cred, "ua").unwrap_err();
        assert!(matches!(err, AuthError::InvalidHeader("access token")));
    }
}

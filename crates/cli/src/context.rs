use std::sync::Arc;

use {
    anyhow::{Context as _, Result},
    camper_api::http_client,
    camper_config::{Env, Settings},
    camper_oauth::{
        AuthHeaderProvider, ClientConfig, CredentialOrigin, CredentialSource, HttpTokenRefresher,
        TokenStore,
    },
};

/// Settings, resolved credentials and the shared header provider.
pub struct Context {
    pub settings: Settings,
    pub origin: CredentialOrigin,
    pub auth: Arc<AuthHeaderProvider>,
    pub http: reqwest::Client,
}

impl Context {
    pub fn load() -> Result<Self> {
        let env = Env::Process;
        let settings = Settings::from_env(&env)?;
        let resolved = CredentialSource::from_settings(&settings, &env).resolve()?;
        let origin = resolved.origin.clone();

        let http = http_client(&settings).context("failed to build HTTP client")?;
        let store = Arc::new(TokenStore::from_resolved(resolved, &settings.service));
        let auth = Arc::new(AuthHeaderProvider::new(
            store,
            Arc::new(HttpTokenRefresher::new(http.clone())),
            ClientConfig::from_settings(&settings),
            settings.token_skew,
        ));

        Ok(Self {
            settings,
            origin,
            auth,
            http,
        })
    }
}

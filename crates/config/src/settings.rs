use std::{fmt, path::PathBuf, time::Duration};

use {
    anyhow::{Context, Result},
    secrecy::Secret,
    tracing::debug,
    url::Url,
};

use crate::{
    env::{Env, vars},
    paths::token_file_path,
};

/// Root of the remote API. The account id is appended as the first path segment.
pub const DEFAULT_API_BASE_URL: &str = "https://3.basecampapi.com";

/// Launchpad token endpoint used for refresh exchanges.
pub const DEFAULT_TOKEN_URL: &str = "https://launchpad.37signals.com/authorization/token";

/// The remote API rejects requests without a User-Agent.
pub const DEFAULT_USER_AGENT: &str = "Basecamp MCP Server";

/// Key of the service entry inside the token record.
pub const SERVICE_NAME: &str = "basecamp";

/// Refresh this long before the stated expiry.
pub const DEFAULT_TOKEN_SKEW: Duration = Duration::from_secs(300);

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Process-wide settings, loaded once at startup.
#[derive(Clone)]
pub struct Settings {
    pub api_base_url: Url,
    pub token_url: Url,
    pub user_agent: String,
    pub client_id: Option<String>,
    pub client_secret: Option<Secret<String>>,
    pub redirect_uri: Option<String>,
    pub token_file: PathBuf,
    pub service: String,
    pub token_skew: Duration,
    pub http_timeout: Duration,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_base_url", &self.api_base_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("user_agent", &self.user_agent)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("token_file", &self.token_file)
            .field("service", &self.service)
            .field("token_skew", &self.token_skew)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl Settings {
    /// Read settings from `env`, applying defaults for everything optional.
    pub fn from_env(env: &Env) -> Result<Self> {
        let api_base_url = parse_url(env, vars::API_BASE_URL, DEFAULT_API_BASE_URL)?;
        let token_url = parse_url(env, vars::TOKEN_URL, DEFAULT_TOKEN_URL)?;

        let token_skew = env
            .parse::<u64>(vars::TOKEN_SKEW_SECS)?
            .map_or(DEFAULT_TOKEN_SKEW, Duration::from_secs);
        let http_timeout = match env.parse::<u64>(vars::HTTP_TIMEOUT_SECS)? {
            Some(0) => anyhow::bail!("{} must be greater than zero", vars::HTTP_TIMEOUT_SECS),
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_HTTP_TIMEOUT,
        };

        let settings = Self {
            api_base_url,
            token_url,
            user_agent: env
                .get(vars::USER_AGENT)
                .unwrap_or_else(|| DEFAULT_USER_AGENT.into()),
            client_id: env.get(vars::CLIENT_ID),
            client_secret: env.get(vars::CLIENT_SECRET).map(Secret::new),
            redirect_uri: env.get(vars::REDIRECT_URI),
            token_file: token_file_path(env),
            service: SERVICE_NAME.into(),
            token_skew,
            http_timeout,
        };
        debug!(settings = ?settings, "loaded settings");
        Ok(settings)
    }
}

fn parse_url(env: &Env, name: &str, default: &str) -> Result<Url> {
    let raw = env.get(name).unwrap_or_else(|| default.into());
    Url::parse(&raw).with_context(|| format!("invalid URL in {name}: {raw:?}"))
}

use std::{fmt, time::Duration};

use {
    chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeDelta, Utc},
    secrecy::{ExposeSecret, Secret},
    serde::Serializer,
    url::Url,
};

use camper_config::Settings;

/// The credential every outbound call is authorized with.
#[derive(Clone)]
pub struct Credential {
    pub access_token: Secret<String>,
    /// Absent when running from the environment without refresh capability.
    pub refresh_token: Option<Secret<String>>,
    /// Absent means the expiry is unknown and the token is used as-is.
    pub expires_at: Option<DateTime<Utc>>,
    pub account_id: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("account_id", &self.account_id)
            .finish()
    }
}

impl Credential {
    /// True when there is no expiry, or the expiry is more than `skew` after `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        let Some(expires_at) = self.expires_at else {
            return true;
        };
        let skew = TimeDelta::from_std(skew).unwrap_or(TimeDelta::MAX);
        expires_at.signed_duration_since(now) > skew
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Merge the result of a refresh exchange.
    ///
    /// The account id never changes. Providers that do not rotate refresh
    /// tokens omit one, in which case the current one is kept.
    pub fn with_refreshed(&self, tokens: RefreshedTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token.or_else(|| self.refresh_token.clone()),
            expires_at: tokens.expires_at,
            account_id: self.account_id.clone(),
        }
    }
}

/// Output of one refresh exchange.
#[derive(Clone)]
pub struct RefreshedTokens {
    pub access_token: Secret<String>,
    pub refresh_token: Option<Secret<String>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for RefreshedTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshedTokens")
            .field("access_token", &"[REDACTED]")
            .field("rotated", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Static OAuth client settings plus the User-Agent sent on every request.
#[derive(Clone)]
pub struct ClientConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<Secret<String>>,
    pub redirect_uri: Option<String>,
    pub token_url: Url,
    pub user_agent: String,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("token_url", &self.token_url.as_str())
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// The complete set of client fields a refresh exchange needs.
#[derive(Clone)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
    pub token_url: Url,
}

impl ClientConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_uri: settings.redirect_uri.clone(),
            token_url: settings.token_url.clone(),
            user_agent: settings.user_agent.clone(),
        }
    }

    /// `None` unless client id, secret and redirect URI are all configured.
    pub fn oauth_client(&self) -> Option<OAuthClient> {
        Some(OAuthClient {
            client_id: self.client_id.clone()?,
            client_secret: self.client_secret.clone()?,
            redirect_uri: self.redirect_uri.clone()?,
            token_url: self.token_url.clone(),
        })
    }
}

/// Parse a stored expiry.
///
/// Accepts RFC 3339 (`Z` or an offset) and naive `YYYY-MM-DDTHH:MM:SS[.f]`,
/// which is read as UTC. Blank input means "no expiry".
pub fn parse_expiry(raw: &str) -> Result<Option<DateTime<Utc>>, chrono::ParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Ok(Some(dt.with_timezone(&Utc))),
        Err(rfc_err) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Some(naive.and_utc()))
            .map_err(|_| rfc_err),
    }
}

pub fn format_expiry(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn serialize_option_secret<S: Serializer>(
    secret: &Option<Secret<String>>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(secret) => s.serialize_some(secret.expose_secret()),
        None => s.serialize_none(),
    }
}

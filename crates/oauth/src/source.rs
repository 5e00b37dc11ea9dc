//! Credential resolution at startup.
//!
//! An ordered list of [`CredentialResolver`]s is consulted once; the first one
//! that produces a credential wins.

use std::path::PathBuf;

use {
    camper_config::{Env, Settings, vars},
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, info},
};

use crate::{
    error::ConfigError,
    storage::TokenFile,
    types::{Credential, parse_expiry},
};

/// Where a resolved credential came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialOrigin {
    /// Refreshed credentials are written back to this file.
    TokenFile(PathBuf),
    /// Refreshed credentials live in memory only.
    Environment,
}

#[derive(Debug, Clone)]
pub struct ResolvedCredential {
    pub credential: Credential,
    pub origin: CredentialOrigin,
}

/// One configuration origin.
pub trait CredentialResolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` when this origin has nothing to offer.
    fn resolve(&self) -> Result<Option<ResolvedCredential>, ConfigError>;
}

/// Reads the service entry of the persisted token file.
pub struct TokenFileResolver {
    file: TokenFile,
    service: String,
    env: Env,
}

impl TokenFileResolver {
    pub fn new(file: TokenFile, service: impl Into<String>, env: Env) -> Self {
        Self {
            file,
            service: service.into(),
            env,
        }
    }
}

impl CredentialResolver for TokenFileResolver {
    fn name(&self) -> &'static str {
        "token file"
    }

    fn resolve(&self) -> Result<Option<ResolvedCredential>, ConfigError> {
        let Some(record) = self.file.load(&self.service)? else {
            debug!(path = %self.file.path().display(), "no token record");
            return Ok(None);
        };
        let Some(access_token) = non_blank_secret(record.access_token) else {
            debug!(path = %self.file.path().display(), "token record has no access token");
            return Ok(None);
        };

        let account_id = record
            .account_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .or_else(|| self.env.get(vars::ACCOUNT_ID))
            .ok_or(ConfigError::MissingAccountId {
                origin: self.name(),
            })?;

        let expires_at = match record.expires_at {
            Some(raw) => parse_expiry(&raw).map_err(|source| ConfigError::InvalidExpiry {
                origin: self.name(),
                value: raw.clone(),
                source,
            })?,
            None => None,
        };

        Ok(Some(ResolvedCredential {
            credential: Credential {
                access_token,
                refresh_token: non_blank_secret(record.refresh_token),
                expires_at,
                account_id,
            },
            origin: CredentialOrigin::TokenFile(self.file.path().to_path_buf()),
        }))
    }
}

/// Builds the credential entirely from `BASECAMP_*` variables.
pub struct EnvResolver {
    env: Env,
}

impl EnvResolver {
    pub fn new(env: Env) -> Self {
        Self { env }
    }
}

impl CredentialResolver for EnvResolver {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn resolve(&self) -> Result<Option<ResolvedCredential>, ConfigError> {
        let Some(access_token) = self.env.get(vars::ACCESS_TOKEN) else {
            return Ok(None);
        };
        let account_id = self
            .env
            .get(vars::ACCOUNT_ID)
            .ok_or(ConfigError::MissingAccountId {
                origin: self.name(),
            })?;

        let expires_at = match self.env.get(vars::TOKEN_EXPIRES_AT) {
            Some(raw) => parse_expiry(&raw).map_err(|source| ConfigError::InvalidExpiry {
                origin: self.name(),
                value: raw.clone(),
                source,
            })?,
            None => None,
        };

        Ok(Some(ResolvedCredential {
            credential: Credential {
                access_token: Secret::new(access_token),
                refresh_token: self.env.get(vars::REFRESH_TOKEN).map(Secret::new),
                expires_at,
                account_id,
            },
            origin: CredentialOrigin::Environment,
        }))
    }
}

/// Ordered resolver chain.
pub struct CredentialSource {
    resolvers: Vec<Box<dyn CredentialResolver>>,
}

impl CredentialSource {
    pub fn new(resolvers: Vec<Box<dyn CredentialResolver>>) -> Self {
        Self { resolvers }
    }

    /// Token file first, then the environment.
    pub fn from_settings(settings: &Settings, env: &Env) -> Self {
        Self::new(vec![
            Box::new(TokenFileResolver::new(
                TokenFile::new(settings.token_file.clone()),
                settings.service.clone(),
                env.clone(),
            )),
            Box::new(EnvResolver::new(env.clone())),
        ])
    }

    pub fn resolve(&self) -> Result<ResolvedCredential, ConfigError> {
        for resolver in &self.resolvers {
            if let Some(resolved) = resolver.resolve()? {
                info!(
                    source = resolver.name(),
                    account_id = %resolved.credential.account_id,
                    refreshable = resolved.credential.can_refresh(),
                    expires_at = ?resolved.credential.expires_at,
                    "resolved credentials"
                );
                return Ok(resolved);
            }
        }
        Err(ConfigError::NotFound {
            tried: self.resolvers.iter().map(|r| r.name()).collect(),
        })
    }
}

fn non_blank_secret(secret: Option<Secret<String>>) -> Option<Secret<String>> {
    secret.filter(|s| !s.expose_secret().trim().is_empty())
}

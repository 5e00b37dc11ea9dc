//! Environment lookup shared by settings and credential resolution.

use std::{collections::HashMap, fmt::Display, str::FromStr};

use anyhow::Context;

/// Variable names read from the environment.
pub mod vars {
    pub const ACCESS_TOKEN: &str = "BASECAMP_ACCESS_TOKEN";
    pub const REFRESH_TOKEN: &str = "BASECAMP_REFRESH_TOKEN";
    pub const TOKEN_EXPIRES_AT: &str = "BASECAMP_TOKEN_EXPIRES_AT";
    pub const ACCOUNT_ID: &str = "BASECAMP_ACCOUNT_ID";
    pub const CLIENT_ID: &str = "BASECAMP_CLIENT_ID";
    pub const CLIENT_SECRET: &str = "BASECAMP_CLIENT_SECRET";
    pub const REDIRECT_URI: &str = "BASECAMP_REDIRECT_URI";
    pub const TOKEN_URL: &str = "BASECAMP_TOKEN_URL";
    pub const API_BASE_URL: &str = "BASECAMP_API_BASE_URL";
    pub const TOKEN_FILE: &str = "BASECAMP_TOKEN_FILE";
    pub const USER_AGENT: &str = "USER_AGENT";
    pub const TOKEN_SKEW_SECS: &str = "CAMPER_TOKEN_SKEW_SECS";
    pub const HTTP_TIMEOUT_SECS: &str = "CAMPER_HTTP_TIMEOUT_SECS";
}

/// Source of environment variables.
///
/// `Process` reads the real environment. `Map` holds a fixed set of values,
/// which keeps tests away from process-global state.
#[derive(Debug, Clone, Default)]
pub enum Env {
    #[default]
    Process,
    Map(HashMap<String, String>),
}

impl Env {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Value of `name`, trimmed. Unset and blank values are both `None`.
    pub fn get(&self, name: &str) -> Option<String> {
        let raw = match self {
            Self::Process => std::env::var(name).ok(),
            Self::Map(vars) => vars.get(name).cloned(),
        };
        raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    /// Parse `name` into `T`, returning `None` when unset.
    pub fn parse<T>(&self, name: &str) -> anyhow::Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(name)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|e| anyhow::anyhow!("{e}"))
                    .with_context(|| format!("invalid value for {name}: {raw:?}"))
            })
            .transpose()
    }
}

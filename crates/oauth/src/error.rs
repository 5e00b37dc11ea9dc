use std::{io, path::PathBuf};

use thiserror::Error;

/// Failure reading or writing the token record file.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to access token file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON in token file {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Credentials could not be resolved at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{origin}: access token found but no account id (set BASECAMP_ACCOUNT_ID)")]
    MissingAccountId { origin: &'static str },

    #[error("{origin}: invalid expires_at {value:?}: {source}")]
    InvalidExpiry {
        origin: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("no credentials found (tried {})", .tried.join(", "))]
    NotFound { tried: Vec<&'static str> },
}

/// A refresh exchange failed or the credential cannot be turned into headers.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token endpoint rejected refresh (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("token refresh request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    #[error("{0} is not a valid header value")]
    InvalidHeader(&'static str),

    #[error("cannot refresh: {0}")]
    RefreshUnavailable(&'static str),
}

//! Basecamp credentials: resolution, persistence, refresh and request headers.

pub mod error;
pub mod provider;
pub mod refresh;
pub mod source;
pub mod storage;
pub mod store;
pub mod types;

pub use {
    error::{AuthError, ConfigError, StorageError},
    provider::AuthHeaderProvider,
    refresh::{HttpTokenRefresher, TokenRefresher},
    source::{
        CredentialOrigin, CredentialResolver, CredentialSource, EnvResolver, ResolvedCredential,
        TokenFileResolver,
    },
    storage::{TokenFile, TokenRecord},
    store::{PersistOutcome, TokenStore},
    types::{ClientConfig, Credential, OAuthClient, RefreshedTokens, format_expiry, parse_expiry},
};

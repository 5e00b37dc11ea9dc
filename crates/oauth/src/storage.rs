use std::{
    collections::BTreeMap,
    fmt, fs, io,
    path::{Path, PathBuf},
};

use {
    secrecy::Secret,
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

use crate::{
    error::StorageError,
    types::serialize_option_secret,
};

/// One service entry of the token file.
///
/// Fields this crate does not know about are carried through a rewrite.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TokenRecord {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_option_secret"
    )]
    pub access_token: Option<Secret<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_option_secret"
    )]
    pub refresh_token: Option<Secret<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .field("account_id", &self.account_id)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}

/// File-based token storage: a JSON object keyed by service name.
///
/// ```json
/// { "basecamp": { "access_token": "…", "refresh_token": "…",
///                 "expires_at": "2025-01-01T00:00:00Z", "account_id": "123" } }
/// ```
#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when the file does not exist or has no entry for `service`.
    pub fn load(&self, service: &str) -> Result<Option<TokenRecord>, StorageError> {
        let Some(mut map) = self.read_map()? else {
            return Ok(None);
        };
        let Some(entry) = map.remove(service) else {
            return Ok(None);
        };
        serde_json::from_value(entry)
            .map(Some)
            .map_err(|source| self.json_error(source))
    }

    /// Write `record` under `service`, keeping every other entry intact.
    pub fn save(&self, service: &str, record: &TokenRecord) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }

        let mut map = self.read_map()?.unwrap_or_default();
        let value = serde_json::to_value(record).map_err(|source| self.json_error(source))?;
        map.insert(service.to_string(), value);

        let data = serde_json::to_string_pretty(&map).map_err(|source| self.json_error(source))?;
        fs::write(&self.path, data).map_err(|source| self.io_error(source))?;

        // Set file permissions to 0600 on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))
                .map_err(|source| self.io_error(source))?;
        }

        Ok(())
    }

    fn read_map(&self) -> Result<Option<BTreeMap<String, Value>>, StorageError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(self.io_error(source)),
        };
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|source| self.json_error(source))
    }

    fn io_error(&self, source: io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn json_error(&self, source: serde_json::Error) -> StorageError {
        StorageError::Json {
            path: self.path.clone(),
            source,
        }
    }
}

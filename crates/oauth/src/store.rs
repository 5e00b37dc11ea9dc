use std::{
    path::PathBuf,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use {
    chrono::Utc,
    tokio::sync::{Mutex, MutexGuard, RwLock},
    tracing::{debug, info, warn},
};

use crate::{
    error::StorageError,
    source::{CredentialOrigin, ResolvedCredential},
    storage::{TokenFile, TokenRecord},
    types::{Credential, format_expiry},
};

/// What happened to the durable copy after [`TokenStore::replace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Written(PathBuf),
    /// The store has no backing file (environment credentials).
    MemoryOnly,
    /// The write failed; the in-memory credential was still replaced.
    Failed(String),
}

#[derive(Clone)]
struct Persistence {
    file: TokenFile,
    service: String,
}

/// Process-wide holder of the current credential.
pub struct TokenStore {
    credential: RwLock<Credential>,
    persistence: Option<Persistence>,
    refresh_gate: Mutex<()>,
    persist_lock: Mutex<()>,
    revision: AtomicU64,
}

impl TokenStore {
    pub fn in_memory(credential: Credential) -> Self {
        Self {
            credential: RwLock::new(credential),
            persistence: None,
            refresh_gate: Mutex::new(()),
            persist_lock: Mutex::new(()),
            revision: AtomicU64::new(0),
        }
    }

    /// A store whose replacements are written back under `service` in `file`.
    pub fn persisted(credential: Credential, file: TokenFile, service: impl Into<String>) -> Self {
        Self {
            persistence: Some(Persistence {
                file,
                service: service.into(),
            }),
            ..Self::in_memory(credential)
        }
    }

    /// Persist back to the token file only when the credential came from one.
    pub fn from_resolved(resolved: ResolvedCredential, service: &str) -> Self {
        match resolved.origin {
            CredentialOrigin::TokenFile(path) => {
                Self::persisted(resolved.credential, TokenFile::new(path), service)
            },
            CredentialOrigin::Environment => Self::in_memory(resolved.credential),
        }
    }

    pub async fn current(&self) -> Credential {
        self.credential.read().await.clone()
    }

    pub async fn is_valid(&self, skew: Duration) -> bool {
        self.credential.read().await.is_valid_at(Utc::now(), skew)
    }

    /// Swap the credential and write it back when persistence is configured.
    ///
    /// Readers only wait for the in-memory swap. Writes are serialised and
    /// always store the newest credential, so the file never ends up older
    /// than memory.
    pub async fn replace(&self, credential: Credential) -> PersistOutcome {
        {
            let mut guard = self.credential.write().await;
            *guard = credential;
            let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(revision, expires_at = ?guard.expires_at, "credential replaced");
        }

        let Some(persistence) = &self.persistence else {
            return PersistOutcome::MemoryOnly;
        };
        let _persisting = self.persist_lock.lock().await;
        let latest = self.current().await;
        let path = persistence.file.path().to_path_buf();
        let persistence = persistence.clone();
        let written = tokio::task::spawn_blocking(move || persistence.write(&latest))
            .await
            .map_err(|e| e.to_string())
            .and_then(|result| result.map_err(|e| e.to_string()));

        match written {
            Ok(()) => {
                info!(path = %path.display(), "persisted refreshed token");
                PersistOutcome::Written(path)
            },
            Err(e) => {
                warn!(error = %e, "failed to persist refreshed token, keeping it in memory");
                PersistOutcome::Failed(e)
            },
        }
    }

    /// Serialises check-then-refresh-then-replace sequences.
    pub async fn refresh_gate(&self) -> MutexGuard<'_, ()> {
        self.refresh_gate.lock().await
    }

    /// Number of completed [`replace`](Self::replace) calls.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    pub fn token_file(&self) -> Option<&TokenFile> {
        self.persistence.as_ref().map(|p| &p.file)
    }
}

impl Persistence {
    /// Update the token fields of the record, leaving `account_id` and any
    /// unknown fields as they are on disk.
    fn write(&self, credential: &Credential) -> Result<(), StorageError> {
        let mut record = self.file.load(&self.service)?.unwrap_or_else(|| TokenRecord {
            account_id: Some(credential.account_id.clone()),
            ..Default::default()
        });
        record.access_token = Some(credential.access_token.clone());
        record.refresh_token = credential.refresh_token.clone();
        record.expires_at = credential.expires_at.as_ref().map(format_expiry);
        record.updated_at = Some(format_expiry(&Utc::now()));
        self.file.save(&self.service, &record)
    }
}

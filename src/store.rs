/// Credential storage with pluggable durable backends
use crate::error::{Result, SessionError};
use crate::lock::StoreLock;
use crate::token::{
    fingerprint, CredentialPair, ACCESS_TOKEN_KEY, EXPIRES_AT_KEY, REFRESH_TOKEN_KEY,
    TTL_SECONDS_KEY,
};
use keyring::Entry;
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Durable storage interface for the credential pair
pub trait StorageBackend: Send + Sync {
    /// Load the persisted pair, if a complete one exists
    fn load(&self) -> Result<Option<CredentialPair>>;

    /// Persist a pair, replacing any previous one
    fn save(&self, pair: &CredentialPair) -> Result<()>;

    /// Remove the persisted pair
    fn clear(&self) -> Result<()>;
}

/// Process-wide holder of the current credential pair
///
/// Reads are served from an in-memory snapshot; every write replaces the
/// whole pair in one assignment and is written through to the backend.
/// Backend failures are logged and otherwise ignored, so the in-process view
/// always reflects the latest write.
///
/// Writes hold the lock across the backend call so the durable copy never
/// lags behind a later write. That call is blocking I/O for [`FileBackend`]
/// and [`KeyringBackend`]; writes happen once per renewal or logout, and
/// readers on other tasks wait for at most one such call.
pub struct TokenStore {
    current: RwLock<Option<CredentialPair>>,
    backend: Arc<dyn StorageBackend>,
}

impl TokenStore {
    /// Open a store, restoring whatever the backend has persisted
    pub fn open(backend: Arc<dyn StorageBackend>) -> Self {
        let restored = match backend.load() {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(err = %e, "failed to restore persisted credentials");
                None
            }
        };

        if let Some(pair) = &restored {
            tracing::debug!(
                token = %fingerprint(&pair.access_token),
                expires_at = pair.expires_at,
                "restored persisted credentials"
            );
        }

        Self {
            current: RwLock::new(restored),
            backend,
        }
    }

    /// Store with no durability, mainly for tests
    pub fn in_memory() -> Self {
        Self::open(Arc::new(MemoryBackend::new()))
    }

    /// Replace the current pair
    pub fn save(&self, pair: CredentialPair) {
        let mut current = self.current.write();
        self.persist(&pair);
        *current = Some(pair);
    }

    /// Replace the pair only while it still holds `refresh_token`
    ///
    /// Returns false, leaving the store untouched, when the session was
    /// cleared or replaced since `refresh_token` was read.
    pub fn replace_if(&self, refresh_token: &str, pair: CredentialPair) -> bool {
        let mut current = self.current.write();
        if !holds(&current, refresh_token) {
            return false;
        }
        self.persist(&pair);
        *current = Some(pair);
        true
    }

    /// Copy of the current pair
    pub fn snapshot(&self) -> Option<CredentialPair> {
        self.current.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.current.read().as_ref().map(|p| p.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.current.read().as_ref().map(|p| p.refresh_token.clone())
    }

    pub fn expires_at(&self) -> Option<u64> {
        self.current.read().as_ref().map(|p| p.expires_at)
    }

    /// True iff both tokens are present, regardless of expiry
    pub fn has_valid_pair(&self) -> bool {
        self.current
            .read()
            .as_ref()
            .is_some_and(|p| !p.access_token.is_empty() && !p.refresh_token.is_empty())
    }

    /// Drop the current pair
    pub fn clear(&self) {
        let mut current = self.current.write();
        self.erase();
        *current = None;
    }

    /// Drop the pair only while it still holds `refresh_token`
    pub fn clear_if(&self, refresh_token: &str) -> bool {
        let mut current = self.current.write();
        if !holds(&current, refresh_token) {
            return false;
        }
        self.erase();
        *current = None;
        true
    }

    fn persist(&self, pair: &CredentialPair) {
        if let Err(e) = self.backend.save(pair) {
            tracing::warn!(err = %e, "failed to persist credentials");
        }
    }

    fn erase(&self) {
        if let Err(e) = self.backend.clear() {
            tracing::warn!(err = %e, "failed to clear persisted credentials");
        }
    }
}

fn holds(current: &Option<CredentialPair>, refresh_token: &str) -> bool {
    current
        .as_ref()
        .is_some_and(|p| p.refresh_token == refresh_token)
}

/// In-memory backend
///
/// Nothing survives the process. Suitable for testing and short-lived tools.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    pair: Arc<Mutex<Option<CredentialPair>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self) -> Result<Option<CredentialPair>> {
        Ok(self.pair.lock().clone())
    }

    fn save(&self, pair: &CredentialPair) -> Result<()> {
        *self.pair.lock() = Some(pair.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.pair.lock() = None;
        Ok(())
    }
}

/// File-based backend using XDG conventions
///
/// Keeps the four credential keys in a single JSON file. Writes go to a
/// temporary file that is renamed into place under an exclusive
/// [`StoreLock`], so readers in other processes never see a partial pair.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
    lock: StoreLock,
}

impl FileBackend {
    /// Create a file backend for an application
    ///
    /// Respects `$XDG_DATA_HOME` first, then the platform data directory.
    /// The file lands in `<data_dir>/<app_name>/credentials.json`.
    pub fn new(app_name: &str) -> Result<Self> {
        let base_dir = if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
            PathBuf::from(xdg_data)
        } else {
            dirs::data_dir().ok_or_else(|| {
                SessionError::Storage("Could not determine data directory".to_string())
            })?
        };

        Self::with_path(base_dir.join(app_name).join("credentials.json"))
    }

    /// Create a file backend at an explicit file path
    pub fn with_path(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock = StoreLock::for_file(&path);
        Ok(Self { path, lock })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn load(&self) -> Result<Option<CredentialPair>> {
        let _guard = self.lock.shared()?;
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save(&self, pair: &CredentialPair) -> Result<()> {
        let content = serde_json::to_string_pretty(pair)?;
        let staging = self.path.with_extension("json.tmp");

        let _guard = self.lock.exclusive()?;
        fs::write(&staging, content)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.lock.exclusive()?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Backend using the OS credential manager
///
/// - macOS: Keychain
/// - Windows: Credential Manager
/// - Linux: Secret Service API (libsecret)
///
/// Each of the four credential keys is its own keyring entry under the
/// service `ausweis-<app_name>`.
#[derive(Debug, Clone)]
pub struct KeyringBackend {
    service: String,
}

impl KeyringBackend {
    pub fn new(app_name: &str) -> Self {
        Self {
            service: format!("ausweis-{}", app_name),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key)
            .map_err(|e| SessionError::Storage(format!("Failed to create keyring entry: {}", e)))
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(SessionError::Storage(format!(
                "Failed to read {} from keyring: {}",
                key, e
            ))),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?.set_password(value).map_err(|e| {
            SessionError::Storage(format!("Failed to write {} to keyring: {}", key, e))
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(SessionError::Storage(format!(
                "Failed to delete {} from keyring: {}",
                key, e
            ))),
        }
    }
}

fn parse_seconds(key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| SessionError::Storage(format!("Corrupt {} value in keyring", key)))
}

impl StorageBackend for KeyringBackend {
    fn load(&self) -> Result<Option<CredentialPair>> {
        let (Some(access_token), Some(refresh_token), Some(ttl), Some(expires_at)) = (
            self.read(ACCESS_TOKEN_KEY)?,
            self.read(REFRESH_TOKEN_KEY)?,
            self.read(TTL_SECONDS_KEY)?,
            self.read(EXPIRES_AT_KEY)?,
        ) else {
            return Ok(None);
        };

        Ok(Some(CredentialPair {
            access_token,
            refresh_token,
            ttl_seconds: parse_seconds(TTL_SECONDS_KEY, &ttl)?,
            expires_at: parse_seconds(EXPIRES_AT_KEY, &expires_at)?,
        }))
    }

    fn save(&self, pair: &CredentialPair) -> Result<()> {
        self.write(ACCESS_TOKEN_KEY, &pair.access_token)?;
        self.write(REFRESH_TOKEN_KEY, &pair.refresh_token)?;
        self.write(TTL_SECONDS_KEY, &pair.ttl_seconds.to_string())?;
        self.write(EXPIRES_AT_KEY, &pair.expires_at.to_string())
    }

    fn clear(&self) -> Result<()> {
        for key in [
            ACCESS_TOKEN_KEY,
            REFRESH_TOKEN_KEY,
            TTL_SECONDS_KEY,
            EXPIRES_AT_KEY,
        ] {
            self.remove(key)?;
        }
        Ok(())
    }
}

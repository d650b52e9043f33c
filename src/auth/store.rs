use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use super::error::AuthError;
use super::token::Credential;

/// Durable cache holding exactly one [`Credential`].
///
/// Storage failures never surface as errors here: a missing or corrupt cache
/// loads as `None`, and a failed save returns `false` so the next request
/// simply re-authenticates.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<Credential>;
    fn save(&self, credential: &Credential) -> bool;
    fn clear(&self) -> bool;

    fn is_valid(&self, credential: &Credential) -> bool {
        credential.is_valid()
    }
}

/// File-backed token store writing the shared JSON credential document.
///
/// # Example
/// ```no_run
/// use chatrelay::auth::{Credential, FileTokenStore, TokenStore};
/// use chrono::{Duration, Utc};
///
/// let store = FileTokenStore::new("/tmp/ringcentral_token.json");
/// let saved = store.save(&Credential::new("access", None, Utc::now() + Duration::hours(1)));
/// assert!(saved);
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn new_default() -> Self {
        Self::new(default_token_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fallible read, distinguishing a missing file from a broken one.
    pub fn read(&self) -> Result<Option<Credential>, AuthError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let credential: Credential = serde_json::from_str(&raw)?;
        Ok(Some(credential))
    }

    /// Fallible write: temp file in the same directory, then rename.
    pub fn write(&self, credential: &Credential) -> Result<(), AuthError> {
        let serialized = serde_json::to_vec_pretty(credential)?;
        atomic_write(&self.path, &serialized)
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<Credential> {
        match self.read() {
            Ok(credential) => credential,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "Ignoring unreadable token cache");
                None
            }
        }
    }

    fn save(&self, credential: &Credential) -> bool {
        match self.write(credential) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Saved token cache");
                true
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "Failed to save token cache");
                false
            }
        }
    }

    fn clear(&self) -> bool {
        match fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => true,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "Failed to clear token cache");
                false
            }
        }
    }
}

/// Process-local token store, for tests and for disabling persistence.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    credential: Mutex<Option<Credential>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: Mutex::new(Some(credential)),
        }
    }
}

impl TokenStore for InMemoryTokenStore {
    fn load(&self) -> Option<Credential> {
        self.credential.lock().ok()?.clone()
    }

    fn save(&self, credential: &Credential) -> bool {
        match self.credential.lock() {
            Ok(mut guard) => {
                *guard = Some(credential.clone());
                true
            }
            Err(_) => false,
        }
    }

    fn clear(&self) -> bool {
        match self.credential.lock() {
            Ok(mut guard) => {
                *guard = None;
                true
            }
            Err(_) => false,
        }
    }
}

/// Default token cache location (`~/.chatrelay/ringcentral_token.json`).
pub fn default_token_path() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".chatrelay"))
        .unwrap_or_else(|| PathBuf::from(".chatrelay"))
        .join("ringcentral_token.json")
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AuthError> {
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path.file_name().ok_or_else(|| {
        AuthError::Storage(format!("Token path {} has no file name", path.display()))
    })?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_name = format!(
        ".{}.tmp-{}-{seq}",
        file_name.to_string_lossy(),
        std::process::id()
    );
    let temp_path = path.with_file_name(temp_name);

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let write_result = (|| -> std::io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}

// Durable token storage backends
//
// Both backends namespace values per profile so several servers can be
// signed in at once.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use toonsync_api::{Error, TokenStorage};

/// Keyring service name for every toonsync secret.
pub const KEYRING_SERVICE: &str = "toonsync";

fn storage_error(context: &str, err: impl std::fmt::Display) -> Error {
    Error::Storage {
        message: format!("{context}: {err}"),
    }
}

// ── Keyring ─────────────────────────────────────────────────────────

/// Tokens in the OS keyring under `toonsync` / `<profile>/<key>`.
#[derive(Debug, Clone)]
pub struct KeyringStorage {
    profile: String,
}

impl KeyringStorage {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, Error> {
        keyring::Entry::new(KEYRING_SERVICE, &format!("{}/{key}", self.profile))
            .map_err(|e| storage_error("keyring unavailable", e))
    }
}

impl TokenStorage for KeyringStorage {
    fn read(&self, key: &str) -> Result<Option<String>, Error> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(storage_error("keyring read failed", e)),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), Error> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| storage_error("keyring write failed", e))
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(storage_error("keyring delete failed", e)),
        }
    }
}

// ── JSON file ───────────────────────────────────────────────────────

/// Tokens in a JSON object file, one file per profile. The file is
/// rewritten whole on every change and is owner-readable only on Unix.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `<data dir>/tokens-<profile>.json`.
    pub fn for_profile(profile: &str) -> Self {
        Self::new(crate::data_dir().join(format!("tokens-{profile}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, Error> {
        match std::fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| storage_error("token file is corrupt", e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(storage_error("failed to read token file", e)),
        }
    }

    fn store(&self, values: &BTreeMap<String, String>) -> Result<(), Error> {
        if values.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(storage_error("failed to remove token file", e)),
            };
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| storage_error("failed to create token directory", e))?;
        }
        let json = serde_json::to_vec_pretty(values)
            .map_err(|e| storage_error("failed to encode tokens", e))?;
        std::fs::write(&self.path, json)
            .map_err(|e| storage_error("failed to write token file", e))?;
        restrict_permissions(&self.path)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| storage_error("failed to restrict token file", e))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), Error> {
    Ok(())
}

impl TokenStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, Error> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.remove(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), Error> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = self.load()?;
        values.insert(key.to_owned(), value.to_owned());
        self.store(&values)
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = self.load()?;
        if values.remove(key).is_none() {
            return Ok(());
        }
        self.store(&values)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use toonsync_api::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("tokens.json"));
        assert!(storage.read(ACCESS_TOKEN_KEY).unwrap().is_none());
        storage.remove(ACCESS_TOKEN_KEY).unwrap();
    }

    #[test]
    fn values_survive_a_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("tokens.json");

        let storage = FileStorage::new(&path);
        storage.write(ACCESS_TOKEN_KEY, "a1").unwrap();
        storage.write(REFRESH_TOKEN_KEY, "r1").unwrap();

        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.read(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("a1"));
        assert_eq!(reopened.read(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r1"));
    }

    #[test]
    fn removing_last_key_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("tokens.json"));

        storage.write(ACCESS_TOKEN_KEY, "a1").unwrap();
        assert!(storage.path().exists());

        storage.remove(ACCESS_TOKEN_KEY).unwrap();
        assert!(!storage.path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("tokens.json"));
        storage.write(ACCESS_TOKEN_KEY, "a1").unwrap();

        let mode = std::fs::metadata(storage.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, b"not json").unwrap();

        let storage = FileStorage::new(&path);
        assert!(matches!(
            storage.read(ACCESS_TOKEN_KEY),
            Err(Error::Storage { .. })
        ));
    }
}

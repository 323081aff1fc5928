// Token persistence port
//
// The session store writes the access/refresh pair through this trait so a
// restart can resume the session. Durable backends (OS keyring, JSON file)
// live in `toonsync-config`; the in-memory backend here is for tests and
// ephemeral sessions.

use dashmap::DashMap;

use crate::error::Error;

/// Storage key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "access-token";
/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh-token";

/// Key-value persistence for session tokens.
pub trait TokenStorage: Send + Sync {
    /// Read a value. A missing key is `Ok(None)`, not an error.
    fn read(&self, key: &str) -> Result<Option<String>, Error>;

    fn write(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Remove a value. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<(), Error>;
}

/// Process-local token storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl TokenStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), Error> {
        self.values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_reads_as_none() {
        let storage = MemoryStorage::new();
        assert!(storage.read(ACCESS_TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn write_then_remove() {
        let storage = MemoryStorage::new();
        storage.write(REFRESH_TOKEN_KEY, "r1").unwrap();
        assert_eq!(storage.read(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r1"));

        storage.remove(REFRESH_TOKEN_KEY).unwrap();
        storage.remove(REFRESH_TOKEN_KEY).unwrap();
        assert!(storage.is_empty());
    }
}

//! API-key storage.
//!
//! One key is stored at a time. Its prefix decides the provider (see
//! [`crate::pipeline::request::Provider::detect`]), so switching providers is
//! just storing a different key.

use crate::error::StoreError;
use crate::store::write_atomic;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Get/set of the single configured API key.
pub trait ApiKeyStore: Send + Sync {
    /// The stored key, or an empty string when none is set.
    fn get(&self) -> Result<String, StoreError>;

    fn set(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    key: Mutex<String>,
}

impl MemoryKeyStore {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Mutex::new(key.into()),
        }
    }
}

impl ApiKeyStore for MemoryKeyStore {
    fn get(&self) -> Result<String, StoreError> {
        Ok(self.key.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn set(&self, key: &str) -> Result<(), StoreError> {
        *self.key.lock().unwrap_or_else(|e| e.into_inner()) = key.trim().to_string();
        Ok(())
    }
}

/// Stores the key as plain text in a file readable only by its owner.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    path: PathBuf,
}

impl FileKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/receipt-scanner/api_key`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("receipt-scanner")
            .join("api_key")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ApiKeyStore for FileKeyStore {
    fn get(&self) -> Result<String, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(s) => Ok(s.trim().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn set(&self, key: &str) -> Result<(), StoreError> {
        write_atomic(&self.path, key.trim().as_bytes())
    }
}

/// Show enough of a key to recognise it without revealing it.
///
/// `sk-ant-api03-abcdef…wxyz` becomes `sk-ant…wxyz`; keys of 12 characters
/// or fewer are fully masked.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.is_empty() {
        return String::new();
    }
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_key_store_trims() {
        let store = MemoryKeyStore::default();
        assert_eq!(store.get().unwrap(), "");
        store.set("  sk-ant-123\n").unwrap();
        assert_eq!(store.get().unwrap(), "sk-ant-123");
    }

    #[test]
    fn file_key_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyStore::new(dir.path().join("cfg").join("api_key"));
        assert_eq!(store.get().unwrap(), "", "missing file reads as empty");

        store.set("sk-proj-xyz\n").unwrap();
        assert_eq!(store.get().unwrap(), "sk-proj-xyz");
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "sk-proj-xyz");
    }

    #[cfg(unix)]
    #[test]
    fn file_key_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let store = FileKeyStore::new(dir.path().join("api_key"));
        store.set("secret").unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn masking() {
        assert_eq!(mask_key(""), "");
        assert_eq!(mask_key("short"), "*****");
        assert_eq!(mask_key("sk-ant-api03-abcdefwxyz"), "sk-ant…wxyz");
    }
}

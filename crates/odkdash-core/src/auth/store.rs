use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use super::Token;
use crate::api::OdkError;

/// Holder of the single current session token.
pub trait TokenStore: Send + Sync {
    /// The stored token, or `None` if there is none or it can't be read.
    fn load(&self) -> Option<Token>;

    /// Replace the stored token.
    fn save(&self, token: &Token) -> Result<(), OdkError>;

    /// Forget the stored token.
    fn clear(&self) -> Result<(), OdkError>;
}

/// Token persisted as JSON on disk, shared across process restarts.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<Token> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to read token file");
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Ignoring malformed token file");
                None
            }
        }
    }

    fn save(&self, token: &Token) -> Result<(), OdkError> {
        let contents = serde_json::to_vec(token)
            .map_err(|e| OdkError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        write_atomic(&self.path, &contents)?;
        debug!(path = ?self.path, expiry = token.expiry, "Token saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), OdkError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Token kept only for the life of the process.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<Token>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: Token) -> Self {
        Self {
            token: Mutex::new(Some(token)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<Token> {
        self.token.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn save(&self, token: &Token) -> Result<(), OdkError> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), OdkError> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

/// Write `contents` to a sibling temp file, then rename it over `path`.
///
/// Readers see either the old file or the new one, never a partial write.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

    if let Err(e) = std::fs::write(&tmp, contents) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("odk_token.json"));
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_file_store_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("odk_token.json"));

        store.save(&Token { token: "tok1".into(), expiry: 100 }).unwrap();
        assert_eq!(store.load(), Some(Token { token: "tok1".into(), expiry: 100 }));

        // Replaces, doesn't append
        store.save(&Token { token: "tok2".into(), expiry: 200 }).unwrap();
        assert_eq!(store.load(), Some(Token { token: "tok2".into(), expiry: 200 }));

        // No temp files left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_file_store_malformed_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odk_token.json");
        std::fs::write(&path, "{\"token\": ").unwrap();
        let store = FileTokenStore::new(path);
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_file_store_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("odk_token.json"));
        store.clear().unwrap(); // nothing to clear is fine
        store.save(&Token { token: "t".into(), expiry: 1 }).unwrap();
        store.clear().unwrap();
        assert_eq!(store.load(), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.load(), None);
        store.save(&Token { token: "t".into(), expiry: 5 }).unwrap();
        assert_eq!(store.load().map(|t| t.token), Some("t".to_string()));
        store.clear().unwrap();
        assert_eq!(store.load(), None);
    }
}

//! Durable key-value storage backing the session store

use mcpdesk_core::{storage_error, DeskError, DeskResult, ErrorContext};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};

/// Minimal durable key-value storage
///
/// Implementations must make `set` atomic from a reader's point of view.
pub trait KeyValueStorage: Send + Sync {
    /// A stored value that cannot be decoded as text is reported as
    /// `DeskError::Validation` with field `value`
    fn get(&self, key: &str) -> DeskResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> DeskResult<()>;

    /// Removing a missing key is not an error
    fn remove(&self, key: &str) -> DeskResult<()>;
}

/// In-memory storage, used by tests and short-lived tools
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> DeskResult<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| storage_error!(format!("Failed to acquire read lock: {}", e), "memory_storage"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> DeskResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| storage_error!(format!("Failed to acquire write lock: {}", e), "memory_storage"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> DeskResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| storage_error!(format!("Failed to acquire write lock: {}", e), "memory_storage"))?;
        entries.remove(key);
        Ok(())
    }
}

/// File-backed storage: one `<key>.json` file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    storage_dir: PathBuf,
}

impl FileStorage {
    /// Create a new file storage, creating the directory if needed
    pub fn new<P: AsRef<Path>>(storage_dir: P) -> DeskResult<Self> {
        let storage_dir = storage_dir.as_ref().to_path_buf();

        std::fs::create_dir_all(&storage_dir).map_err(|e| DeskError::Storage {
            message: format!("Failed to create {}", storage_dir.display()),
            source: Some(Box::new(e)),
            context: ErrorContext::new("file_storage")
                .with_operation("create_dir")
                .with_suggestion("Check permissions of the session directory"),
        })?;

        info!("Session storage initialized at: {}", storage_dir.display());

        Ok(Self { storage_dir })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn entry_path(&self, key: &str) -> DeskResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(DeskError::Validation {
                message: format!("Invalid storage key: {:?}", key),
                field: Some("key".to_string()),
                context: ErrorContext::new("file_storage")
                    .with_suggestion("Use only ASCII letters, digits, '-' and '_' in keys"),
            });
        }
        Ok(self.storage_dir.join(format!("{}.json", key)))
    }
}

/// Write a file readable by the owner only, from its creation on
fn write_private(path: &Path, value: &str) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(value.as_bytes())?;
    file.sync_all()
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> DeskResult<Option<String>> {
        let path = self.entry_path(key)?;
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(storage_error!(
                    format!("Failed to read {}", path.display()),
                    "file_storage",
                    e
                ))
            }
        };

        String::from_utf8(bytes).map(Some).map_err(|e| DeskError::Validation {
            message: format!("{} is not valid UTF-8: {}", path.display(), e.utf8_error()),
            field: Some("value".to_string()),
            context: ErrorContext::new("file_storage").with_operation("get"),
        })
    }

    fn set(&self, key: &str, value: &str) -> DeskResult<()> {
        let path = self.entry_path(key)?;
        let tmp_path = self
            .storage_dir
            .join(format!(".{}.{}.tmp", key, uuid::Uuid::new_v4()));

        if let Err(e) = write_private(&tmp_path, value) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(storage_error!(
                format!("Failed to write {}", tmp_path.display()),
                "file_storage",
                e
            ));
        }

        // rename is atomic on the same filesystem
        if let Err(e) = std::fs::rename(&tmp_path, &path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(storage_error!(
                format!("Failed to replace {}", path.display()),
                "file_storage",
                e
            ));
        }

        debug!("Stored entry {} at {}", key, path.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> DeskResult<()> {
        let path = self.entry_path(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed entry {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error!(
                format!("Failed to remove {}", path.display()),
                "file_storage",
                e
            )),
        }
    }
}

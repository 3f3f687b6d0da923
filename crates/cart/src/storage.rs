//! Guest cart persistence.
//!
//! While the shopper is a guest the cart lives in a device-local key-value
//! entry holding a JSON array of `{productId, quantity}` lines. Product
//! snapshots are never persisted so a later session cannot render a stale
//! cached price.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::warn;
use vinyl_vibe_core::CartLine;

/// Errors from the local cart store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The cart could not be encoded.
    #[error("Storage encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable device-local storage for the guest cart entry.
pub trait LocalCartStore: Send + Sync {
    /// Raw stored text, or `None` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry exists but cannot be read.
    fn read(&self) -> Result<Option<String>, StorageError>;

    /// Replace the stored text.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be written.
    fn write(&self, contents: &str) -> Result<(), StorageError>;

    /// Remove the entry. Removing a missing entry succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry exists but cannot be removed.
    fn clear(&self) -> Result<(), StorageError>;
}

/// In-memory store, shared between clones.
#[derive(Debug, Default, Clone)]
pub struct MemoryCartStore {
    entry: Arc<Mutex<Option<String>>>,
}

impl MemoryCartStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with raw text.
    #[must_use]
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            entry: Arc::new(Mutex::new(Some(contents.into()))),
        }
    }

    /// The raw stored text.
    #[must_use]
    pub fn contents(&self) -> Option<String> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.entry
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl LocalCartStore for MemoryCartStore {
    fn read(&self) -> Result<Option<String>, StorageError> {
        Ok(self.lock().clone())
    }

    fn write(&self, contents: &str) -> Result<(), StorageError> {
        *self.lock() = Some(contents.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.lock() = None;
        Ok(())
    }
}

/// Store backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct FileCartStore {
    path: PathBuf,
}

impl FileCartStore {
    /// Create a store using `path` as the entry.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LocalCartStore for FileCartStore {
    fn read(&self) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, contents: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, contents)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

// =============================================================================
// Guest Line Helpers
// =============================================================================

/// Parse stored text into guest lines.
///
/// Returns `None` when the text is not a JSON array of lines.
#[must_use]
pub fn parse_guest_lines(raw: &str) -> Option<Vec<CartLine>> {
    serde_json::from_str::<Vec<CartLine>>(raw).ok()
}

/// Load the guest cart, treating anything unreadable as empty.
///
/// Corrupt or non-array entries are logged and otherwise ignored; the next
/// guest write replaces them.
pub fn load_guest_lines(store: &dyn LocalCartStore) -> Vec<CartLine> {
    let raw = match store.read() {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(error = %e, "Failed to read guest cart, starting empty");
            return Vec::new();
        }
    };

    parse_guest_lines(&raw).unwrap_or_else(|| {
        warn!(
            preview = %raw.chars().take(80).collect::<String>(),
            "Guest cart entry is corrupt, starting empty"
        );
        Vec::new()
    })
}

/// Persist guest lines as a JSON array of `{productId, quantity}`.
///
/// # Errors
///
/// Returns `StorageError` if encoding or writing fails.
pub fn save_guest_lines(store: &dyn LocalCartStore, lines: &[CartLine]) -> Result<(), StorageError> {
    let encoded = serde_json::to_string(lines)?;
    store.write(&encoded)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_entry_loads_empty() {
        let store = MemoryCartStore::new();
        assert!(load_guest_lines(&store).is_empty());
    }

    #[test]
    fn test_corrupt_entry_loads_empty() {
        let store = MemoryCartStore::with_contents("{not json");
        assert!(load_guest_lines(&store).is_empty());

        let store = MemoryCartStore::with_contents(r#"{"productId":"p1","quantity":1}"#);
        assert!(load_guest_lines(&store).is_empty());

        let store = MemoryCartStore::with_contents(r#"[{"productId":"p1","quantity":-3}]"#);
        assert!(load_guest_lines(&store).is_empty());
    }

    #[test]
    fn test_save_and_load_lines() {
        let store = MemoryCartStore::new();
        let lines = vec![CartLine::new("p1", 2), CartLine::new("p2", 1)];
        save_guest_lines(&store, &lines).unwrap();

        assert_eq!(
            store.contents().unwrap(),
            r#"[{"productId":"p1","quantity":2},{"productId":"p2","quantity":1}]"#
        );
        assert_eq!(load_guest_lines(&store), lines);
    }

    #[test]
    fn test_file_store_lifecycle() {
        let dir = std::env::temp_dir().join(format!("vv-cart-{}", uuid::Uuid::new_v4()));
        let store = FileCartStore::new(dir.join("nested").join("cart.json"));

        assert!(store.read().unwrap().is_none());
        save_guest_lines(&store, &[CartLine::new("p1", 4)]).unwrap();
        assert_eq!(load_guest_lines(&store), vec![CartLine::new("p1", 4)]);

        store.clear().unwrap();
        assert!(store.read().unwrap().is_none());
        store.clear().unwrap();

        let _ = std::fs::remove_dir_all(dir);
    }
}

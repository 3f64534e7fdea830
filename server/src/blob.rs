//! Object store capability: a durable key to bytes mapping with no
//! transactional semantics of its own. The relational ledger is the source of
//! truth; a blob may transiently exist without a ledger row (an orphan) but
//! never the other way around.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Key namespace for chunk objects.
pub const CHUNK_KEY_PREFIX: &str = "chunks";

/// Storage key for a chunk, derived deterministically from its fingerprint.
#[must_use]
pub fn chunk_key(fingerprint: &str) -> String {
    format!("{CHUNK_KEY_PREFIX}/{fingerprint}")
}

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("blob i/o error: {0}")]
    Io(#[from] io::Error),
}

pub trait BlobStore: Send + Sync {
    /// Stores `data` under `key`. Puts to the same key are idempotent because
    /// keys are content addressed and carry identical bytes.
    fn put(&self, key: &str, data: &[u8]) -> Result<(), BlobError>;

    fn get(&self, key: &str) -> Result<Vec<u8>, BlobError>;

    /// Removes the object. Deleting an absent key is a no-op, so the delete
    /// path tolerates re-delivery.
    fn delete(&self, key: &str) -> Result<(), BlobError>;

    /// Size of the stored object in bytes, without reading it.
    fn head(&self, key: &str) -> Result<u64, BlobError>;
}

/// Local filesystem object store. Objects live under `root` with the storage
/// key as relative path, e.g. `<root>/chunks/<fingerprint>`.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn not_found(key: &str, e: io::Error) -> BlobError {
        if e.kind() == io::ErrorKind::NotFound {
            BlobError::NotFound(key.to_string())
        } else {
            BlobError::Io(e)
        }
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, key: &str, data: &[u8]) -> Result<(), BlobError> {
        let path = self.key_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // write-then-rename so readers never observe a half written object
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        fs::read(self.key_path(key)).map_err(|e| Self::not_found(key, e))
    }

    fn delete(&self, key: &str) -> Result<(), BlobError> {
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobError::Io(e)),
        }
    }

    fn head(&self, key: &str) -> Result<u64, BlobError> {
        let meta = fs::metadata(self.key_path(key)).map_err(|e| Self::not_found(key, e))?;
        Ok(meta.len())
    }
}

impl AsRef<Path> for FsBlobStore {
    fn as_ref(&self) -> &Path {
        self.root.as_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn store() -> (tempfile::TempDir, FsBlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        (dir, store)
    }

    #[rstest]
    #[case("abc", "chunks/abc")]
    #[case("00ff", "chunks/00ff")]
    #[trace]
    fn chunk_key_format(#[case] fingerprint: &str, #[case] expected: &str) {
        // Arrange

        // Act
        let key = chunk_key(fingerprint);

        // Assert
        assert_eq!(key, expected);
    }

    #[test]
    fn put_then_get_roundtrip() {
        // Arrange
        let (_dir, store) = store();

        // Act
        store.put("chunks/k1", b"payload").unwrap();
        let read = store.get("chunks/k1").unwrap();

        // Assert
        assert_eq!(read, b"payload");
    }

    #[test]
    fn put_same_key_is_idempotent() {
        // Arrange
        let (_dir, store) = store();
        store.put("chunks/k1", b"payload").unwrap();

        // Act
        store.put("chunks/k1", b"payload").unwrap();

        // Assert
        assert_eq!(store.get("chunks/k1").unwrap(), b"payload");
        assert_eq!(store.head("chunks/k1").unwrap(), 7);
    }

    #[test]
    fn get_missing_is_not_found() {
        // Arrange
        let (_dir, store) = store();

        // Act
        let result = store.get("chunks/missing");

        // Assert
        assert!(matches!(result, Err(BlobError::NotFound(_))));
    }

    #[test]
    fn delete_missing_is_noop() {
        // Arrange
        let (_dir, store) = store();

        // Act
        let result = store.delete("chunks/missing");

        // Assert
        assert!(result.is_ok());
    }

    #[test]
    fn delete_removes_object() {
        // Arrange
        let (_dir, store) = store();
        store.put("chunks/k1", b"payload").unwrap();

        // Act
        store.delete("chunks/k1").unwrap();

        // Assert
        assert!(matches!(
            store.head("chunks/k1"),
            Err(BlobError::NotFound(_))
        ));
    }
}

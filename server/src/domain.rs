use kernel::{Bucket, DeleteResult, File, UploadResult};
use thiserror::Error;

use crate::blob::{BlobError, BlobStore};

/// One physically stored, deduplicated block as recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Content hash of the block, globally unique
    pub fingerprint: String,
    /// Object store key the block lives under
    pub storage_key: String,
    /// Byte length of the block
    pub size: i64,
    /// Number of files currently including this chunk
    pub reference_count: i64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// File, chunk or manifest entry referenced by identifier does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Ledger and object store diverged; fatal, never retried.
    #[error("integrity fault: {0}")]
    Integrity(String),
    /// A concurrent writer created this fingerprint first. Recovered
    /// internally by re-resolving the chunk as a hit, never surfaced.
    #[error("fingerprint already exists: {0}")]
    DuplicateFingerprint(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("object store error: {0}")]
    Blob(#[from] BlobError),
    #[error("ledger error: {0}")]
    Ledger(#[from] rusqlite::Error),
}

/// Metadata of a file about to be uploaded.
pub struct NewFile<'a> {
    /// Path of the file inside its bucket
    pub path: &'a str,
    /// Target bucket identifier
    pub bucket: &'a str,
    /// Declared MIME type
    pub content_type: &'a str,
    /// Fixed chunk size in bytes, must be positive
    pub chunk_size: usize,
}

/// The durable ledger plus the orchestrations that keep it consistent with
/// the external object store.
///
/// Every mutating operation is transactional: either the whole set of ledger
/// changes of one upload or delete commits, or none of it does. Blobs written
/// for a failed upload are compensated with best-effort deletes, and blobs of
/// collected chunks are physically removed only after the ledger commit.
pub trait Ledger {
    fn new_database(&self) -> Result<(), StoreError>;

    /// Chunks `data`, deduplicates against the ledger, stores new chunks in
    /// `blobs` and persists the file record with its full ordered manifest.
    fn upload(
        &mut self,
        meta: &NewFile<'_>,
        data: &[u8],
        blobs: &dyn BlobStore,
    ) -> Result<UploadResult, StoreError>;

    /// Reassembles the exact original bytes of a file from its manifest.
    fn download(&mut self, id: i64, blobs: &dyn BlobStore)
        -> Result<(File, Vec<u8>), StoreError>;

    /// Deletes a file, decrements its chunks and reclaims the ones that
    /// reached zero references.
    fn delete_file(&mut self, id: i64, blobs: &dyn BlobStore) -> Result<DeleteResult, StoreError>;

    /// Deletes every file of a bucket in one transaction.
    fn delete_bucket(
        &mut self,
        bucket: &str,
        blobs: &dyn BlobStore,
    ) -> Result<DeleteResult, StoreError>;

    fn get_buckets(&mut self) -> Result<Vec<Bucket>, StoreError>;

    fn get_files(&mut self, bucket: &str) -> Result<Vec<File>, StoreError>;

    fn get_file_info(&mut self, id: i64) -> Result<File, StoreError>;

    fn search_file_info(&mut self, bucket: &str, path: &str) -> Result<File, StoreError>;

    fn lookup_chunk(&mut self, fingerprint: &str) -> Result<Option<Chunk>, StoreError>;
}

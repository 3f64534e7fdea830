#![warn(clippy::unwrap_in_result)]
#![warn(clippy::unwrap_used)]

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Represents a storage bucket containing multiple files.
///
/// A bucket is a logical container that groups related files together.
/// Each bucket has a unique identifier and tracks the number of files it contains.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct Bucket {
    /// Unique identifier for the bucket
    pub id: String,
    /// Total number of files stored in this bucket
    pub files_count: i64,
}

/// Represents a file stored in the system.
///
/// The file's bytes do not live in the relational ledger. They are split into
/// fixed size chunks kept in the object store, and the ledger only records
/// the ordered manifest needed to reassemble them.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct File {
    /// Unique numeric identifier for the file
    pub id: i64,
    /// File path or location within the storage system
    pub path: String,
    /// Identifier of the bucket containing this file
    pub bucket: String,
    /// Size of the original file in bytes
    pub size: usize,
    /// Declared MIME type of the file content
    pub content_type: String,
    /// Upload timestamp, RFC 3339
    pub uploaded_at: String,
    /// Number of manifest entries the file reassembles from
    pub chunk_count: i64,
}

/// Result of an upload showing how well deduplication worked.
///
/// Every chunk of the uploaded file is either newly stored (unique) or
/// already present in the store and shared by reference (duplicate).
#[derive(Serialize, Deserialize, Default, ToSchema)]
pub struct UploadResult {
    /// Identifier assigned to the new file
    pub file_id: i64,
    /// Total number of chunks the file was split into
    pub total_chunks: usize,
    /// Number of chunks that had to be physically stored
    pub unique_chunks: usize,
    /// Number of chunks satisfied by existing stored copies
    pub duplicate_chunks: usize,
}

/// Result of a delete operation showing the number of items removed.
///
/// Distinguishes between file records and physically reclaimed chunk blobs:
/// a chunk blob is only removed once no file references it any more.
#[derive(Serialize, Deserialize, Default, ToSchema)]
pub struct DeleteResult {
    /// Number of file records deleted
    pub files: usize,
    /// Number of chunk blobs physically deleted from the object store
    pub blobs: usize,
}

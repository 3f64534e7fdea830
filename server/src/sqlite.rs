use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kernel::{Bucket, DeleteResult, File, UploadResult};
use rusqlite::{
    params, Connection, ErrorCode, OpenFlags, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};

use crate::blob::{chunk_key, BlobError, BlobStore};
use crate::chunker::FixedChunker;
use crate::domain::{Chunk, Ledger, NewFile, StoreError};

const CACHE_SIZE: &str = "4096";

const FILE_COLUMNS: &str = "f.id, f.path, f.bucket_id, f.size, f.content_type, f.uploaded_at, \
     (SELECT COUNT(*) FROM manifest m WHERE m.file_id = f.id) AS chunk_count";

pub enum Mode {
    ReadWrite,
    ReadOnly,
}

pub struct Sqlite {
    conn: Connection,
}

impl Sqlite {
    pub fn open<P: AsRef<Path>>(path: P, mode: Mode) -> Result<Self, StoreError> {
        let conn = match mode {
            Mode::ReadWrite => Connection::open(path),
            Mode::ReadOnly => Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY),
        }?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self { conn })
    }

    fn enable_foreign_keys(&self) -> Result<(), StoreError> {
        self.pragma_update("foreign_keys", "ON")
    }

    fn assign_cache_size(&self) -> Result<(), StoreError> {
        self.pragma_update("cache_size", CACHE_SIZE)
    }

    fn pragma_update(&self, name: &str, value: &str) -> Result<(), StoreError> {
        self.conn.pragma_update(None, name, value)?;
        Ok(())
    }

    fn prepare_write(&self) -> Result<(), StoreError> {
        self.assign_cache_size()?;
        self.enable_foreign_keys()?;
        self.pragma_update("synchronous", "FULL")
    }
}

impl Ledger for Sqlite {
    fn new_database(&self) -> Result<(), StoreError> {
        self.pragma_update("encoding", "UTF-8")?;
        // WAL sticks to the database file and lets concurrent readers proceed
        // while one writer holds the transaction
        self.conn
            .query_row("PRAGMA journal_mode = WAL", [], |_row| Ok(()))?;

        self.conn.execute(
            "CREATE TABLE chunk (
                  fingerprint     TEXT PRIMARY KEY,
                  storage_key     TEXT NOT NULL,
                  size            INTEGER NOT NULL,
                  reference_count INTEGER NOT NULL,
                  created_at      TEXT NOT NULL
                  )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE file (
                  id           INTEGER PRIMARY KEY AUTOINCREMENT,
                  path         TEXT NOT NULL,
                  bucket_id    TEXT NOT NULL,
                  size         INTEGER NOT NULL,
                  content_type TEXT NOT NULL,
                  uploaded_at  TEXT NOT NULL
                  )",
            [],
        )?;

        self.conn.execute(
            "CREATE UNIQUE INDEX unique_bucket_file_ix ON file(path, bucket_id)",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE manifest (
                  file_id     INTEGER NOT NULL REFERENCES file(id) ON DELETE CASCADE,
                  chunk_order INTEGER NOT NULL,
                  fingerprint TEXT NOT NULL REFERENCES chunk(fingerprint) ON DELETE RESTRICT,
                  PRIMARY KEY (file_id, chunk_order)
                  )",
            [],
        )?;

        Ok(())
    }

    fn upload(
        &mut self,
        meta: &NewFile<'_>,
        data: &[u8],
        blobs: &dyn BlobStore,
    ) -> Result<UploadResult, StoreError> {
        if meta.chunk_size == 0 {
            return Err(StoreError::Validation(
                "chunk size must be positive".to_string(),
            ));
        }

        self.prepare_write()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        // keys of blobs written in this attempt, compensated on failure
        let mut written: Vec<String> = Vec::new();
        match upload_tx(&tx, meta, data, blobs, &mut written) {
            Ok(result) => match tx.commit() {
                Ok(()) => Ok(result),
                Err(e) => {
                    compensate(blobs, &written);
                    Err(e.into())
                }
            },
            Err(e) => {
                if let Err(re) = tx.rollback() {
                    tracing::error!("upload rollback failed: {re}");
                }
                compensate(blobs, &written);
                Err(e)
            }
        }
    }

    fn download(
        &mut self,
        id: i64,
        blobs: &dyn BlobStore,
    ) -> Result<(File, Vec<u8>), StoreError> {
        let info = self.get_file_info(id)?;

        let declared: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM manifest WHERE file_id = ?1",
            [id],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn.prepare_cached(
            "SELECT m.chunk_order, c.storage_key, c.size
             FROM manifest m JOIN chunk c ON c.fingerprint = m.fingerprint
             WHERE m.file_id = ?1
             ORDER BY m.chunk_order",
        )?;
        let entries = stmt
            .query_map([id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        // the join silently drops manifest entries whose chunk row is gone
        if entries.len() as i64 != declared {
            return Err(StoreError::Integrity(format!(
                "file {id}: {declared} manifest entries but only {} resolvable chunks",
                entries.len()
            )));
        }

        let mut content = Vec::with_capacity(info.size);
        for (order, storage_key, size) in entries {
            let bytes = blobs.get(&storage_key).map_err(|e| match e {
                BlobError::NotFound(key) => StoreError::Integrity(format!(
                    "file {id}: blob {key} missing for manifest entry {order}"
                )),
                other => StoreError::Blob(other),
            })?;
            if bytes.len() as i64 != size {
                return Err(StoreError::Integrity(format!(
                    "file {id}: chunk {storage_key} is {} bytes, ledger says {size}",
                    bytes.len()
                )));
            }
            content.extend_from_slice(&bytes);
        }

        if content.len() != info.size {
            return Err(StoreError::Integrity(format!(
                "file {id}: reassembled {} bytes, expected {}",
                content.len(),
                info.size
            )));
        }

        Ok((info, content))
    }

    fn delete_file(&mut self, id: i64, blobs: &dyn BlobStore) -> Result<DeleteResult, StoreError> {
        self.prepare_write()?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let doomed = delete_file_tx(&tx, id)?;
        tx.commit()?;

        // physical deletes strictly after the ledger commit: a blob must never
        // disappear while a transaction that could still roll back marked it
        Ok(DeleteResult {
            files: 1,
            blobs: delete_blobs(blobs, &doomed),
        })
    }

    fn delete_bucket(
        &mut self,
        bucket: &str,
        blobs: &dyn BlobStore,
    ) -> Result<DeleteResult, StoreError> {
        self.prepare_write()?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let ids = {
            let mut stmt = tx.prepare("SELECT id FROM file WHERE bucket_id = ?1")?;
            let ids = stmt
                .query_map([bucket], |row| row.get::<_, i64>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        let mut doomed = Vec::new();
        for id in &ids {
            doomed.extend(delete_file_tx(&tx, *id)?);
        }
        tx.commit()?;

        Ok(DeleteResult {
            files: ids.len(),
            blobs: delete_blobs(blobs, &doomed),
        })
    }

    fn get_buckets(&mut self) -> Result<Vec<Bucket>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT bucket_id, COUNT(*) FROM file GROUP BY bucket_id ORDER BY bucket_id",
        )?;
        let buckets = stmt
            .query_map([], |row| {
                Ok(Bucket {
                    id: row.get(0)?,
                    files_count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(buckets)
    }

    fn get_files(&mut self, bucket: &str) -> Result<Vec<File>, StoreError> {
        let query = format!("SELECT {FILE_COLUMNS} FROM file f WHERE f.bucket_id = ?1 ORDER BY f.id");
        let mut stmt = self.conn.prepare_cached(&query)?;
        let files = stmt
            .query_map([bucket], file_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(files)
    }

    fn get_file_info(&mut self, id: i64) -> Result<File, StoreError> {
        let query = format!("SELECT {FILE_COLUMNS} FROM file f WHERE f.id = ?1");
        self.conn
            .query_row(&query, [id], file_from_row)
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("file {id}")))
    }

    fn search_file_info(&mut self, bucket: &str, path: &str) -> Result<File, StoreError> {
        let query = format!("SELECT {FILE_COLUMNS} FROM file f WHERE f.bucket_id = ?1 AND f.path = ?2");
        self.conn
            .query_row(&query, params![bucket, path], file_from_row)
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("file {path} in bucket {bucket}")))
    }

    fn lookup_chunk(&mut self, fingerprint: &str) -> Result<Option<Chunk>, StoreError> {
        lookup(&self.conn, fingerprint)
    }
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<File> {
    let size: i64 = row.get(3)?;
    let uploaded_at: DateTime<Utc> = row.get(5)?;
    Ok(File {
        id: row.get(0)?,
        path: row.get(1)?,
        bucket: row.get(2)?,
        size: usize::try_from(size).unwrap_or_default(),
        content_type: row.get(4)?,
        uploaded_at: uploaded_at.to_rfc3339(),
        chunk_count: row.get(6)?,
    })
}

fn upload_tx(
    tx: &Transaction<'_>,
    meta: &NewFile<'_>,
    data: &[u8],
    blobs: &dyn BlobStore,
    written: &mut Vec<String>,
) -> Result<UploadResult, StoreError> {
    tx.prepare_cached(
        "INSERT INTO file (path, bucket_id, size, content_type, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
    )?
    .execute(params![
        meta.path,
        meta.bucket,
        data.len() as i64,
        meta.content_type,
        Utc::now()
    ])?;
    let file_id = tx.last_insert_rowid();

    let chunker = FixedChunker::new(meta.chunk_size);
    let mut total = 0usize;
    let mut unique = 0usize;
    let mut duplicate = 0usize;
    // a chunk repeated within one file still counts one reference for the
    // file, so decrementing per distinct fingerprint on delete stays symmetric
    let mut seen: HashSet<String> = HashSet::new();

    for chunk in chunker.split(data) {
        total += 1;

        if seen.contains(&chunk.fingerprint) {
            duplicate += 1;
        } else if lookup(tx, &chunk.fingerprint)?.is_some() {
            increment_reference(tx, &chunk.fingerprint)?;
            duplicate += 1;
            seen.insert(chunk.fingerprint.clone());
        } else {
            let key = chunk_key(&chunk.fingerprint);
            let mut pushed = false;
            match blobs.head(&key) {
                // orphan left behind by an earlier compensated upload; same
                // fingerprint means same bytes, adopt it as is
                Ok(_) => {}
                Err(BlobError::NotFound(_)) => {
                    blobs.put(&key, chunk.data)?;
                    written.push(key.clone());
                    pushed = true;
                }
                Err(e) => return Err(e.into()),
            }
            match create_new(tx, &chunk.fingerprint, &key, chunk.data.len() as i64) {
                Ok(()) => unique += 1,
                Err(StoreError::DuplicateFingerprint(_)) => {
                    // lost the double-miss race; the winner's row owns the
                    // blob now, so it must not be on our rollback list
                    if pushed {
                        written.pop();
                    }
                    increment_reference(tx, &chunk.fingerprint)?;
                    duplicate += 1;
                }
                Err(e) => return Err(e),
            }
            seen.insert(chunk.fingerprint.clone());
        }

        tx.prepare_cached(
            "INSERT INTO manifest (file_id, chunk_order, fingerprint) VALUES (?1, ?2, ?3)",
        )?
        .execute(params![file_id, chunk.order as i64, chunk.fingerprint])?;
    }

    Ok(UploadResult {
        file_id,
        total_chunks: total,
        unique_chunks: unique,
        duplicate_chunks: duplicate,
    })
}

/// Deletes one file inside the enclosing transaction and returns the storage
/// keys of chunks whose reference count dropped to zero. The caller performs
/// the physical deletes after commit.
fn delete_file_tx(tx: &Transaction<'_>, id: i64) -> Result<Vec<String>, StoreError> {
    let fingerprints = {
        let mut stmt =
            tx.prepare_cached("SELECT DISTINCT fingerprint FROM manifest WHERE file_id = ?1")?;
        let fingerprints = stmt
            .query_map([id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        fingerprints
    };

    // manifest entries cascade with the file record
    let removed = tx.execute("DELETE FROM file WHERE id = ?1", [id])?;
    if removed == 0 {
        return Err(StoreError::NotFound(format!("file {id}")));
    }

    let mut doomed = Vec::new();
    for fingerprint in fingerprints {
        let left = decrement_reference(tx, &fingerprint)?.ok_or_else(|| {
            StoreError::Integrity(format!(
                "file {id}: manifest references unknown chunk {fingerprint}"
            ))
        })?;
        if left == 0 {
            let key = lookup(tx, &fingerprint)?.map(|c| c.storage_key);
            if delete_if_unreferenced(tx, &fingerprint)? {
                if let Some(key) = key {
                    doomed.push(key);
                }
            }
        }
    }
    Ok(doomed)
}

/// Resolves a fingerprint to its ledger row, if any.
pub(crate) fn lookup(conn: &Connection, fingerprint: &str) -> Result<Option<Chunk>, StoreError> {
    let chunk = conn
        .query_row(
            "SELECT fingerprint, storage_key, size, reference_count
             FROM chunk WHERE fingerprint = ?1",
            [fingerprint],
            |row| {
                Ok(Chunk {
                    fingerprint: row.get(0)?,
                    storage_key: row.get(1)?,
                    size: row.get(2)?,
                    reference_count: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(chunk)
}

/// Inserts a fresh chunk row with reference count 1. The unique constraint on
/// `fingerprint` turns a concurrent double create into `DuplicateFingerprint`.
pub(crate) fn create_new(
    conn: &Connection,
    fingerprint: &str,
    storage_key: &str,
    size: i64,
) -> Result<(), StoreError> {
    let result = conn
        .prepare_cached(
            "INSERT INTO chunk (fingerprint, storage_key, size, reference_count, created_at)
             VALUES (?1, ?2, ?3, 1, ?4)",
        )
        .and_then(|mut stmt| stmt.execute(params![fingerprint, storage_key, size, Utc::now()]));
    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            Err(StoreError::DuplicateFingerprint(fingerprint.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Atomic `+1` on an existing chunk row.
pub(crate) fn increment_reference(conn: &Connection, fingerprint: &str) -> Result<(), StoreError> {
    let updated = conn
        .prepare_cached(
            "UPDATE chunk SET reference_count = reference_count + 1 WHERE fingerprint = ?1",
        )?
        .execute([fingerprint])?;
    if updated == 0 {
        return Err(StoreError::NotFound(format!("chunk {fingerprint}")));
    }
    Ok(())
}

/// Atomic `-1` floored at zero. Returns the new count, or `None` if no row
/// exists for the fingerprint.
pub(crate) fn decrement_reference(
    conn: &Connection,
    fingerprint: &str,
) -> Result<Option<i64>, StoreError> {
    let count = conn
        .query_row(
            "UPDATE chunk SET reference_count = MAX(reference_count - 1, 0)
             WHERE fingerprint = ?1 RETURNING reference_count",
            [fingerprint],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(count)
}

/// Removes the chunk row only if nothing references it any more.
pub(crate) fn delete_if_unreferenced(
    conn: &Connection,
    fingerprint: &str,
) -> Result<bool, StoreError> {
    let deleted = conn
        .prepare_cached("DELETE FROM chunk WHERE fingerprint = ?1 AND reference_count = 0")?
        .execute([fingerprint])?;
    Ok(deleted > 0)
}

/// Best-effort removal of blobs written by a failed upload attempt. An
/// orphaned unreferenced blob is acceptable, an error surfaced from the error
/// path is not.
fn compensate(blobs: &dyn BlobStore, written: &[String]) {
    for key in written {
        if let Err(e) = blobs.delete(key) {
            tracing::error!("compensating delete of blob {key} failed, orphan left behind: {e}");
        }
    }
}

/// Physically deletes collected blobs after the ledger commit. Failures leave
/// unreachable orphans and are logged for later reconciliation, not retried.
fn delete_blobs(blobs: &dyn BlobStore, keys: &[String]) -> usize {
    let mut deleted = 0;
    for key in keys {
        match blobs.delete(key) {
            Ok(()) => deleted += 1,
            Err(e) => tracing::error!("failed to delete blob {key}, orphan left behind: {e}"),
        }
    }
    deleted
}

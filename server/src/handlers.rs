#![allow(clippy::unused_async)]
use crate::domain::{Ledger, NewFile, StoreError};
use crate::file_reply::FileReply;
use crate::sqlite::{Mode, Sqlite};
use crate::AppState;
use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures::{Stream, TryStreamExt};
use futures_util::StreamExt;
use kernel::{Bucket, DeleteResult, File, UploadResult};
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::io::StreamReader;

use axum::{
    extract::{Multipart, Path},
    http::StatusCode,
};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Adds several files from multipart form into bucket.
#[utoipa::path(
    post,
    path = "/api/{bucket}",
    responses(
        (status = 201, description = "Files created successfully", body = [UploadResult]),
        (status = 500, description = "Server error", body = String)
    ),
    tag = "buckets",
    params(
        ("bucket" = String, Path, description = "Bucket id")
    ),
)]
pub async fn insert_many_from_form(
    Path(bucket): Path<String>,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    tracing::info!("create bucket: {bucket}");

    // drain the whole form before opening the write transaction window
    let mut parts: Vec<(String, String, Vec<u8>)> = vec![];
    while let Ok(Some(field)) = multipart.next_field().await {
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        match read_from_stream(field).await {
            Ok((data, _)) => parts.push((file_name, content_type, data)),
            Err(e) => {
                tracing::error!("{e}");
                return internal_server_error(&e);
            }
        }
    }

    let blobs = Arc::clone(&state);
    execute(&state, Mode::ReadWrite, move |mut repository| {
        let mut inserted: Vec<UploadResult> = vec![];
        for (file_name, content_type, data) in parts {
            let meta = NewFile {
                path: &file_name,
                bucket: &bucket,
                content_type: &content_type,
                chunk_size: blobs.chunk_size,
            };
            let read_bytes = data.len() as u64;
            let result = repository.upload(&meta, &data, &blobs.blobs);
            if let Some(result) = log_upload_result(result, &file_name, read_bytes) {
                inserted.push(result);
            }
        }
        Ok(created(Json(inserted)))
    })
}

/// Adds single file into bucket.
#[utoipa::path(
    post,
    path = "/api/{bucket}/{file_name}",
    tag = "files",
    responses(
        (status = 201, description = "File added into bucket", body = UploadResult),
        (status = 400, description = "Invalid request", body = String),
        (status = 500, description = "Server error", body = String)
    ),
    params(
        ("bucket" = String, Path, description = "Bucket id"),
        ("file_name" = String, Path, description = "File path inside bucket")
    ),
)]
pub async fn insert_file(
    Path((bucket, file_name)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Body,
) -> impl IntoResponse {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();
    match read_from_stream(body.into_data_stream()).await {
        Ok((data, read_bytes)) => {
            let blobs = Arc::clone(&state);
            execute(&state, Mode::ReadWrite, move |mut repository| {
                let meta = NewFile {
                    path: &file_name,
                    bucket: &bucket,
                    content_type: &content_type,
                    chunk_size: blobs.chunk_size,
                };
                let result = repository.upload(&meta, &data, &blobs.blobs)?;
                tracing::info!(
                    "file: {file_name} read: {read_bytes} file id: {} chunks: {} unique: {} duplicate: {}",
                    result.file_id,
                    result.total_chunks,
                    result.unique_chunks,
                    result.duplicate_chunks
                );
                Ok(created(Json(result)))
            })
        }
        Err(e) => {
            tracing::error!("{e}");
            internal_server_error(&e)
        }
    }
}

/// Deletes whole bucket with all it's files
#[utoipa::path(
    delete,
    path = "/api/{bucket}",
    responses(
        (status = 200, description = "Bucket with all files successfully deleted", body = DeleteResult),
        (status = 404, description = "Bucket not found", body = DeleteResult)
    ),
    tag = "buckets",
    params(
        ("bucket" = String, Path, description = "Bucket id")
    ),
)]
pub async fn delete_bucket(
    Path(bucket): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let blobs = Arc::clone(&state);
    execute(&state, Mode::ReadWrite, move |mut repository| {
        let result = match repository.delete_bucket(&bucket, &blobs.blobs) {
            Ok(deleted) => {
                tracing::info!(
                    "bucket: {} deleted. The number of files removed {} blobs removed {}",
                    &bucket,
                    deleted.files,
                    deleted.blobs
                );
                deleted
            }
            Err(e) => {
                tracing::error!("bucket '{}' not deleted. Error: {}", &bucket, e);
                DeleteResult::default()
            }
        };

        let status = if result.files == 0 {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::OK
        };
        Ok((status, Json(result)))
    })
}

/// Lists all buckets
#[utoipa::path(
    get,
    path = "/api/",
    tag = "buckets",
    responses(
        (status = 200, description = "List all buckets successfully", body = [Bucket]),
    ),
)]
pub async fn get_buckets(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    execute(&state, Mode::ReadOnly, move |mut repository| {
        let result = repository.get_buckets().unwrap_or_default();
        Ok(Json(result).into_response())
    })
}

/// Lists all files from a bucket
#[utoipa::path(
    get,
    path = "/api/{bucket}",
    responses(
        (status = 200, description = "Get all bucket's files successfully", body = [File]),
        (status = 404, description = "Bucket not found", body = [File])
    ),
    tag = "buckets",
    params(
        ("bucket" = String, Path, description = "Bucket id")
    ),
)]
pub async fn get_files(
    Path(bucket): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    execute(&state, Mode::ReadOnly, move |mut repository| {
        let result = repository.get_files(&bucket).unwrap_or_default();
        let status = if result.is_empty() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::OK
        };
        Ok((status, Json(result)))
    })
}

/// Gets file binary content by file id
#[utoipa::path(
    get,
    path = "/api/file/{id}",
    responses(
        (status = 200, response = FileReply),
        (status = 404, description = "File not found", body = String),
        (status = 500, description = "Store integrity fault", body = String)
    ),
    tag = "files",
    params(
        ("id" = i64, Path, description = "File id")
    ),
)]
pub async fn get_file_content(
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let blobs = Arc::clone(&state);
    execute(&state, Mode::ReadOnly, move |mut repository| {
        let (info, content) = repository.download(id, &blobs.blobs)?;
        tracing::info!("File size {}", content.len());
        Ok(FileReply::new(content, info))
    })
}

/// Gets file's information by file id
#[utoipa::path(
    get,
    path = "/api/file/{id}/meta",
    responses(
        (status = 200, body = File),
        (status = 404, description = "File not found", body = String)
    ),
    tag = "files",
    params(
        ("id" = i64, Path, description = "File id")
    ),
)]
pub async fn get_file_info(
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    execute(&state, Mode::ReadOnly, move |mut repository| {
        let info = repository.get_file_info(id)?;
        Ok(Json(info))
    })
}

/// Gets file binary content by bucket id and file path inside bucket
#[utoipa::path(
    get,
    path = "/api/{bucket}/{file_name}",
    responses(
        (status = 200, response = FileReply),
        (status = 404, description = "File not found", body = String)
    ),
    tag = "files",
    params(
        ("bucket" = String, Path, description = "Bucket id"),
        ("file_name" = String, Path, description = "File path inside bucket")
    ),
)]
pub async fn search_and_get_file_content(
    Path((bucket, file_name)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let blobs = Arc::clone(&state);
    execute(&state, Mode::ReadOnly, move |mut repository| {
        let info = repository.search_file_info(&bucket, &file_name)?;
        let (info, content) = repository.download(info.id, &blobs.blobs)?;
        tracing::info!("File size {}", content.len());
        Ok(FileReply::new(content, info))
    })
}

macro_rules! delete_file {
    ($repository:ident, $id:expr, $blobs:expr) => {{
        let delete_result = $repository.delete_file($id, $blobs);
        let result = match delete_result {
            Ok(deleted) => {
                tracing::info!("file: {} deleted, blobs removed {}", $id, deleted.blobs);
                deleted
            }
            Err(StoreError::NotFound(_)) => {
                tracing::info!("file: {} not exist", $id);
                DeleteResult::default()
            }
            Err(e) => {
                tracing::error!("file '{}' not deleted. Error: {}", $id, e);
                return Err(e);
            }
        };

        let status = if result.files == 0 {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::OK
        };
        Ok((status, Json(result)))
    }};
}

/// Deletes file by id
#[utoipa::path(
    delete,
    path = "/api/file/{id}",
    responses(
        (status = 200, description = "File successfully deleted", body = DeleteResult),
        (status = 404, description = "File not found", body = DeleteResult)
    ),
    tag = "files",
    params(
        ("id" = i64, Path, description = "File id")
    ),
)]
pub async fn delete_file(
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let blobs = Arc::clone(&state);
    execute(&state, Mode::ReadWrite, move |mut repository| {
        delete_file!(repository, id, &blobs.blobs)
    })
}

/// Deletes file by bucket id and file path inside bucket
#[utoipa::path(
    delete,
    path = "/api/{bucket}/{file_name}",
    responses(
        (status = 200, description = "File successfully deleted", body = DeleteResult),
        (status = 404, description = "File not found", body = DeleteResult)
    ),
    tag = "files",
    params(
        ("bucket" = String, Path, description = "Bucket id"),
        ("file_name" = String, Path, description = "File path inside bucket")
    ),
)]
pub async fn search_and_delete_file(
    Path((bucket, file_name)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let blobs = Arc::clone(&state);
    execute(&state, Mode::ReadWrite, move |mut repository| {
        match repository.search_file_info(&bucket, &file_name) {
            Ok(f) => delete_file!(repository, f.id, &blobs.blobs),
            Err(StoreError::NotFound(_)) => {
                Ok((StatusCode::NOT_FOUND, Json(DeleteResult::default())))
            }
            Err(e) => Err(e),
        }
    })
}

/// Opens the ledger, runs `action` and turns its outcome into a response.
/// Store errors map onto HTTP statuses here and nowhere else.
fn execute<F, R>(state: &Arc<AppState>, mode: Mode, action: F) -> Response
where
    F: FnOnce(Sqlite) -> Result<R, StoreError>,
    R: IntoResponse,
{
    let start = Instant::now();
    match Sqlite::open(&state.db, mode) {
        Ok(s) => {
            let result = action(s);
            let duration = start.elapsed();
            tracing::info!("DB query time: {:?}", duration);
            match result {
                Ok(response) => response.into_response(),
                Err(e) => {
                    tracing::error!("{e}");
                    error_response(&e)
                }
            }
        }
        Err(e) => {
            tracing::error!("{e}");
            error_response(&e)
        }
    }
}

fn error_response(e: &StoreError) -> Response {
    let status = match e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string()).into_response()
}

fn log_upload_result(
    result: Result<UploadResult, StoreError>,
    file_name: &str,
    read_bytes: u64,
) -> Option<UploadResult> {
    match result {
        Ok(result) => {
            tracing::info!(
                "file: {} read: {} file id: {} chunks: {} unique: {} duplicate: {}",
                file_name,
                read_bytes,
                result.file_id,
                result.total_chunks,
                result.unique_chunks,
                result.duplicate_chunks
            );
            Some(result)
        }
        Err(e) => {
            tracing::error!("file '{}' not inserted. Error: {}", file_name, e);
            None
        }
    }
}

fn created<S: IntoResponse>(s: S) -> (StatusCode, Response) {
    (StatusCode::CREATED, s.into_response())
}

fn internal_server_error<E: ToString>(e: &E) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
}

async fn read_from_stream<S, E>(stream: S) -> io::Result<(Vec<u8>, usize)>
where
    S: Stream<Item = Result<Bytes, E>> + StreamExt,
    E: Sync + std::error::Error + Send + 'static,
{
    // Convert the stream into an `AsyncRead`.
    let body_with_io_error = stream.map_err(io::Error::other);
    let body_reader = StreamReader::new(body_with_io_error);
    futures::pin_mut!(body_reader);
    let mut buffer = Vec::new();

    let copied_bytes = tokio::io::copy(&mut body_reader, &mut buffer).await?;
    let copied_bytes = usize::try_from(copied_bytes).unwrap_or(usize::MAX);
    Ok((buffer, copied_bytes))
}

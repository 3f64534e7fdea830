use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::post,
    routing::{delete, get},
    Router,
};
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    classify::ServerErrorsFailureClass, limit::RequestBodyLimitLayer, trace::TraceLayer,
};
use tracing::Span;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod blob;
pub mod chunker;
pub mod domain;
pub mod file_reply;
mod handlers;
pub mod sqlite;

use crate::blob::FsBlobStore;
use crate::domain::Ledger;
use crate::sqlite::{Mode, Sqlite};
use std::env;
use std::path::Path;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DB_FILE: &str = "cstore.db";
const CURRENT_DIR: &str = "./";
const BLOB_DIR: &str = "blobs";
const DEFAULT_PORT: &str = "5000";
/// 1 MiB, every chunk of a file except the last one has exactly this size.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Server configuration, read from `CSTORE_*` environment variables with
/// sensible defaults for every knob.
pub struct Config {
    pub db_file: String,
    pub data_dir: String,
    pub blob_dir: String,
    pub port: String,
    pub chunk_size: usize,
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            db_file: env::var("CSTORE_DATA_FILE").unwrap_or_else(|_| String::from(DB_FILE)),
            data_dir: env::var("CSTORE_DATA_DIR").unwrap_or_else(|_| String::from(CURRENT_DIR)),
            blob_dir: env::var("CSTORE_BLOB_DIR").unwrap_or_else(|_| String::from(BLOB_DIR)),
            port: env::var("CSTORE_PORT").unwrap_or_else(|_| String::from(DEFAULT_PORT)),
            chunk_size: env::var("CSTORE_CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CHUNK_SIZE),
        }
    }
}

/// Shared handler state: ledger location, object store root and chunking
/// policy. Handlers open their own short lived ledger connections from it.
pub struct AppState {
    pub db: PathBuf,
    pub blobs: FsBlobStore,
    pub chunk_size: usize,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_buckets,
        handlers::insert_many_from_form,
        handlers::get_files,
        handlers::delete_bucket,
        handlers::insert_file,
        handlers::search_and_get_file_content,
        handlers::search_and_delete_file,
        handlers::get_file_content,
        handlers::get_file_info,
        handlers::delete_file,
    ),
    components(
        schemas(kernel::Bucket, kernel::File, kernel::UploadResult, kernel::DeleteResult),
        responses(file_reply::FileReply)
    ),
    tags(
        (name = "buckets", description = "Bucket management"),
        (name = "files", description = "Deduplicated file storage")
    )
)]
struct ApiDoc;

pub fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "server=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub async fn run() {
    init_logging();
    run_with(Config::from_env()).await;
}

pub async fn run_with(config: Config) {
    let db = Path::new(&config.data_dir).join(&config.db_file);
    if !db.exists() {
        std::fs::create_dir_all(&config.data_dir).expect("Data directory cannot be created");
        Sqlite::open(db.clone(), Mode::ReadWrite)
            .expect("Database file cannot be created")
            .new_database()
            .expect("Database schema cannot be created");
    }
    std::fs::create_dir_all(&config.blob_dir).expect("Blob directory cannot be created");

    let state = Arc::new(AppState {
        db,
        blobs: FsBlobStore::new(config.blob_dir),
        chunk_size: config.chunk_size,
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Cannot bind server socket");
    tracing::debug!("listening on {addr}");

    let app = create_routes(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed");
}

pub fn create_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .route("/api/", get(handlers::get_buckets))
        .route(
            "/api/:bucket",
            post(handlers::insert_many_from_form)
                .delete(handlers::delete_bucket)
                .get(handlers::get_files),
        )
        .route(
            "/api/:bucket/:file_name",
            post(handlers::insert_file)
                .get(handlers::search_and_get_file_content)
                .delete(handlers::search_and_delete_file),
        )
        .route(
            "/api/file/:id",
            delete(handlers::delete_file).get(handlers::get_file_content),
        )
        .route("/api/file/:id/meta", get(handlers::get_file_info))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().on_failure(
                    |error: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                        tracing::error!("Server error: {error}");
                    },
                ))
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(
                    2 * 1024 * 1024 * 1024, /* 2GB */
                ))
                .into_inner(),
        )
        .with_state(state)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    println!("signal received, starting graceful shutdown");
}

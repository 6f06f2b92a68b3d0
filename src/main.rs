mod blob;
mod config;
mod dto;
mod handlers;
mod models;
mod repository;
mod service;

use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use blob::BlobStore;
use config::StorageKind;
use handlers::rest;
use repository::{MemoryNoteRepository, NoteRepository, PgNoteRepository};
use service::NoteService;

#[tokio::main]
async fn main() {
    // Log setup
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load config
    let cfg = config::load_config().unwrap_or_else(|e| {
        tracing::error!("Failed to load config: {e}");
        panic!("failed to load config: {e}");
    });

    // Repository creation and migration
    let repo: Arc<dyn NoteRepository> = match cfg.storage {
        StorageKind::Postgres => {
            let repo = PgNoteRepository::connect(&cfg.database_dsn, cfg.pool_size)
                .unwrap_or_else(|e| {
                    tracing::error!("Failed to set up database pool: {e}");
                    panic!("failed to set up database pool: {e}");
                });

            repo.migrate().await.unwrap_or_else(|e| {
                tracing::error!("Failed to migrate database: {e}");
                panic!("failed to migrate database: {e}");
            });

            Arc::new(repo)
        }
        StorageKind::Memory => {
            tracing::warn!("Using in-memory storage, notes will be lost on restart");
            Arc::new(MemoryNoteRepository::new())
        }
    };

    // Attachment store
    let blobs = BlobStore::new(&cfg.upload_dir);
    blobs.ensure_root().await.unwrap_or_else(|e| {
        tracing::error!("Failed to create upload directory: {e}");
        panic!("failed to create upload directory: {e}");
    });
    tracing::info!("Storing attachments in {}", blobs.root().display());

    // Service creation
    let service = Arc::new(NoteService::new(repo, blobs));

    // Router config
    let mut router = rest::router(service, &cfg.upload_dir, cfg.max_upload_bytes)
        .layer(TraceLayer::new_for_http());
    if cfg.cors_permissive {
        router = router.layer(CorsLayer::permissive());
    }

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind {}: {e}", cfg.listen_addr);
            panic!("failed to bind {}: {e}", cfg.listen_addr);
        });

    match listener.local_addr() {
        Ok(addr) => tracing::info!("Notes server starting, listening on {addr}"),
        Err(e) => tracing::warn!("Notes server starting, local address unknown: {e}"),
    }

    axum::serve(listener, router).await.unwrap_or_else(|e| {
        tracing::error!("HTTP server error: {e}");
        panic!("failed to run HTTP server: {e}");
    });
}

use std::sync::Arc;

use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::info;

use crate::library::{Collection, Library};
use crate::settings::{CollectionSettings, ReaderSettings};
use crate::status::StatusStore;

pub mod error;
pub mod pages;
pub mod routes;

pub use error::{ApiError, ServeError};

/// Per-collection handles shared by that collection's handlers.
#[derive(Clone)]
pub struct CollectionState {
    pub library: Arc<Library>,
    pub settings: Arc<CollectionSettings>,
    pub status: Option<Arc<StatusStore>>,
}

#[derive(Clone)]
pub struct AppState {
    pub manga: CollectionState,
    pub gallery: CollectionState,
    pub frontend: Arc<Value>,
}

impl AppState {
    /// Builds both libraries and opens the status file, if one is configured.
    pub fn from_settings(settings: &ReaderSettings) -> Self {
        let status = settings
            .status_file
            .as_ref()
            .map(|path| Arc::new(StatusStore::open(path.clone())));

        let build = |collection: Collection, collection_settings: &CollectionSettings| {
            CollectionState {
                library: Arc::new(Library::new(
                    collection,
                    collection_settings.root.clone(),
                    &settings.image_extensions,
                    &settings.cache,
                )),
                settings: Arc::new(collection_settings.clone()),
                status: status.clone(),
            }
        };

        Self {
            manga: build(Collection::Manga, &settings.manga),
            gallery: build(Collection::Gallery, &settings.gallery),
            frontend: Arc::new(settings.frontend.clone()),
        }
    }

    pub fn collection(&self, collection: Collection) -> CollectionState {
        match collection {
            Collection::Manga => self.manga.clone(),
            Collection::Gallery => self.gallery.clone(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let shell = routes::shell_router(Arc::clone(&state.frontend));
    Collection::ALL.into_iter().fold(shell, |app, collection| {
        app.merge(routes::collection_router(state.collection(collection)))
    })
}

pub async fn serve(settings: ReaderSettings) -> Result<(), ServeError> {
    let state = AppState::from_settings(&settings);
    info!(
        manga_root = %settings.manga.root.display(),
        gallery_root = %settings.gallery.root.display(),
        status_file = ?settings.status_file,
        "libraries ready"
    );

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServeError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!(address = %listener.local_addr()?, "reader listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("reader stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

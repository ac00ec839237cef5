//! HTTP API for search and triage.

pub mod handlers;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use mediasearch::config::Settings;
use mediasearch::ports::{Embedder, MediaDatabase};
use mediasearch::search::SearchService;
use mediasearch_pipeline::RetryManager;
use thiserror::Error;
use tracing::info;

pub use routes::create_router;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn MediaDatabase>,
    pub search: Arc<SearchService>,
    pub retry: Arc<RetryManager>,
}

impl AppState {
    pub fn new(
        db: Arc<dyn MediaDatabase>,
        embedder: Arc<dyn Embedder>,
        retry: Arc<RetryManager>,
        settings: &Settings,
    ) -> Self {
        let search = Arc::new(SearchService::new(
            Arc::clone(&db),
            embedder,
            settings.hybrid_keyword_weight,
            settings.hybrid_semantic_weight,
        ));
        Self { db, search, retry }
    }
}

/// Serve the API until the process is stopped.
pub async fn run_server(state: AppState, addr: SocketAddr) -> Result<(), ServerError> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(%addr, "search API listening");
    axum::serve(listener, router).await?;
    Ok(())
}

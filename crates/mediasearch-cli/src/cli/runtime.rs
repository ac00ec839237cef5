//! Component wiring for CLI commands.

use std::sync::Arc;

use anyhow::Context;
use mediasearch::config::{Backend, Settings};
use mediasearch::ports::{Embedder, JobQueue, MediaDatabase, ObjectStore, SpeechEngine};
use mediasearch::queue::LocalJobQueue;
use mediasearch::repository::SqliteRepository;
use mediasearch::search::SearchService;
use mediasearch::storage::LocalObjectStore;
use mediasearch_engines::{embedder_from_settings, speech_engine_from_settings};
use mediasearch_pipeline::{IngestController, Orchestrator, RetryManager, Worker};
use mediasearch_server::AppState;

/// Wired adapters and components for the selected backend.
pub struct Runtime {
    pub settings: Settings,
    pub db: Arc<dyn MediaDatabase>,
    pub store: Arc<dyn ObjectStore>,
    pub queue: Arc<dyn JobQueue>,
    pub engine: Arc<dyn SpeechEngine>,
    pub embedder: Arc<dyn Embedder>,
}

impl Runtime {
    pub fn initialize(settings: Settings) -> anyhow::Result<Self> {
        if settings.backend == Backend::Production {
            anyhow::bail!(
                "backend `production` requires external adapters (object store, \
                 queue broker, vector database) that are not configured in this build; \
                 use MEDIASEARCH_BACKEND=local"
            );
        }
        settings.ensure_directories()?;

        let db: Arc<dyn MediaDatabase> = Arc::new(
            SqliteRepository::open(settings.database_path())
                .context("failed to open the media database")?,
        );
        let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(
            settings.buckets_dir(),
            settings.poll_interval,
        ));
        let queue: Arc<dyn JobQueue> = Arc::new(LocalJobQueue::new());
        let engine = speech_engine_from_settings(&settings)?;
        let embedder = embedder_from_settings(&settings);

        Ok(Self {
            settings,
            db,
            store,
            queue,
            engine,
            embedder,
        })
    }

    pub fn ingest_controller(&self) -> IngestController {
        IngestController::new(
            Arc::clone(&self.db),
            Arc::clone(&self.store),
            Arc::clone(&self.queue),
            self.settings.clone(),
        )
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        Arc::new(Orchestrator::new(
            Arc::clone(&self.db),
            Arc::clone(&self.store),
            Arc::clone(&self.engine),
            Arc::clone(&self.embedder),
            self.settings.clone(),
        ))
    }

    pub fn retry_manager(&self) -> Arc<RetryManager> {
        Arc::new(RetryManager::new(
            Arc::clone(&self.db),
            Arc::clone(&self.queue),
            self.settings.clone(),
        ))
    }

    pub fn worker(&self) -> Worker {
        Worker::new(
            Arc::clone(&self.db),
            Arc::clone(&self.queue),
            self.orchestrator(),
            self.retry_manager(),
            self.settings.clone(),
        )
    }

    pub fn search_service(&self) -> SearchService {
        SearchService::new(
            Arc::clone(&self.db),
            Arc::clone(&self.embedder),
            self.settings.hybrid_keyword_weight,
            self.settings.hybrid_semantic_weight,
        )
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(
            Arc::clone(&self.db),
            Arc::clone(&self.embedder),
            self.retry_manager(),
            &self.settings,
        )
    }
}

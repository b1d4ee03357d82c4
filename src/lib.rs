pub mod auth;
pub mod collab;
pub mod config;
pub mod controller;
pub mod directory;
pub mod engine;
pub mod gitea;
pub mod metrics;
pub mod repo_ref;
pub mod resolver;
pub mod rest;
pub mod retry;
pub mod state;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use collab::CollabRegistry;
use config::DaemonConfig;
use directory::DirectoryApi;
use engine::{TeamSyncEngine, UserSync};
use gitea::GiteaApi;
use metrics::{SharedMetrics, SyncMetrics};
use retry::RetryQueue;
use state::{ControllerState, StateStore};

/// Shared application state passed to every route handler and background
/// loop. The clients sit behind their API traits so tests can swap in
/// in-memory doubles.
pub struct AppContext {
    pub config: DaemonConfig,
    pub directory: Arc<dyn DirectoryApi>,
    pub gitea: Arc<dyn GiteaApi>,
    pub teams: TeamSyncEngine,
    pub user_sync: UserSync,
    pub retry_queue: RetryQueue,
    pub collab: CollabRegistry,
    pub state_store: StateStore,
    pub metrics: SharedMetrics,
    /// Authoritative copy of the last fully successful reconcile pass; the
    /// metrics gauge mirrors it.
    pub last_reconcile: RwLock<Option<DateTime<Utc>>>,
    pub started_at: Instant,
}

impl AppContext {
    pub fn new(
        config: DaemonConfig,
        directory: Arc<dyn DirectoryApi>,
        gitea: Arc<dyn GiteaApi>,
    ) -> Self {
        let teams = TeamSyncEngine::new(gitea.clone());
        let user_sync = UserSync::new(
            directory.clone(),
            gitea.clone(),
            config.gitea.default_password.clone(),
            config.gitea.email_domain.clone(),
        );
        Self {
            teams,
            user_sync,
            retry_queue: RetryQueue::new(config.sync.retry_capacity),
            collab: CollabRegistry::new(),
            state_store: StateStore::new(&config.data_dir),
            metrics: Arc::new(SyncMetrics::new()),
            last_reconcile: RwLock::new(None),
            started_at: Instant::now(),
            config,
            directory,
            gitea,
        }
    }

    /// Snapshot the retry queue, the collab registry and the reconcile
    /// timestamp into the durable state file.
    pub async fn persist_state(&self) -> anyhow::Result<()> {
        let state = ControllerState {
            retry_items: self.retry_queue.snapshot().await,
            last_reconcile_success: *self.last_reconcile.read().await,
            collab_groups: self.collab.snapshot().await,
        };
        self.state_store.save(&state).await
    }

    /// Replay a persisted snapshot into the in-memory structures.
    pub async fn restore_state(&self, state: ControllerState) {
        self.retry_queue.restore(state.retry_items).await;
        self.collab.restore(state.collab_groups).await;
        *self.last_reconcile.write().await = state.last_reconcile_success;
        if let Some(at) = state.last_reconcile_success {
            self.metrics.set_last_reconcile_success(at);
        }
    }

    pub async fn record_reconcile_success(&self, at: DateTime<Utc>) {
        *self.last_reconcile.write().await = Some(at);
        self.metrics.set_last_reconcile_success(at);
    }
}

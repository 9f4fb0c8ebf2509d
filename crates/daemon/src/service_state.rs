use std::sync::Arc;

use common::prelude::{
    run_worker, JobDispatcher, Orchestrator, OrchestratorConfig, PinService, PinningBackend,
};

use crate::database::{Database, DatabaseSetupError};
use crate::ipfs::KuboClient;
use crate::service_config::Config;

/// Pin service over the SQLite store, ledger and agent directory
pub type Pins = PinService<Database, Database, Database>;

/// Main service state, shared by every request handler
#[derive(Clone, Debug)]
pub struct State {
    database: Database,
    backend: Arc<dyn PinningBackend>,
    pins: Pins,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        // 1. Setup database
        let database = match config.sqlite_path {
            Some(ref path) => {
                if !path.exists() {
                    return Err(StateSetupError::DatabasePathDoesNotExist);
                }
                tracing::info!(path = %path.display(), "Using SQLite database");
                Database::connect_path(path).await?
            }
            // otherwise just set up an in-memory database
            None => {
                tracing::info!("Using in-memory database");
                Database::memory().await?
            }
        };

        // 2. Setup the pinning backend
        let kubo = KuboClient::new(config.ipfs.clone())
            .map_err(|e| StateSetupError::Backend(e.to_string()))?;
        tracing::info!(api_url = %config.ipfs.api_url, "Using Kubo pinning backend");

        Ok(Self::new(database, Arc::new(kubo), config.orchestrator.clone()))
    }

    /// Wire the pin service around an open database and backend and
    ///  spawn the pin worker. The worker runs until every clone of the
    ///  returned state has been dropped.
    pub fn new(
        database: Database,
        backend: Arc<dyn PinningBackend>,
        orchestrator_config: OrchestratorConfig,
    ) -> Self {
        let (dispatcher, receiver) = JobDispatcher::new();
        let orchestrator = Orchestrator::new(
            database.clone(),
            database.clone(),
            backend.clone(),
            orchestrator_config,
        );
        tokio::spawn(run_worker(orchestrator, receiver));

        let pins = PinService::new(
            database.clone(),
            database.clone(),
            database.clone(),
            dispatcher,
        );

        Self {
            database,
            backend,
            pins,
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn backend(&self) -> &Arc<dyn PinningBackend> {
        &self.backend
    }

    pub fn pins(&self) -> &Pins {
        &self.pins
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("Database path does not exist")]
    DatabasePathDoesNotExist,
    #[error("Database setup error")]
    DatabaseSetupError(#[from] DatabaseSetupError),
    #[error("Pinning backend setup error: {0}")]
    Backend(String),
}

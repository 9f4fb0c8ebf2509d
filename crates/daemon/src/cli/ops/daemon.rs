use clap::Args;

use pinsvc_daemon::service_config::ConfigError;
use pinsvc_daemon::state::{AppState, StateError};
use pinsvc_daemon::{spawn_service, ServiceConfig};

#[derive(Args, Debug, Clone)]
pub struct Daemon {
    /// Override API server port (default from config)
    #[arg(long)]
    pub api_port: Option<u16>,

    /// Override the Kubo RPC endpoint (default from config)
    #[arg(long)]
    pub ipfs_api_url: Option<String>,

    /// Directory for log files (logs to stdout only if not set)
    #[arg(long)]
    pub log_dir: Option<std::path::PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("state error: {0}")]
    StateError(#[from] StateError),

    #[error("config error: {0}")]
    ConfigError(#[from] ConfigError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Daemon {
    type Error = DaemonError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;

        // flags win over config.toml
        let mut app_config = state.config.clone();
        if let Some(api_port) = self.api_port {
            app_config.api_port = api_port;
        }
        if let Some(ipfs_api_url) = &self.ipfs_api_url {
            app_config.ipfs_api_url = ipfs_api_url.clone();
        }
        if let Some(log_dir) = &self.log_dir {
            app_config.log_dir = Some(log_dir.clone());
        }

        let config = ServiceConfig::from_app_config(&app_config, Some(state.db_path))?;

        spawn_service(&config).await;
        Ok("daemon ended".to_string())
    }
}

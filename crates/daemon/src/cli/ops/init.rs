use clap::Args;

use pinsvc_daemon::state::{AppConfig, AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// API server port
    #[arg(long)]
    pub api_port: Option<u16>,

    /// Kubo RPC endpoint (default: http://127.0.0.1:5001)
    #[arg(long)]
    pub ipfs_api_url: Option<String>,

    /// Quota for principals registered without an explicit one, in bytes
    #[arg(long)]
    pub default_quota_bytes: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let defaults = AppConfig::default();
        let config = AppConfig {
            api_port: self.api_port.unwrap_or(defaults.api_port),
            ipfs_api_url: self
                .ipfs_api_url
                .clone()
                .unwrap_or(defaults.ipfs_api_url.clone()),
            default_quota_bytes: self
                .default_quota_bytes
                .unwrap_or(defaults.default_quota_bytes),
            ..defaults
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        Ok(format!(
            "Initialized pinsvc directory at: {}\n\
             - Database: {}\n\
             - Config: {}\n\
             - API port: {}\n\
             - IPFS API: {}",
            state.pinsvc_dir.display(),
            state.db_path.display(),
            state.config_path.display(),
            state.config.api_port,
            state.config.ipfs_api_url,
        ))
    }
}

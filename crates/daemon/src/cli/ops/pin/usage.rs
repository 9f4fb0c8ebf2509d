use clap::Args;

use pinsvc_daemon::http_server::api::client::ApiError;
use pinsvc_daemon::http_server::api::v0::storage::StorageRequest;

#[derive(Args, Debug, Clone)]
pub struct Usage {
    /// Show the usage of this agent instead of your own
    #[arg(long)]
    pub agent: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PinUsageError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Usage {
    type Error = PinUsageError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let usage = ctx
            .client
            .call(StorageRequest {
                agent_id: self.agent.clone(),
            })
            .await?;
        Ok(format!(
            "{} / {} bytes ({:.2}%)",
            usage.used, usage.quota, usage.percentage
        ))
    }
}

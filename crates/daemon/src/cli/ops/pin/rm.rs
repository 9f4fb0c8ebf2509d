use clap::Args;
use uuid::Uuid;

use pinsvc_daemon::http_server::api::client::ApiError;
use pinsvc_daemon::http_server::api::v0::pins::delete::DeletePinRequest;

#[derive(Args, Debug, Clone)]
pub struct Rm {
    /// Request id of the pin to remove
    pub requestid: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum PinRmError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Rm {
    type Error = PinRmError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        ctx.client
            .call(DeletePinRequest {
                requestid: self.requestid,
            })
            .await?;
        Ok(format!("removal of {} accepted", self.requestid))
    }
}

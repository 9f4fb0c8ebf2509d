use clap::Args;
use uuid::Uuid;

use pinsvc_daemon::http_server::api::client::ApiError;
use pinsvc_daemon::http_server::api::v0::pins::get::GetPinRequest;

use super::format::pin_details;

#[derive(Args, Debug, Clone)]
pub struct Status {
    /// Request id returned when the pin was created
    pub requestid: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum PinStatusError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Status {
    type Error = PinStatusError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let response = ctx
            .client
            .call(GetPinRequest {
                requestid: self.requestid,
            })
            .await?;
        Ok(pin_details(&response))
    }
}

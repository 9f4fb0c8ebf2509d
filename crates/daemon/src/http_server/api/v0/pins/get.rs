use axum::extract::{Json, Path, State};
use axum::response::IntoResponse;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::pins::PinStatusResponse;

use super::parse_request_id;
use crate::http_server::api::client::{endpoint, ApiRequest};
use crate::http_server::auth::Caller;
use crate::http_server::error::ServiceError;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPinRequest {
    pub requestid: Uuid,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Caller(caller): Caller,
    Path(requestid): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_request_id(&requestid)?;
    let pin = state.pins().get(&caller, id).await?;
    Ok(Json(PinStatusResponse::from(pin)))
}

impl ApiRequest for GetPinRequest {
    type Response = PinStatusResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client.get(endpoint(
            base_url,
            &format!("/api/v0/pins/{}", self.requestid),
        ))
    }
}

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::parse_request_id;
use crate::http_server::api::client::{endpoint, ApiRequest};
use crate::http_server::auth::Caller;
use crate::http_server::error::ServiceError;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletePinRequest {
    pub requestid: Uuid,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Caller(caller): Caller,
    Path(requestid): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_request_id(&requestid)?;
    state.pins().delete(&caller, id).await?;
    Ok(StatusCode::ACCEPTED)
}

impl ApiRequest for DeletePinRequest {
    type Response = ();

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client.delete(endpoint(
            base_url,
            &format!("/api/v0/pins/{}", self.requestid),
        ))
    }
}

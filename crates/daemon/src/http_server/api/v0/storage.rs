use axum::extract::{Json, State};
use axum::response::IntoResponse;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::prelude::Usage;

use crate::http_server::api::client::{endpoint, ApiRequest};
use crate::http_server::auth::Caller;
use crate::http_server::error::ServiceError;
use crate::ServiceState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageResponse {
    pub used: u64,
    pub quota: u64,
    pub percentage: f64,
}

impl From<Usage> for StorageResponse {
    fn from(usage: Usage) -> Self {
        Self {
            used: usage.used_bytes,
            quota: usage.quota_bytes,
            percentage: usage.percentage(),
        }
    }
}

/// Storage usage of the caller, or of `agent_id` when set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageRequest {
    pub agent_id: Option<String>,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Caller(caller): Caller,
) -> Result<impl IntoResponse, ServiceError> {
    let usage = state.pins().storage_usage(&caller).await?;
    Ok(Json(StorageResponse::from(usage)))
}

impl ApiRequest for StorageRequest {
    type Response = StorageResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let path = match self.agent_id {
            Some(agent_id) => format!("/api/v0/agents/{}/storage", agent_id),
            None => "/api/v0/storage".to_string(),
        };
        client.get(endpoint(base_url, &path))
    }
}

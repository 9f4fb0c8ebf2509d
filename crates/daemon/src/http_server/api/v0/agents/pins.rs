use axum::extract::rejection::QueryRejection;
use axum::extract::{Json, Path, Query, State};
use axum::response::IntoResponse;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::pins::PinResults;
use common::prelude::PinListQuery;

use crate::http_server::api::client::{endpoint, ApiRequest};
use crate::http_server::api::v0::pins::list::{list_options, results};
use crate::http_server::auth::Caller;
use crate::http_server::error::ServiceError;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListAgentPinsRequest {
    pub agent_id: String,
    #[serde(flatten)]
    pub query: PinListQuery,
}

/// An agent's pins, visible to the agent, its siblings and its claiming human
pub async fn handler(
    State(state): State<ServiceState>,
    Caller(caller): Caller,
    Path(agent_id): Path<String>,
    query: Result<Query<PinListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let options = list_options(query)?;
    let (pins, count) = state
        .pins()
        .list_for_agent(&caller, &agent_id, &options)
        .await?;
    Ok(Json(results(pins, count)))
}

impl ApiRequest for ListAgentPinsRequest {
    type Response = PinResults;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client
            .get(endpoint(
                base_url,
                &format!("/api/v0/agents/{}/pins", self.agent_id),
            ))
            .query(&self.query)
    }
}

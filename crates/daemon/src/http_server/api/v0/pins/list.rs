use axum::extract::rejection::QueryRejection;
use axum::extract::{Json, Query, State};
use axum::response::IntoResponse;
use reqwest::{Client, RequestBuilder, Url};

use common::pins::{PinResults, PinStatusResponse};
use common::prelude::{Pin, PinListOptions, PinListQuery};

use crate::http_server::api::client::{endpoint, ApiRequest};
use crate::http_server::auth::Caller;
use crate::http_server::error::ServiceError;
use crate::ServiceState;

/// Validate raw listing parameters
pub(crate) fn list_options(
    query: Result<Query<PinListQuery>, QueryRejection>,
) -> Result<PinListOptions, ServiceError> {
    let Query(query) = query.map_err(|e| ServiceError::validation(e.body_text()))?;
    PinListOptions::try_from(query).map_err(|e| ServiceError(e.into()))
}

pub(crate) fn results(pins: Vec<Pin>, count: u64) -> PinResults {
    PinResults {
        count,
        results: pins.iter().map(PinStatusResponse::from).collect(),
    }
}

pub async fn handler(
    State(state): State<ServiceState>,
    Caller(caller): Caller,
    query: Result<Query<PinListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let options = list_options(query)?;
    let (pins, count) = state.pins().list(&caller, &options).await?;
    Ok(Json(results(pins, count)))
}

impl ApiRequest for PinListQuery {
    type Response = PinResults;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client.get(endpoint(base_url, "/api/v0/pins")).query(&self)
    }
}

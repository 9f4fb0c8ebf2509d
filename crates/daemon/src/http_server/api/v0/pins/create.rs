use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use reqwest::{Client, RequestBuilder, Url};

use common::pins::PinStatusResponse;
use common::prelude::CreatePin;

use crate::http_server::api::client::{endpoint, ApiRequest};
use crate::http_server::auth::Caller;
use crate::http_server::error::ServiceError;
use crate::ServiceState;

pub async fn handler(
    State(state): State<ServiceState>,
    Caller(caller): Caller,
    body: Result<Json<CreatePin>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(request) = body.map_err(|e| {
        ServiceError::validation(format!("invalid request body: {}", e.body_text()))
    })?;

    let pin = state.pins().create(&caller, request).await?;
    Ok((StatusCode::ACCEPTED, Json(PinStatusResponse::from(pin))))
}

// Client implementation - builds request for this operation
impl ApiRequest for CreatePin {
    type Response = PinStatusResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client.post(endpoint(base_url, "/api/v0/pins")).json(&self)
    }
}

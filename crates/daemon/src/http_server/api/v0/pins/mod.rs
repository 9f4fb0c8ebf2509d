use axum::routing::{get, post};
use axum::Router;
use uuid::Uuid;

use common::prelude::PinServiceError;

pub mod create;
pub mod delete;
pub mod get;
pub mod list;

use crate::http_server::error::ServiceError;
use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/", post(create::handler).get(list::handler))
        .route("/:requestid", get(get::handler).delete(delete::handler))
        .with_state(state)
}

/// A request id that is not a UUID can't name any pin
pub(crate) fn parse_request_id(raw: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw)
        .map_err(|_| ServiceError(PinServiceError::NotFound("pin not found".into())))
}

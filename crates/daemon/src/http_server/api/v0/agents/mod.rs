use axum::routing::get;
use axum::Router;

pub mod pins;
pub mod storage;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/:agent_id/pins", get(pins::handler))
        .route("/:agent_id/storage", get(storage::handler))
        .with_state(state)
}

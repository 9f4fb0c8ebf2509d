use axum::routing::get;
use axum::Router;

pub mod agents;
pub mod pins;
pub mod storage;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .nest("/pins", pins::router(state.clone()))
        .nest("/agents", agents::router(state.clone()))
        .route("/storage", get(storage::handler))
        .with_state(state)
}

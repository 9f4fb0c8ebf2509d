use axum::extract::{Json, Path, State};
use axum::response::IntoResponse;

use crate::http_server::api::v0::storage::StorageResponse;
use crate::http_server::auth::Caller;
use crate::http_server::error::ServiceError;
use crate::ServiceState;

/// An agent's storage usage, visible to the agent and its claiming human
pub async fn handler(
    State(state): State<ServiceState>,
    Caller(caller): Caller,
    Path(agent_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let usage = state
        .pins()
        .agent_storage_usage(&caller, &agent_id)
        .await?;
    Ok(Json(StorageResponse::from(usage)))
}

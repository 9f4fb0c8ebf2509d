use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio::time::timeout;

use crate::ServiceState;

const IPFS_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Reachability of the IPFS node behind the pinning backend
pub async fn handler(State(state): State<ServiceState>) -> Response {
    match timeout(IPFS_CHECK_TIMEOUT, state.backend().node_info()).await {
        Ok(Ok(info)) => {
            let msg = serde_json::json!({
                "status": "ok",
                "peer_id": info.peer_id,
                "agent_version": info.agent_version,
            });
            (StatusCode::OK, Json(msg)).into_response()
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "ipfs node check failed");
            let msg = serde_json::json!({"status": "failure", "message": "ipfs node unreachable"});
            (StatusCode::SERVICE_UNAVAILABLE, Json(msg)).into_response()
        }
        Err(_) => {
            let msg = serde_json::json!({"status": "failure", "message": "ipfs check timed out"});
            (StatusCode::SERVICE_UNAVAILABLE, Json(msg)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common::prelude::OrchestratorConfig;
    use common::testkit::RecordingBackend;

    use super::*;
    use crate::database::Database;

    async fn state_with(backend: RecordingBackend) -> ServiceState {
        let db = Database::memory().await.unwrap();
        ServiceState::new(db, Arc::new(backend), OrchestratorConfig::default())
    }

    #[tokio::test]
    async fn test_node_online() {
        let response = handler(State(state_with(RecordingBackend::new()).await)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_node_offline() {
        let state = state_with(RecordingBackend::new().offline()).await;
        let response = handler(State(state)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

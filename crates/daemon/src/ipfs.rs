//! Kubo RPC client backing the pin orchestrator.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use common::backend::{BackendError, NodeInfo, PinningBackend};

pub const DEFAULT_IPFS_API_URL: &str = "http://127.0.0.1:5001";
pub const DEFAULT_IPFS_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_IPFS_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct KuboConfig {
    pub api_url: Url,
    /// Per-request timeout for everything except `pin/add`, which is
    ///  bounded by the orchestrator's pin timeout instead
    pub timeout: Duration,
    pub max_retries: u32,
    /// Delay before retry `n` is `n * retry_backoff`
    pub retry_backoff: Duration,
}

impl KuboConfig {
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            timeout: DEFAULT_IPFS_TIMEOUT,
            max_retries: DEFAULT_IPFS_MAX_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KuboClient {
    client: Client,
    config: KuboConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ObjectStatResponse {
    cumulative_size: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IdResponse {
    #[serde(rename = "ID")]
    id: String,
    #[serde(default)]
    agent_version: String,
    #[serde(default)]
    protocol_version: String,
}

fn request_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Request(err.to_string())
    }
}

impl KuboClient {
    pub fn new(config: KuboConfig) -> Result<Self, BackendError> {
        let client = Client::builder().build().map_err(request_error)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &KuboConfig {
        &self.config
    }

    fn endpoint(&self, command: &str) -> String {
        format!(
            "{}/api/v0/{}",
            self.config.api_url.as_str().trim_end_matches('/'),
            command
        )
    }

    async fn post_once(
        &self,
        command: &str,
        args: &[(&str, &str)],
        timeout: Option<Duration>,
    ) -> Result<String, BackendError> {
        let mut request = self.client.post(self.endpoint(command)).query(args);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(request_error)?;
        let status = response.status();
        let body = response.text().await.map_err(request_error)?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    /// POST an RPC command, retrying transport failures and 5xx
    ///  responses with a linear backoff.
    async fn post(
        &self,
        command: &str,
        args: &[(&str, &str)],
        timeout: Option<Duration>,
    ) -> Result<String, BackendError> {
        let mut attempt = 0;
        loop {
            match self.post_once(command, args, timeout).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(command, attempt, error = %e, "retrying ipfs request");
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        command: &str,
        args: &[(&str, &str)],
    ) -> Result<T, BackendError> {
        let body = self.post(command, args, Some(self.config.timeout)).await?;
        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

fn require_cid(cid: &str) -> Result<&str, BackendError> {
    let cid = cid.trim();
    if cid.is_empty() {
        return Err(BackendError::EmptyCid);
    }
    Ok(cid)
}

#[async_trait]
impl PinningBackend for KuboClient {
    async fn pin(&self, cid: &str) -> Result<(), BackendError> {
        let cid = require_cid(cid)?;
        self.post(
            "pin/add",
            &[("arg", cid), ("recursive", "true"), ("progress", "false")],
            None,
        )
        .await?;
        Ok(())
    }

    async fn unpin(&self, cid: &str) -> Result<(), BackendError> {
        let cid = require_cid(cid)?;
        self.post("pin/rm", &[("arg", cid)], Some(self.config.timeout))
            .await?;
        Ok(())
    }

    async fn object_stat(&self, cid: &str) -> Result<u64, BackendError> {
        let cid = require_cid(cid)?;
        let stat: ObjectStatResponse = self.post_json("object/stat", &[("arg", cid)]).await?;
        Ok(stat.cumulative_size)
    }

    async fn node_info(&self) -> Result<NodeInfo, BackendError> {
        let id: IdResponse = self.post_json("id", &[]).await?;
        Ok(NodeInfo {
            peer_id: id.id,
            agent_version: id.agent_version,
            protocol_version: id.protocol_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};

    use super::*;

    const CID: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";

    #[derive(Clone, Default)]
    struct MockKubo {
        pin_calls: Arc<AtomicUsize>,
        /// Number of leading pin/add calls answered with a 500
        pin_failures: usize,
    }

    async fn pin_add(
        State(mock): State<MockKubo>,
        Query(args): Query<HashMap<String, String>>,
    ) -> axum::response::Response {
        let call = mock.pin_calls.fetch_add(1, Ordering::SeqCst);
        if call < mock.pin_failures {
            return (StatusCode::INTERNAL_SERVER_ERROR, "busy").into_response();
        }
        match args.get("arg") {
            Some(cid) if cid.starts_with("baf") => {
                Json(serde_json::json!({ "Pins": [cid] })).into_response()
            }
            _ => (StatusCode::BAD_REQUEST, "invalid path").into_response(),
        }
    }

    async fn object_stat() -> impl IntoResponse {
        Json(serde_json::json!({ "Hash": CID, "CumulativeSize": 1024 }))
    }

    async fn id() -> impl IntoResponse {
        Json(serde_json::json!({
            "ID": "12D3KooWTest",
            "AgentVersion": "kubo/0.29.0",
            "ProtocolVersion": "ipfs/0.1.0"
        }))
    }

    async fn spawn_mock(mock: MockKubo) -> KuboClient {
        let router = Router::new()
            .route("/api/v0/pin/add", post(pin_add))
            .route("/api/v0/pin/rm", post(|| async { "{}" }))
            .route("/api/v0/object/stat", post(object_stat))
            .route("/api/v0/id", post(id))
            .with_state(mock);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let mut config = KuboConfig::new(Url::parse(&format!("http://{}", addr)).unwrap());
        config.retry_backoff = Duration::from_millis(1);
        KuboClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_pin_stat_and_id() {
        let client = spawn_mock(MockKubo::default()).await;

        client.pin(CID).await.unwrap();
        client.unpin(CID).await.unwrap();
        assert_eq!(client.object_stat(CID).await.unwrap(), 1024);

        let info = client.node_info().await.unwrap();
        assert_eq!(info.peer_id, "12D3KooWTest");
        assert_eq!(info.agent_version, "kubo/0.29.0");
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let mock = MockKubo {
            pin_failures: 2,
            ..Default::default()
        };
        let calls = mock.pin_calls.clone();
        let client = spawn_mock(mock).await;

        client.pin(CID).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let mock = MockKubo {
            pin_failures: usize::MAX,
            ..Default::default()
        };
        let calls = mock.pin_calls.clone();
        let client = spawn_mock(mock).await;

        let err = client.pin(CID).await.unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 500, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), DEFAULT_IPFS_MAX_RETRIES as usize + 1);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mock = MockKubo::default();
        let calls = mock.pin_calls.clone();
        let client = spawn_mock(mock).await;

        let err = client.pin("QmNotAccepted").await.unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 400, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_cid_is_rejected_locally() {
        let mock = MockKubo::default();
        let calls = mock.pin_calls.clone();
        let client = spawn_mock(mock).await;

        assert_eq!(client.pin("  ").await.unwrap_err(), BackendError::EmptyCid);
        assert_eq!(client.object_stat("").await.unwrap_err(), BackendError::EmptyCid);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unreachable_node() {
        let mut config = KuboConfig::new(Url::parse("http://127.0.0.1:1").unwrap());
        config.max_retries = 1;
        config.retry_backoff = Duration::from_millis(1);
        let client = KuboClient::new(config).unwrap();

        let err = client.node_info().await.unwrap_err();
        assert!(err.is_retryable());
    }
}

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("cid is required")]
    EmptyCid,
    #[error("request to pinning backend failed: {0}")]
    Request(String),
    #[error("pinning backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode pinning backend response: {0}")]
    Decode(String),
    #[error("pinning backend timed out")]
    Timeout,
}

impl BackendError {
    /// Client errors are the caller's fault and are never retried
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Status { status, .. } => !(400..500).contains(status),
            BackendError::EmptyCid | BackendError::Decode(_) => false,
            BackendError::Request(_) | BackendError::Timeout => true,
        }
    }
}

/// Identity of the node behind the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub peer_id: String,
    pub agent_version: String,
    pub protocol_version: String,
}

/// The node that actually retains content.
#[async_trait]
pub trait PinningBackend: Send + Sync + Debug + 'static {
    /// Recursively pin `cid`, fetching it from the network if needed
    async fn pin(&self, cid: &str) -> Result<(), BackendError>;

    async fn unpin(&self, cid: &str) -> Result<(), BackendError>;

    /// Cumulative size of the DAG rooted at `cid`, in bytes
    async fn object_stat(&self, cid: &str) -> Result<u64, BackendError>;

    async fn node_info(&self) -> Result<NodeInfo, BackendError>;
}

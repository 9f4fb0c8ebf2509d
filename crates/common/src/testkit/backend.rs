use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{BackendError, NodeInfo, PinningBackend};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Pin(String),
    Unpin(String),
    ObjectStat(String),
    NodeInfo,
}

/// A pinning backend double that records calls and answers from
///  canned sizes and failure switches.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    inner: Arc<Mutex<RecordingBackendInner>>,
}

#[derive(Debug, Default)]
struct RecordingBackendInner {
    calls: Vec<BackendCall>,
    sizes: HashMap<String, u64>,
    default_size: u64,
    fail_pins: bool,
    fail_stats: bool,
    offline: bool,
    pin_delay: Option<Duration>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn with(self, f: impl FnOnce(&mut RecordingBackendInner)) -> Self {
        f(&mut self.lock());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecordingBackendInner> {
        // a panicking test thread shouldn't cascade into every other assertion
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Report `size` for `cid` from `object_stat`
    pub fn with_size(self, cid: &str, size: u64) -> Self {
        let cid = cid.to_string();
        self.with(|i| {
            i.sizes.insert(cid, size);
        })
    }

    /// Size reported for CIDs without a canned size
    pub fn with_default_size(self, size: u64) -> Self {
        self.with(|i| i.default_size = size)
    }

    /// Every `pin` call fails
    pub fn failing_pins(self) -> Self {
        self.with(|i| i.fail_pins = true)
    }

    /// Every `object_stat` call fails
    pub fn failing_stats(self) -> Self {
        self.with(|i| i.fail_stats = true)
    }

    /// `node_info` fails as if the node were unreachable
    pub fn offline(self) -> Self {
        self.with(|i| i.offline = true)
    }

    /// `pin` sleeps this long before answering
    pub fn with_pin_delay(self, delay: Duration) -> Self {
        self.with(|i| i.pin_delay = Some(delay))
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    pub fn pinned(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::Pin(cid) => Some(cid),
                _ => None,
            })
            .collect()
    }

    pub fn unpinned(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::Unpin(cid) => Some(cid),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: BackendCall) {
        self.lock().calls.push(call);
    }
}

#[async_trait]
impl PinningBackend for RecordingBackend {
    async fn pin(&self, cid: &str) -> Result<(), BackendError> {
        self.record(BackendCall::Pin(cid.to_string()));
        let (delay, fail) = {
            let inner = self.lock();
            (inner.pin_delay, inner.fail_pins)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(BackendError::Status {
                status: 500,
                body: "pin failed".to_string(),
            });
        }
        Ok(())
    }

    async fn unpin(&self, cid: &str) -> Result<(), BackendError> {
        self.record(BackendCall::Unpin(cid.to_string()));
        Ok(())
    }

    async fn object_stat(&self, cid: &str) -> Result<u64, BackendError> {
        self.record(BackendCall::ObjectStat(cid.to_string()));
        let inner = self.lock();
        if inner.fail_stats {
            return Err(BackendError::Request("stat failed".to_string()));
        }
        Ok(inner.sizes.get(cid).copied().unwrap_or(inner.default_size))
    }

    async fn node_info(&self) -> Result<NodeInfo, BackendError> {
        self.record(BackendCall::NodeInfo);
        if self.lock().offline {
            return Err(BackendError::Request("connection refused".to_string()));
        }
        Ok(NodeInfo {
            peer_id: "12D3KooWRecordingBackend".to_string(),
            agent_version: "kubo/0.0.0-test".to_string(),
            protocol_version: "ipfs/0.1.0".to_string(),
        })
    }
}

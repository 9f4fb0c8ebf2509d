/// Lightweight harness for exercising pin flows in-process
///
/// Provides a backend double that records every call it receives,
/// valid CID fixtures and a helper to wait for the background worker
/// to move a pin into a given status.
///
/// # Example
///
/// ```rust,ignore
/// use common::testkit::{RecordingBackend, V1_CID};
///
/// #[tokio::test]
/// async fn test_pin_flow() -> anyhow::Result<()> {
///     let backend = RecordingBackend::new().with_size(V1_CID, 1024);
///     // ... wire the backend into an orchestrator and create a pin
///     assert_eq!(backend.pinned(), vec![V1_CID.to_string()]);
///     Ok(())
/// }
/// ```
mod backend;
mod fixtures;

pub use backend::{BackendCall, RecordingBackend};
pub use fixtures::{new_pin, numbered_cid, wait_for, wait_for_status, V0_CID, V1_CID};

/**
 * Principals, ownership and the relationship
 *  predicate behind every cross-owner read.
 */
pub mod access;
/**
 * The node that actually retains content,
 *  abstracted so the service can run against
 *  Kubo in production and a double in tests.
 */
pub mod backend;
pub mod cid;
/**
 * Pin model, persistence contract, background
 *  orchestration and the request-path service.
 */
pub mod pins;
pub mod quota;
/**
 * In-process test harness: a recording backend,
 *  CID fixtures and polling helpers.
 */
pub mod testkit;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::access::{AgentDirectory, Owner, OwnerKind, Principal};
    pub use crate::backend::{BackendError, NodeInfo, PinningBackend};
    pub use crate::cid::{classify_cid, is_valid_cid, CidVersion};
    pub use crate::pins::orchestrator::{
        run_worker, JobDispatcher, JobReceiver, Orchestrator, OrchestratorConfig, PinJob,
    };
    pub use crate::pins::service::{CreatePin, PinService, PinServiceError};
    pub use crate::pins::{Pin, PinListOptions, PinListQuery, PinStatus, PinStore, PinStoreError};
    pub use crate::quota::{QuotaError, QuotaLedger, Usage};
    pub use crate::version::build_info;
}

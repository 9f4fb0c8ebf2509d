//! Shared setup for pin lifecycle tests

use std::sync::Arc;

use common::pins::memory::{MemoryAgentDirectory, MemoryPinStore, MemoryQuotaLedger};
use common::prelude::{
    run_worker, JobDispatcher, Orchestrator, OrchestratorConfig, PinService, Principal, Usage,
};
use common::testkit::RecordingBackend;

pub type Service = PinService<MemoryPinStore, MemoryQuotaLedger, MemoryAgentDirectory>;

pub struct TestEnv {
    pub service: Service,
    pub store: MemoryPinStore,
    pub ledger: MemoryQuotaLedger,
    pub backend: RecordingBackend,
    pub human: Principal,
    pub agent: Principal,
    pub sibling: Principal,
}

/// A pin service wired to in-memory providers and a running worker.
///  Every principal starts with `quota_bytes` and nothing used.
pub fn setup_test_env(backend: RecordingBackend, quota_bytes: u64) -> TestEnv {
    let store = MemoryPinStore::new();
    let ledger = MemoryQuotaLedger::new();
    let directory = MemoryAgentDirectory::new();

    let human = Principal::human("h1");
    let agent = Principal::agent("a1", Some("h1".into()));
    let sibling = Principal::agent("a2", Some("h1".into()));
    for principal in [&human, &agent, &sibling] {
        directory.insert(principal.clone()).unwrap();
        ledger
            .set_usage(&principal.owner(), Usage::new(0, quota_bytes))
            .unwrap();
    }

    let (dispatcher, receiver) = JobDispatcher::new();
    let orchestrator = Orchestrator::new(
        store.clone(),
        ledger.clone(),
        Arc::new(backend.clone()),
        OrchestratorConfig::default(),
    );
    tokio::spawn(run_worker(orchestrator, receiver));

    TestEnv {
        service: PinService::new(store.clone(), ledger.clone(), directory, dispatcher),
        store,
        ledger,
        backend,
        human,
        agent,
        sibling,
    }
}

//! Synchronous request logic for the pinning API: validation, quota
//!  admission, ownership checks and handing accepted work to the
//!  orchestrator.

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::orchestrator::JobDispatcher;
use super::store::{PinStore, PinStoreError};
use super::{auto_name, validate_meta, NewPin, Pin, PinListOptions};
use crate::access::{relationship, Access, AgentDirectory, Owner, OwnerKind, Principal};
use crate::cid::is_valid_cid;
use crate::quota::{self, Admission, QuotaError, QuotaLedger, Usage};

pub const INVALID_CID_MESSAGE: &str =
    "invalid CID format: must be a valid CIDv0 (Qm...) or CIDv1 (bafy...)";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PinServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("pin already exists for this CID and owner")]
    DuplicatePin,
    #[error("storage quota exceeded")]
    QuotaExceeded,
    /// Detail is for logs only; never shown to clients
    #[error("internal error during {0}")]
    Internal(String),
}

impl From<super::ValidationError> for PinServiceError {
    fn from(err: super::ValidationError) -> Self {
        PinServiceError::Validation(err.0)
    }
}

fn internal(operation: &str, err: impl Display) -> PinServiceError {
    tracing::error!(operation, error = %err, "pin service dependency failed");
    PinServiceError::Internal(operation.to_string())
}

/// Body of a pin creation request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePin {
    #[serde(default)]
    pub cid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub origins: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct PinService<S, Q, D> {
    store: S,
    ledger: Q,
    directory: D,
    dispatcher: JobDispatcher,
}

impl<S, Q, D> PinService<S, Q, D>
where
    S: PinStore,
    Q: QuotaLedger,
    D: AgentDirectory,
{
    pub fn new(store: S, ledger: Q, directory: D, dispatcher: JobDispatcher) -> Self {
        Self {
            store,
            ledger,
            directory,
            dispatcher,
        }
    }

    /// Accept a pin request. The returned pin is `queued`; the actual
    ///  pinning happens in the background.
    #[tracing::instrument(skip(self, caller, request), fields(caller_id = %caller.id, cid = %request.cid))]
    pub async fn create(
        &self,
        caller: &Principal,
        request: CreatePin,
    ) -> Result<Pin, PinServiceError> {
        let cid = request.cid.as_str();
        if cid.trim().is_empty() {
            return Err(PinServiceError::Validation("cid is required".into()));
        }
        if !is_valid_cid(cid) {
            return Err(PinServiceError::Validation(INVALID_CID_MESSAGE.into()));
        }
        validate_meta(&request.meta)?;

        let owner = caller.owner();
        let usage = self.ledger.usage(&owner).await;
        if let Err(e) = &usage {
            tracing::warn!(error = %e, "quota check failed, admitting pin unchecked");
        }
        if let Admission::Deny(usage) = quota::admit(usage) {
            tracing::info!(
                used_bytes = usage.used_bytes,
                quota_bytes = usage.quota_bytes,
                "pin rejected, quota exhausted"
            );
            return Err(PinServiceError::QuotaExceeded);
        }

        let name = request
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| auto_name(cid, OffsetDateTime::now_utc()));

        let pin = self
            .store
            .create(NewPin {
                cid: cid.to_string(),
                name,
                origins: request.origins,
                meta: request.meta,
                owner,
            })
            .await
            .map_err(|e| match e {
                PinStoreError::DuplicatePin => PinServiceError::DuplicatePin,
                e => internal("create pin", e),
            })?;

        if let Err(e) = self
            .dispatcher
            .dispatch_pin(pin.id, pin.cid.clone(), pin.owner.clone())
        {
            // the record stays queued and is resumed on the next worker start
            tracing::error!(pin_id = %pin.id, error = %e, "failed to dispatch pin job");
        }

        tracing::info!(pin_id = %pin.id, "pin accepted");
        Ok(pin)
    }

    pub async fn get(&self, caller: &Principal, id: Uuid) -> Result<Pin, PinServiceError> {
        let pin = self.fetch(id).await?;
        if !caller.owns(&pin.owner) {
            return Err(PinServiceError::Forbidden(
                "you can only view your own pins".into(),
            ));
        }
        Ok(pin)
    }

    /// List the caller's own pins
    pub async fn list(
        &self,
        caller: &Principal,
        options: &PinListOptions,
    ) -> Result<(Vec<Pin>, u64), PinServiceError> {
        self.list_owned(&caller.owner(), options).await
    }

    /// List an agent's pins, on behalf of the agent itself, a sibling
    ///  agent or the agent's claiming human
    pub async fn list_for_agent(
        &self,
        caller: &Principal,
        agent_id: &str,
        options: &PinListOptions,
    ) -> Result<(Vec<Pin>, u64), PinServiceError> {
        self.authorize_agent(caller, agent_id, Access::PinListing)
            .await?;
        self.list_owned(&Owner::agent(agent_id), options).await
    }

    #[tracing::instrument(skip(self, caller), fields(caller_id = %caller.id))]
    pub async fn delete(&self, caller: &Principal, id: Uuid) -> Result<(), PinServiceError> {
        let pin = self.fetch(id).await?;
        if !caller.owns(&pin.owner) {
            return Err(PinServiceError::Forbidden(
                "you can only delete your own pins".into(),
            ));
        }

        self.store.delete(id).await.map_err(|e| match e {
            PinStoreError::NotFound => PinServiceError::NotFound("pin not found".into()),
            e => internal("delete pin", e),
        })?;

        if let Some(size_bytes) = pin.size_bytes.filter(|s| *s > 0) {
            let delta = -i64::try_from(size_bytes).unwrap_or(i64::MAX);
            if let Err(e) = self.ledger.adjust_usage(&pin.owner, delta).await {
                tracing::error!(error = %e, size_bytes, "failed to release pinned size from quota");
            }
        }

        if let Err(e) = self.dispatcher.dispatch_unpin(pin.cid.clone()) {
            tracing::error!(cid = %pin.cid, error = %e, "failed to dispatch unpin job");
        }

        tracing::info!(cid = %pin.cid, "pin deleted");
        Ok(())
    }

    /// The caller's own storage usage
    pub async fn storage_usage(&self, caller: &Principal) -> Result<Usage, PinServiceError> {
        self.usage_of(&caller.owner()).await
    }

    /// An agent's storage usage, for the agent itself or its claiming human
    pub async fn agent_storage_usage(
        &self,
        caller: &Principal,
        agent_id: &str,
    ) -> Result<Usage, PinServiceError> {
        self.authorize_agent(caller, agent_id, Access::StorageUsage)
            .await?;
        self.usage_of(&Owner::agent(agent_id)).await
    }

    async fn fetch(&self, id: Uuid) -> Result<Pin, PinServiceError> {
        self.store.get_by_id(id).await.map_err(|e| match e {
            PinStoreError::NotFound => PinServiceError::NotFound("pin not found".into()),
            e => internal("get pin", e),
        })
    }

    async fn list_owned(
        &self,
        owner: &Owner,
        options: &PinListOptions,
    ) -> Result<(Vec<Pin>, u64), PinServiceError> {
        self.store
            .list_by_owner(owner, options)
            .await
            .map_err(|e| internal("list pins", e))
    }

    async fn usage_of(&self, owner: &Owner) -> Result<Usage, PinServiceError> {
        self.ledger.usage(owner).await.map_err(|e| match e {
            QuotaError::OwnerNotFound(_) => {
                PinServiceError::NotFound("no storage quota for this owner".into())
            }
            e => internal("get storage usage", e),
        })
    }

    /// Check that `caller` may perform `access` on the agent `agent_id`.
    ///
    /// Self access needs no lookup. Otherwise the agent must exist
    ///  (NotFound) and be related to the caller (Forbidden).
    async fn authorize_agent(
        &self,
        caller: &Principal,
        agent_id: &str,
        access: Access,
    ) -> Result<(), PinServiceError> {
        if caller.kind == OwnerKind::Agent && caller.id == agent_id {
            return Ok(());
        }

        let target = self
            .directory
            .find_agent(agent_id)
            .await
            .map_err(|e| internal("find agent", e))?
            .ok_or_else(|| PinServiceError::NotFound("agent not found".into()))?;

        match relationship(caller, &target) {
            Some(r) if access.admits(r) => Ok(()),
            _ => Err(PinServiceError::Forbidden(forbidden_message(caller, access))),
        }
    }
}

fn forbidden_message(caller: &Principal, access: Access) -> String {
    match (caller.kind, access) {
        (OwnerKind::Agent, Access::PinListing) => {
            "agents can only access their own or sibling agents' pins".into()
        }
        (OwnerKind::Agent, Access::StorageUsage) => {
            "agents can only view their own storage usage".into()
        }
        (OwnerKind::Human, _) => "you must be the claiming owner of this agent".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pins::memory::{MemoryAgentDirectory, MemoryPinStore, MemoryQuotaLedger};
    use crate::pins::orchestrator::{JobReceiver, PinJob};
    use crate::pins::PinStatus;
    use crate::testkit::{numbered_cid, V0_CID, V1_CID};

    type TestService = PinService<MemoryPinStore, MemoryQuotaLedger, MemoryAgentDirectory>;

    struct Harness {
        service: TestService,
        store: MemoryPinStore,
        ledger: MemoryQuotaLedger,
        jobs: JobReceiver,
        human: Principal,
        agent: Principal,
        sibling: Principal,
        stranger: Principal,
    }

    impl Harness {
        fn jobs(&self) -> Vec<PinJob> {
            self.jobs.drain()
        }
    }

    fn harness() -> Harness {
        let store = MemoryPinStore::new();
        let ledger = MemoryQuotaLedger::new();
        let directory = MemoryAgentDirectory::new();
        let (dispatcher, jobs) = JobDispatcher::new();

        let human = Principal::human("h1");
        let agent = Principal::agent("a1", Some("h1".into()));
        let sibling = Principal::agent("a2", Some("h1".into()));
        let stranger = Principal::agent("a3", Some("h2".into()));
        for p in [&human, &agent, &sibling, &stranger] {
            directory.insert(p.clone()).unwrap();
            ledger
                .set_usage(&p.owner(), Usage::new(0, 10_000))
                .unwrap();
        }

        Harness {
            service: PinService::new(store.clone(), ledger.clone(), directory, dispatcher),
            store,
            ledger,
            jobs,
            human,
            agent,
            sibling,
            stranger,
        }
    }

    fn create_req(cid: &str) -> CreatePin {
        CreatePin {
            cid: cid.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_queues_and_dispatches() {
        let h = harness();
        let pin = h.service.create(&h.agent, create_req(V1_CID)).await.unwrap();

        assert_eq!(pin.status, PinStatus::Queued);
        assert_eq!(pin.owner, h.agent.owner());
        assert!(pin.name.starts_with("pin_bafybeig_"));
        assert_eq!(
            h.jobs(),
            vec![PinJob::Pin {
                pin_id: pin.id,
                cid: V1_CID.to_string(),
                owner: h.agent.owner()
            }]
        );
    }

    #[tokio::test]
    async fn test_create_keeps_explicit_name() {
        let h = harness();
        let mut req = create_req(V0_CID);
        req.name = Some("backup".into());
        let pin = h.service.create(&h.human, req).await.unwrap();
        assert_eq!(pin.name, "backup");
    }

    #[tokio::test]
    async fn test_create_validates_cid() {
        let h = harness();
        assert_eq!(
            h.service.create(&h.agent, create_req("")).await,
            Err(PinServiceError::Validation("cid is required".into()))
        );
        assert_eq!(
            h.service.create(&h.agent, create_req("Qm123")).await,
            Err(PinServiceError::Validation(INVALID_CID_MESSAGE.into()))
        );
        // cids are checked exactly as sent
        for padded in [format!("  {V0_CID}\n"), format!("{V1_CID} "), format!("\t{V0_CID}")] {
            assert_eq!(
                h.service.create(&h.agent, create_req(&padded)).await,
                Err(PinServiceError::Validation(INVALID_CID_MESSAGE.into()))
            );
        }
        assert!(h.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_create_validates_meta() {
        let h = harness();
        let mut req = create_req(V1_CID);
        req.meta = (0..11).map(|i| (format!("k{i}"), "v".into())).collect();
        assert!(matches!(
            h.service.create(&h.agent, req).await,
            Err(PinServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_is_rejected() {
        let h = harness();
        h.service.create(&h.agent, create_req(V1_CID)).await.unwrap();
        assert_eq!(
            h.service.create(&h.agent, create_req(V1_CID)).await,
            Err(PinServiceError::DuplicatePin)
        );
        // different owner, same CID
        h.service
            .create(&h.sibling, create_req(V1_CID))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_exhausted_quota_blocks_without_writing() {
        let h = harness();
        h.ledger
            .set_usage(&h.agent.owner(), Usage::new(10_000, 10_000))
            .unwrap();

        assert_eq!(
            h.service.create(&h.agent, create_req(V1_CID)).await,
            Err(PinServiceError::QuotaExceeded)
        );
        let (pins, total) = h
            .store
            .list_by_owner(&h.agent.owner(), &PinListOptions::default())
            .await
            .unwrap();
        assert!(pins.is_empty());
        assert_eq!(total, 0);
        assert!(h.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_ledger_fails_open() {
        let h = harness();
        h.ledger.set_unavailable(true).unwrap();
        let pin = h.service.create(&h.agent, create_req(V1_CID)).await.unwrap();
        assert_eq!(pin.status, PinStatus::Queued);
    }

    #[tokio::test]
    async fn test_get_is_owner_only() {
        let h = harness();
        let pin = h.service.create(&h.agent, create_req(V1_CID)).await.unwrap();

        assert_eq!(h.service.get(&h.agent, pin.id).await.unwrap().id, pin.id);
        assert_eq!(
            h.service.get(&h.sibling, pin.id).await,
            Err(PinServiceError::Forbidden(
                "you can only view your own pins".into()
            ))
        );
        assert!(matches!(
            h.service.get(&h.agent, Uuid::new_v4()).await,
            Err(PinServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_for_agent_access() {
        let h = harness();
        for i in 0..3 {
            h.service
                .create(&h.agent, create_req(&numbered_cid(i)))
                .await
                .unwrap();
        }
        let options = PinListOptions::default();

        let (_, total) = h
            .service
            .list_for_agent(&h.agent, "a1", &options)
            .await
            .unwrap();
        assert_eq!(total, 3);

        let (pins, _) = h
            .service
            .list_for_agent(&h.sibling, "a1", &options)
            .await
            .unwrap();
        assert_eq!(pins.len(), 3);

        h.service
            .list_for_agent(&h.human, "a1", &options)
            .await
            .unwrap();

        assert_eq!(
            h.service.list_for_agent(&h.stranger, "a1", &options).await,
            Err(PinServiceError::Forbidden(
                "agents can only access their own or sibling agents' pins".into()
            ))
        );
        assert_eq!(
            h.service
                .list_for_agent(&Principal::human("h2"), "a1", &options)
                .await,
            Err(PinServiceError::Forbidden(
                "you must be the claiming owner of this agent".into()
            ))
        );
        assert_eq!(
            h.service.list_for_agent(&h.agent, "ghost", &options).await,
            Err(PinServiceError::NotFound("agent not found".into()))
        );
    }

    #[tokio::test]
    async fn test_delete_releases_quota_and_unpins() {
        let h = harness();
        let owner = h.agent.owner();
        h.ledger.set_usage(&owner, Usage::new(5000, 10_000)).unwrap();

        let pin = h.service.create(&h.agent, create_req(V1_CID)).await.unwrap();
        h.store
            .update_status(pin.id, PinStatus::Pinning)
            .await
            .unwrap();
        h.store
            .update_status_and_size(pin.id, PinStatus::Pinned, 2000)
            .await
            .unwrap();
        h.jobs();

        assert_eq!(
            h.service.delete(&h.sibling, pin.id).await,
            Err(PinServiceError::Forbidden(
                "you can only delete your own pins".into()
            ))
        );

        h.service.delete(&h.agent, pin.id).await.unwrap();
        assert_eq!(h.ledger.usage(&owner).await.unwrap().used_bytes, 3000);
        assert_eq!(
            h.jobs(),
            vec![PinJob::Unpin {
                cid: V1_CID.to_string()
            }]
        );
        assert!(matches!(
            h.service.get(&h.agent, pin.id).await,
            Err(PinServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_of_unpinned_pin_leaves_quota() {
        let h = harness();
        let owner = h.agent.owner();
        h.ledger.set_usage(&owner, Usage::new(500, 10_000)).unwrap();
        let pin = h.service.create(&h.agent, create_req(V1_CID)).await.unwrap();

        h.service.delete(&h.agent, pin.id).await.unwrap();
        assert_eq!(h.ledger.usage(&owner).await.unwrap().used_bytes, 500);
    }

    #[tokio::test]
    async fn test_agent_storage_usage_excludes_siblings() {
        let h = harness();
        assert!(h.service.agent_storage_usage(&h.agent, "a1").await.is_ok());
        assert!(h.service.agent_storage_usage(&h.human, "a1").await.is_ok());
        assert!(matches!(
            h.service.agent_storage_usage(&h.sibling, "a1").await,
            Err(PinServiceError::Forbidden(_))
        ));
        assert_eq!(
            h.service.storage_usage(&h.human).await.unwrap(),
            Usage::new(0, 10_000)
        );
    }
}

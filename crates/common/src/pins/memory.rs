//! In-memory providers for the pin store, the quota ledger
//!  and the agent directory. Used by tests and embedders that
//!  don't need persistence.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::store::{PinStore, PinStoreError};
use super::{NewPin, Pin, PinListOptions, PinStatus};
use crate::access::{AgentDirectory, Owner, OwnerKind, Principal};
use crate::quota::{QuotaError, QuotaLedger, Usage};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryProviderError {
    #[error("memory provider error: {0}")]
    Internal(String),
    #[error("memory provider unavailable")]
    Unavailable,
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, MemoryProviderError> {
    lock.read().map_err(|e| {
        MemoryProviderError::Internal(format!("failed to acquire read lock: {}", e))
    })
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, MemoryProviderError> {
    lock.write().map_err(|e| {
        MemoryProviderError::Internal(format!("failed to acquire write lock: {}", e))
    })
}

/// In-memory pin store
#[derive(Debug, Clone, Default)]
pub struct MemoryPinStore {
    inner: Arc<RwLock<MemoryPinStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryPinStoreInner {
    /// pin id -> (insertion sequence, pin)
    pins: HashMap<Uuid, (u64, Pin)>,
    next_seq: u64,
}

impl MemoryPinStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn transition(
        &self,
        id: Uuid,
        status: PinStatus,
        size_bytes: Option<u64>,
    ) -> Result<(), PinStoreError<MemoryProviderError>> {
        let mut inner = write(&self.inner)?;
        let (_, pin) = inner.pins.get_mut(&id).ok_or(PinStoreError::NotFound)?;

        if !pin.status.can_advance_to(status) {
            return Err(PinStoreError::InvalidTransition {
                from: pin.status,
                to: status,
            });
        }

        let now = OffsetDateTime::now_utc();
        pin.status = status;
        pin.updated_at = now;
        if let Some(size_bytes) = size_bytes {
            pin.size_bytes = Some(size_bytes);
        }
        if status == PinStatus::Pinned {
            pin.pinned_at = Some(now);
        }
        Ok(())
    }
}

#[async_trait]
impl PinStore for MemoryPinStore {
    type Error = MemoryProviderError;

    async fn create(&self, new_pin: NewPin) -> Result<Pin, PinStoreError<Self::Error>> {
        let mut inner = write(&self.inner)?;

        let duplicate = inner
            .pins
            .values()
            .any(|(_, p)| p.cid == new_pin.cid && p.owner.id == new_pin.owner.id);
        if duplicate {
            return Err(PinStoreError::DuplicatePin);
        }

        let pin = new_pin.into_pin(Uuid::new_v4(), OffsetDateTime::now_utc());
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.pins.insert(pin.id, (seq, pin.clone()));
        Ok(pin)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Pin, PinStoreError<Self::Error>> {
        let inner = read(&self.inner)?;
        inner
            .pins
            .get(&id)
            .map(|(_, p)| p.clone())
            .ok_or(PinStoreError::NotFound)
    }

    async fn get_by_cid(
        &self,
        cid: &str,
        owner_id: &str,
    ) -> Result<Pin, PinStoreError<Self::Error>> {
        let inner = read(&self.inner)?;
        inner
            .pins
            .values()
            .find(|(_, p)| p.cid == cid && p.owner.id == owner_id)
            .map(|(_, p)| p.clone())
            .ok_or(PinStoreError::NotFound)
    }

    async fn list_by_owner(
        &self,
        owner: &Owner,
        options: &PinListOptions,
    ) -> Result<(Vec<Pin>, u64), PinStoreError<Self::Error>> {
        let inner = read(&self.inner)?;
        let mut matches: Vec<&(u64, Pin)> = inner
            .pins
            .values()
            .filter(|(_, p)| &p.owner == owner && options.matches(p))
            .collect();

        // newest first, insertion order breaking ties
        matches.sort_by(|(sa, a), (sb, b)| b.created_at.cmp(&a.created_at).then(sb.cmp(sa)));

        let total = matches.len() as u64;
        let pins = matches
            .into_iter()
            .take(options.limit as usize)
            .map(|(_, p)| p.clone())
            .collect();
        Ok((pins, total))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PinStatus,
    ) -> Result<(), PinStoreError<Self::Error>> {
        self.transition(id, status, None)
    }

    async fn update_status_and_size(
        &self,
        id: Uuid,
        status: PinStatus,
        size_bytes: u64,
    ) -> Result<(), PinStoreError<Self::Error>> {
        self.transition(id, status, Some(size_bytes))
    }

    async fn delete(&self, id: Uuid) -> Result<(), PinStoreError<Self::Error>> {
        let mut inner = write(&self.inner)?;
        inner
            .pins
            .remove(&id)
            .map(|_| ())
            .ok_or(PinStoreError::NotFound)
    }

    async fn list_by_status(
        &self,
        status: PinStatus,
        updated_before: OffsetDateTime,
    ) -> Result<Vec<Pin>, PinStoreError<Self::Error>> {
        let inner = read(&self.inner)?;
        let mut matches: Vec<&(u64, Pin)> = inner
            .pins
            .values()
            .filter(|(_, p)| p.status == status && p.updated_at < updated_before)
            .collect();
        matches.sort_by(|(sa, a), (sb, b)| a.updated_at.cmp(&b.updated_at).then(sa.cmp(sb)));
        Ok(matches.into_iter().map(|(_, p)| p.clone()).collect())
    }
}

/// In-memory quota ledger.
///
/// Can be switched into an unavailable mode in which every call fails,
///  to exercise fail-open admission.
#[derive(Debug, Clone, Default)]
pub struct MemoryQuotaLedger {
    inner: Arc<RwLock<MemoryQuotaLedgerInner>>,
}

#[derive(Debug, Default)]
struct MemoryQuotaLedgerInner {
    records: HashMap<Owner, Usage>,
    unavailable: bool,
}

impl MemoryQuotaLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an owner with a quota and an initial usage
    pub fn set_usage(&self, owner: &Owner, usage: Usage) -> Result<(), MemoryProviderError> {
        write(&self.inner)?.records.insert(owner.clone(), usage);
        Ok(())
    }

    pub fn set_unavailable(&self, unavailable: bool) -> Result<(), MemoryProviderError> {
        write(&self.inner)?.unavailable = unavailable;
        Ok(())
    }
}

#[async_trait]
impl QuotaLedger for MemoryQuotaLedger {
    type Error = MemoryProviderError;

    async fn usage(&self, owner: &Owner) -> Result<Usage, QuotaError<Self::Error>> {
        let inner = read(&self.inner)?;
        if inner.unavailable {
            return Err(MemoryProviderError::Unavailable.into());
        }
        inner
            .records
            .get(owner)
            .copied()
            .ok_or_else(|| QuotaError::OwnerNotFound(owner.clone()))
    }

    async fn adjust_usage(
        &self,
        owner: &Owner,
        delta_bytes: i64,
    ) -> Result<(), QuotaError<Self::Error>> {
        let mut inner = write(&self.inner)?;
        if inner.unavailable {
            return Err(MemoryProviderError::Unavailable.into());
        }
        let usage = inner
            .records
            .get_mut(owner)
            .ok_or_else(|| QuotaError::OwnerNotFound(owner.clone()))?;
        usage.used_bytes = if delta_bytes >= 0 {
            usage.used_bytes.saturating_add(delta_bytes as u64)
        } else {
            usage.used_bytes.saturating_sub(delta_bytes.unsigned_abs())
        };
        Ok(())
    }
}

/// In-memory agent directory
#[derive(Debug, Clone, Default)]
pub struct MemoryAgentDirectory {
    inner: Arc<RwLock<HashMap<String, Principal>>>,
}

impl MemoryAgentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, principal: Principal) -> Result<(), MemoryProviderError> {
        write(&self.inner)?.insert(principal.id.clone(), principal);
        Ok(())
    }
}

#[async_trait]
impl AgentDirectory for MemoryAgentDirectory {
    type Error = MemoryProviderError;

    async fn find_agent(&self, id: &str) -> Result<Option<Principal>, Self::Error> {
        Ok(read(&self.inner)?
            .get(id)
            .filter(|p| p.kind == OwnerKind::Agent)
            .cloned())
    }
}

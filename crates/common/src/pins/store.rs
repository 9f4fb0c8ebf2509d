use std::fmt::{Debug, Display};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{NewPin, Pin, PinListOptions, PinStatus};
use crate::access::Owner;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PinStoreError<T> {
    #[error("unhandled pin store error: {0}")]
    Provider(#[from] T),
    #[error("pin not found")]
    NotFound,
    /// A pin for this `(cid, owner)` already exists
    #[error("pin already exists for this CID and owner")]
    DuplicatePin,
    /// The stored status is not the predecessor of the requested one
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: PinStatus, to: PinStatus },
}

#[async_trait]
pub trait PinStore: Send + Sync + Debug + Clone + 'static {
    type Error: Display + Debug + Send + Sync + 'static;

    /// Persist a new pin in `queued`, assigning its id and timestamps
    ///
    /// # Returns
    /// * `Err(PinStoreError::DuplicatePin)` - the owner already pinned this CID
    async fn create(&self, pin: NewPin) -> Result<Pin, PinStoreError<Self::Error>>;

    async fn get_by_id(&self, id: Uuid) -> Result<Pin, PinStoreError<Self::Error>>;

    async fn get_by_cid(
        &self,
        cid: &str,
        owner_id: &str,
    ) -> Result<Pin, PinStoreError<Self::Error>>;

    /// List an owner's pins matching `options`, newest first.
    ///
    /// # Returns
    /// * `Ok((pins, total))` - at most `options.limit` pins, and the
    ///   number of matches ignoring the limit
    async fn list_by_owner(
        &self,
        owner: &Owner,
        options: &PinListOptions,
    ) -> Result<(Vec<Pin>, u64), PinStoreError<Self::Error>>;

    /// Move a pin forward to `status`.
    ///
    /// Must apply atomically and only if the stored status is
    ///  `status.predecessor()`; anything else is `InvalidTransition`.
    async fn update_status(
        &self,
        id: Uuid,
        status: PinStatus,
    ) -> Result<(), PinStoreError<Self::Error>>;

    /// Same as [`PinStore::update_status`], also recording the pin's size
    ///  (and `pinned_at` when entering `pinned`)
    async fn update_status_and_size(
        &self,
        id: Uuid,
        status: PinStatus,
        size_bytes: u64,
    ) -> Result<(), PinStoreError<Self::Error>>;

    async fn delete(&self, id: Uuid) -> Result<(), PinStoreError<Self::Error>>;

    /// Pins in `status` whose last update happened strictly before `updated_before`,
    ///  oldest first
    async fn list_by_status(
        &self,
        status: PinStatus,
        updated_before: OffsetDateTime,
    ) -> Result<Vec<Pin>, PinStoreError<Self::Error>>;
}

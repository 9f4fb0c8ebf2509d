use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::access::Owner;

mod api;
mod filter;
pub mod memory;
pub mod orchestrator;
pub mod service;
mod status;
mod store;

pub use api::{PinInfo, PinObject, PinResults, PinStatusResponse};
pub use filter::{
    parse_limit, parse_meta_filter, parse_statuses, validate_meta, PinListOptions, PinListQuery,
    TextMatch, ValidationError, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT, MAX_META_ENTRIES,
    MAX_META_VALUE_LEN,
};
pub use status::{ParsePinStatusError, PinStatus};
pub use store::{PinStore, PinStoreError};

/// A request to retain a CID on behalf of an owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pin {
    /// Exposed to clients as the `requestid`
    pub id: Uuid,
    pub cid: String,
    pub status: PinStatus,
    pub name: String,
    pub origins: Vec<String>,
    pub meta: BTreeMap<String, String>,
    pub delegates: Vec<String>,
    pub owner: Owner,
    /// Cumulative DAG size, known once the pin reaches `pinned`
    pub size_bytes: Option<u64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub pinned_at: Option<OffsetDateTime>,
}

/// Everything a store needs to create a pin record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPin {
    pub cid: String,
    pub name: String,
    pub origins: Vec<String>,
    pub meta: BTreeMap<String, String>,
    pub owner: Owner,
}

impl NewPin {
    /// Build the initial `queued` record, stamped at `now`
    pub fn into_pin(self, id: Uuid, now: OffsetDateTime) -> Pin {
        Pin {
            id,
            cid: self.cid,
            status: PinStatus::Queued,
            name: self.name,
            origins: self.origins,
            meta: self.meta,
            delegates: Vec::new(),
            owner: self.owner,
            size_bytes: None,
            created_at: now,
            updated_at: now,
            pinned_at: None,
        }
    }
}

/// Name given to pins created without one: `pin_<cid prefix>_<YYYYMMDD>`
pub fn auto_name(cid: &str, now: OffsetDateTime) -> String {
    let prefix: String = cid.chars().take(8).collect();
    let date = now
        .to_offset(time::UtcOffset::UTC)
        .format(format_description!("[year][month][day]"))
        .unwrap_or_default();
    format!("pin_{}_{}", prefix, date)
}

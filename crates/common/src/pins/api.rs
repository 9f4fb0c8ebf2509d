//! Wire shapes of the pinning service protocol.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{Pin, PinStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinObject {
    pub cid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub origins: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// The pin status object returned by every pin endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinStatusResponse {
    pub requestid: Uuid,
    pub status: PinStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    pub pin: PinObject,
    /// Always present, even when empty
    #[serde(default)]
    pub delegates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<PinInfo>,
}

impl From<&Pin> for PinStatusResponse {
    fn from(pin: &Pin) -> Self {
        Self {
            requestid: pin.id,
            status: pin.status,
            created: pin.created_at,
            pin: PinObject {
                cid: pin.cid.clone(),
                name: Some(pin.name.clone()).filter(|n| !n.is_empty()),
                origins: pin.origins.clone(),
                meta: pin.meta.clone(),
            },
            delegates: pin.delegates.clone(),
            info: pin.size_bytes.map(|size_bytes| PinInfo {
                size_bytes: Some(size_bytes),
            }),
        }
    }
}

impl From<Pin> for PinStatusResponse {
    fn from(pin: Pin) -> Self {
        Self::from(&pin)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinResults {
    /// Total number of matches, ignoring the limit
    pub count: u64,
    pub results: Vec<PinStatusResponse>,
}

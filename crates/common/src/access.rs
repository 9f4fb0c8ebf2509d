//! Principals, ownership and the relationship predicate
//!  that decides who may read whose pins.

use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    Human,
    Agent,
}

impl OwnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKind::Human => "human",
            OwnerKind::Agent => "agent",
        }
    }
}

impl Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown owner kind: {0}")]
pub struct UnknownOwnerKind(pub String);

impl FromStr for OwnerKind {
    type Err = UnknownOwnerKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(OwnerKind::Human),
            "agent" => Ok(OwnerKind::Agent),
            other => Err(UnknownOwnerKind(other.to_string())),
        }
    }
}

/// The owner of a pin and of a quota record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub kind: OwnerKind,
}

impl Owner {
    pub fn new(id: impl Into<String>, kind: OwnerKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    pub fn human(id: impl Into<String>) -> Self {
        Self::new(id, OwnerKind::Human)
    }

    pub fn agent(id: impl Into<String>) -> Self {
        Self::new(id, OwnerKind::Agent)
    }
}

impl Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// An authenticated caller, or the target of an access check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub kind: OwnerKind,
    /// Only meaningful for agents: the human that claimed them
    pub claiming_human_id: Option<String>,
}

impl Principal {
    pub fn human(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: OwnerKind::Human,
            claiming_human_id: None,
        }
    }

    pub fn agent(id: impl Into<String>, claiming_human_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            kind: OwnerKind::Agent,
            claiming_human_id,
        }
    }

    pub fn owner(&self) -> Owner {
        Owner::new(self.id.clone(), self.kind)
    }

    pub fn is_agent(&self) -> bool {
        self.kind == OwnerKind::Agent
    }

    pub fn owns(&self, owner: &Owner) -> bool {
        self.id == owner.id && self.kind == owner.kind
    }
}

/// How a caller is related to the target principal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    /// The caller is the target
    Owner,
    /// Both are agents claimed by the same human
    Sibling,
    /// The caller is the human that claimed the target agent
    ClaimingHuman,
}

/// What the caller wants to do with the target's data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Reading the target's pin listing
    PinListing,
    /// Reading the target's storage usage
    StorageUsage,
}

impl Access {
    pub fn admits(&self, relationship: Relationship) -> bool {
        match self {
            Access::PinListing => true,
            Access::StorageUsage => matches!(
                relationship,
                Relationship::Owner | Relationship::ClaimingHuman
            ),
        }
    }
}

pub fn relationship(caller: &Principal, target: &Principal) -> Option<Relationship> {
    if caller.id == target.id && caller.kind == target.kind {
        return Some(Relationship::Owner);
    }

    if caller.is_agent() && target.is_agent() {
        if let (Some(a), Some(b)) = (&caller.claiming_human_id, &target.claiming_human_id) {
            if a == b {
                return Some(Relationship::Sibling);
            }
        }
    }

    if caller.kind == OwnerKind::Human
        && target.claiming_human_id.as_deref() == Some(caller.id.as_str())
    {
        return Some(Relationship::ClaimingHuman);
    }

    None
}

pub fn can_access(caller: &Principal, target: &Principal) -> bool {
    relationship(caller, target).is_some()
}

/// Lookup of agents by id, used to resolve the target of an access check.
#[async_trait]
pub trait AgentDirectory: Send + Sync + Debug + Clone + 'static {
    type Error: Display + Debug + Send + Sync + 'static;

    /// Returns `Ok(None)` when no agent with this id exists
    async fn find_agent(&self, id: &str) -> Result<Option<Principal>, Self::Error>;
}

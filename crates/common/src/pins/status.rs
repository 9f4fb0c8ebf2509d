use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle of a pin request.
///
/// ```text
/// queued -> pinning -> pinned
///                   \-> failed
/// ```
///
/// Status only ever moves forward along these edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinStatus {
    Queued,
    Pinning,
    Pinned,
    Failed,
}

impl PinStatus {
    pub const ALL: [PinStatus; 4] = [
        PinStatus::Queued,
        PinStatus::Pinning,
        PinStatus::Pinned,
        PinStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PinStatus::Queued => "queued",
            PinStatus::Pinning => "pinning",
            PinStatus::Pinned => "pinned",
            PinStatus::Failed => "failed",
        }
    }

    /// The only status a pin may be in immediately before entering `self`
    pub fn predecessor(&self) -> Option<PinStatus> {
        match self {
            PinStatus::Queued => None,
            PinStatus::Pinning => Some(PinStatus::Queued),
            PinStatus::Pinned | PinStatus::Failed => Some(PinStatus::Pinning),
        }
    }

    pub fn can_advance_to(&self, next: PinStatus) -> bool {
        next.predecessor() == Some(*self)
    }
}

impl fmt::Display for PinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("status must be one of: queued, pinning, pinned, failed")]
pub struct ParsePinStatusError;

impl FromStr for PinStatus {
    type Err = ParsePinStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(PinStatus::Queued),
            "pinning" => Ok(PinStatus::Pinning),
            "pinned" => Ok(PinStatus::Pinned),
            "failed" => Ok(PinStatus::Failed),
            _ => Err(ParsePinStatusError),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_edges() {
        assert!(PinStatus::Queued.can_advance_to(PinStatus::Pinning));
        assert!(PinStatus::Pinning.can_advance_to(PinStatus::Pinned));
        assert!(PinStatus::Pinning.can_advance_to(PinStatus::Failed));
    }

    #[test]
    fn test_no_backward_or_skipping_edges() {
        for from in PinStatus::ALL {
            assert!(!from.can_advance_to(PinStatus::Queued));
        }
        assert!(!PinStatus::Queued.can_advance_to(PinStatus::Pinned));
        assert!(!PinStatus::Pinned.can_advance_to(PinStatus::Failed));
        assert!(!PinStatus::Failed.can_advance_to(PinStatus::Pinned));
        assert!(!PinStatus::Pinning.can_advance_to(PinStatus::Pinning));
    }

    #[test]
    fn test_parse() {
        for status in PinStatus::ALL {
            assert_eq!(status.as_str().parse::<PinStatus>(), Ok(status));
        }
        assert_eq!("PINNED".parse::<PinStatus>(), Err(ParsePinStatusError));
    }
}

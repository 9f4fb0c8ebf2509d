//! Per-owner storage accounting and the admission policy
//!  applied before a pin is accepted.

use std::fmt::{Debug, Display};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::access::Owner;

/// Default allowance for a freshly registered agent (1 GiB)
pub const DEFAULT_AGENT_QUOTA_BYTES: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub used_bytes: u64,
    pub quota_bytes: u64,
}

impl Usage {
    pub fn new(used_bytes: u64, quota_bytes: u64) -> Self {
        Self {
            used_bytes,
            quota_bytes,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.used_bytes >= self.quota_bytes
    }

    /// Share of the quota in use, in percent. Zero when there is no quota.
    pub fn percentage(&self) -> f64 {
        if self.quota_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.quota_bytes as f64 * 100.0
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuotaError<T> {
    #[error("unhandled quota ledger error: {0}")]
    Provider(#[from] T),
    #[error("no quota record for owner {0}")]
    OwnerNotFound(Owner),
}

#[async_trait]
pub trait QuotaLedger: Send + Sync + Debug + Clone + 'static {
    type Error: Display + Debug + Send + Sync + 'static;

    /// Current usage for an owner
    ///
    /// # Returns
    /// * `Err(QuotaError::OwnerNotFound)` - no quota record exists for the owner
    async fn usage(&self, owner: &Owner) -> Result<Usage, QuotaError<Self::Error>>;

    /// Apply a signed delta to an owner's usage.
    ///
    /// Must be a single atomic read-modify-write clamped at zero: concurrent
    ///  adjustments never lose updates and usage never goes negative.
    async fn adjust_usage(
        &self,
        owner: &Owner,
        delta_bytes: i64,
    ) -> Result<(), QuotaError<Self::Error>>;
}

/// Outcome of the quota check performed before accepting a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Usage is below quota
    Allow,
    /// The ledger could not be consulted; the request proceeds anyway
    AllowUnchecked,
    /// Usage is at or above quota
    Deny(Usage),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Admission::Deny(_))
    }
}

/// Decide whether a new pin may be accepted given the result of a usage lookup.
///
/// A failed lookup fails open: an unavailable ledger must not block pinning.
pub fn admit<E>(usage: Result<Usage, E>) -> Admission {
    match usage {
        Err(_) => Admission::AllowUnchecked,
        Ok(usage) if usage.is_exhausted() => Admission::Deny(usage),
        Ok(_) => Admission::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_below_quota() {
        assert_eq!(admit::<()>(Ok(Usage::new(10, 100))), Admission::Allow);
    }

    #[test]
    fn test_admit_at_quota_is_denied() {
        let usage = Usage::new(100, 100);
        assert_eq!(admit::<()>(Ok(usage)), Admission::Deny(usage));
        assert!(!admit::<()>(Ok(Usage::new(150, 100))).is_allowed());
    }

    #[test]
    fn test_admit_fails_open() {
        let admission = admit(Err("ledger unavailable"));
        assert_eq!(admission, Admission::AllowUnchecked);
        assert!(admission.is_allowed());
    }

    #[test]
    fn test_zero_quota_denies() {
        assert!(!admit::<()>(Ok(Usage::new(0, 0))).is_allowed());
    }

    #[test]
    fn test_percentage() {
        assert_eq!(Usage::new(0, 0).percentage(), 0.0);
        assert_eq!(Usage::new(25, 100).percentage(), 25.0);
    }
}

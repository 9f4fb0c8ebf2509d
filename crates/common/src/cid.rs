//! Syntactic CID classification.
//!
//! This is a cheap gate in front of the pinning backend, not a full
//! multibase/multihash decoder: it only checks the shape of the string.

use serde::{Deserialize, Serialize};

/// Anything shorter than this can't be a CID of either version
pub const MIN_CID_LENGTH: usize = 10;

pub const CID_V0_PREFIX: &str = "Qm";
pub const CID_V0_MIN_LENGTH: usize = 44;

pub const CID_V1_PREFIX: &str = "baf";
pub const CID_V1_MIN_LENGTH: usize = 50;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CidVersion {
    /// base58btc encoded sha2-256 multihash, always `Qm...`
    V0,
    /// base32 lowercase multibase, `baf...`
    V1,
}

/// Classify a candidate CID string, returning `None` if it is not
///  well formed as either a v0 or a v1 CID.
pub fn classify_cid(cid: &str) -> Option<CidVersion> {
    if cid.len() < MIN_CID_LENGTH {
        return None;
    }

    if cid.starts_with(CID_V0_PREFIX) {
        if cid.len() >= CID_V0_MIN_LENGTH && cid.chars().all(is_base58_char) {
            return Some(CidVersion::V0);
        }
        return None;
    }

    if cid.starts_with(CID_V1_PREFIX)
        && cid.len() >= CID_V1_MIN_LENGTH
        && cid
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return Some(CidVersion::V1);
    }

    None
}

pub fn is_valid_cid(cid: &str) -> bool {
    classify_cid(cid).is_some()
}

fn is_base58_char(c: char) -> bool {
    BASE58_ALPHABET.contains(c)
}

//! Listing filters and the validation of client supplied
//!  query parameters.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::{Pin, PinStatus};

pub const DEFAULT_LIST_LIMIT: u32 = 10;
pub const MAX_LIST_LIMIT: u32 = 1000;
pub const MAX_META_ENTRIES: usize = 10;
pub const MAX_META_VALUE_LEN: usize = 256;

/// A client input problem, reported back verbatim
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// How the `name` filter is compared against pin names
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMatch {
    #[default]
    Exact,
    IExact,
    Partial,
    IPartial,
}

impl TextMatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextMatch::Exact => "exact",
            TextMatch::IExact => "iexact",
            TextMatch::Partial => "partial",
            TextMatch::IPartial => "ipartial",
        }
    }

    /// Case-insensitive variants fold ASCII letters only, the same as
    ///  SQLite's `lower()`.
    pub fn matches(&self, needle: &str, haystack: &str) -> bool {
        match self {
            TextMatch::Exact => haystack == needle,
            TextMatch::IExact => haystack.eq_ignore_ascii_case(needle),
            TextMatch::Partial => haystack.contains(needle),
            TextMatch::IPartial => haystack
                .to_ascii_lowercase()
                .contains(&needle.to_ascii_lowercase()),
        }
    }
}

impl FromStr for TextMatch {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(TextMatch::Exact),
            "iexact" => Ok(TextMatch::IExact),
            "partial" => Ok(TextMatch::Partial),
            "ipartial" => Ok(TextMatch::IPartial),
            _ => Err(ValidationError::new(
                "match must be one of: exact, iexact, partial, ipartial",
            )),
        }
    }
}

/// Validated listing options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinListOptions {
    /// Exact CIDs to include, any of
    pub cids: Vec<String>,
    pub name: Option<String>,
    pub name_match: TextMatch,
    /// Statuses to include, any of
    pub statuses: Vec<PinStatus>,
    /// Every pair must be present and equal in the pin's meta
    pub meta: BTreeMap<String, String>,
    /// Only pins created strictly before this instant
    pub before: Option<OffsetDateTime>,
    /// Only pins created strictly after this instant
    pub after: Option<OffsetDateTime>,
    pub limit: u32,
}

impl Default for PinListOptions {
    fn default() -> Self {
        Self {
            cids: Vec::new(),
            name: None,
            name_match: TextMatch::default(),
            statuses: Vec::new(),
            meta: BTreeMap::new(),
            before: None,
            after: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl PinListOptions {
    /// Whether a pin satisfies every filter. The limit is not considered.
    pub fn matches(&self, pin: &Pin) -> bool {
        if !self.cids.is_empty() && !self.cids.iter().any(|c| c == &pin.cid) {
            return false;
        }
        if let Some(name) = &self.name {
            if !self.name_match.matches(name, &pin.name) {
                return false;
            }
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&pin.status) {
            return false;
        }
        if !self
            .meta
            .iter()
            .all(|(k, v)| pin.meta.get(k).is_some_and(|pv| pv == v))
        {
            return false;
        }
        if self.before.is_some_and(|before| pin.created_at >= before) {
            return false;
        }
        if self.after.is_some_and(|after| pin.created_at <= after) {
            return false;
        }
        true
    }
}

/// Raw listing query parameters, as they arrive on the wire.
///
/// Everything is kept as a string so that malformed values surface
///  as validation errors rather than extractor rejections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinListQuery {
    /// Comma separated CIDs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        rename = "match",
        skip_serializing_if = "Option::is_none"
    )]
    pub name_match: Option<String>,
    /// Comma separated statuses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    /// A JSON object of string to string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
}

impl TryFrom<PinListQuery> for PinListOptions {
    type Error = ValidationError;

    fn try_from(query: PinListQuery) -> Result<Self, Self::Error> {
        let mut options = PinListOptions::default();

        if let Some(cids) = non_empty(query.cid) {
            options.cids = split_list(&cids).map(String::from).collect();
        }
        options.name = non_empty(query.name);
        if let Some(name_match) = non_empty(query.name_match) {
            options.name_match = name_match.parse()?;
        }
        if let Some(statuses) = non_empty(query.status) {
            options.statuses = parse_statuses(&statuses)?;
        }
        if let Some(before) = non_empty(query.before) {
            options.before = Some(parse_timestamp("before", &before)?);
        }
        if let Some(after) = non_empty(query.after) {
            options.after = Some(parse_timestamp("after", &after)?);
        }
        if let Some(meta) = non_empty(query.meta) {
            options.meta = parse_meta_filter(&meta)?;
        }
        if let Some(limit) = non_empty(query.limit) {
            options.limit = parse_limit(&limit)?;
        }

        Ok(options)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a positive integer limit, capping it at [`MAX_LIST_LIMIT`]
pub fn parse_limit(raw: &str) -> Result<u32, ValidationError> {
    let limit: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::new("limit must be a positive integer"))?;
    if limit < 1 {
        return Err(ValidationError::new("limit must be a positive integer"));
    }
    Ok(limit.min(MAX_LIST_LIMIT as i64) as u32)
}

pub fn parse_statuses(raw: &str) -> Result<Vec<PinStatus>, ValidationError> {
    let mut statuses = Vec::new();
    for s in split_list(raw) {
        let status: PinStatus = s
            .parse()
            .map_err(|e: super::ParsePinStatusError| ValidationError::new(e.to_string()))?;
        if !statuses.contains(&status) {
            statuses.push(status);
        }
    }
    Ok(statuses)
}

fn parse_timestamp(field: &str, raw: &str) -> Result<OffsetDateTime, ValidationError> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339)
        .map_err(|_| ValidationError::new(format!("{field} must be an RFC 3339 timestamp")))
}

/// Parse the `meta` query parameter: a JSON object of string values
pub fn parse_meta_filter(raw: &str) -> Result<BTreeMap<String, String>, ValidationError> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|_| ValidationError::new("meta must be a valid JSON object"))?;
    let object = value
        .as_object()
        .ok_or_else(|| ValidationError::new("meta must be a valid JSON object"))?;

    if object.len() > MAX_META_ENTRIES {
        return Err(too_many_meta_entries());
    }

    let mut meta = BTreeMap::new();
    for (key, value) in object {
        let value = value
            .as_str()
            .ok_or_else(|| ValidationError::new("meta values must be strings"))?;
        meta.insert(key.clone(), value.to_string());
    }

    validate_meta(&meta)?;
    Ok(meta)
}

/// Check the size limits on pin metadata
pub fn validate_meta(meta: &BTreeMap<String, String>) -> Result<(), ValidationError> {
    if meta.len() > MAX_META_ENTRIES {
        return Err(too_many_meta_entries());
    }
    if meta
        .values()
        .any(|v| v.chars().count() > MAX_META_VALUE_LEN)
    {
        return Err(ValidationError::new(format!(
            "meta values must be at most {MAX_META_VALUE_LEN} characters"
        )));
    }
    Ok(())
}

fn too_many_meta_entries() -> ValidationError {
    ValidationError::new(format!("meta must have at most {MAX_META_ENTRIES} keys"))
}

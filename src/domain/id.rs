//! Identifiers for units and hierarchy edges
//!
//! ID Format:
//! - Unit IDs: lowercase slugs (e.g., `1st-corps`, `grenadier_div`)
//! - Edge IDs: `e-{sequence}` (e.g., `e-42`), allocated by the validity index
//!
//! Unit IDs order lexicographically; that order is what makes child and
//! descendant listings deterministic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MAX_UNIT_ID_LEN: usize = 64;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Invalid unit ID: expected a slug of [a-z0-9_-] starting with a letter or digit, got '{0}'")]
    InvalidUnitId(String),

    #[error("Invalid edge ID format: expected 'e-{{sequence}}', got '{0}'")]
    InvalidEdgeId(String),
}

/// Identifier of a unit in the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UnitId(String);

impl UnitId {
    /// Returns the slug
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UnitId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let slug = s.trim().to_ascii_lowercase();

        let mut chars = slug.chars();
        let valid_head = chars
            .next()
            .map(|c| c.is_ascii_alphanumeric())
            .unwrap_or(false);
        let valid_tail = chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if !valid_head || !valid_tail || slug.len() > MAX_UNIT_ID_LEN {
            return Err(IdError::InvalidUnitId(s.to_string()));
        }

        Ok(Self(slug))
    }
}

impl TryFrom<String> for UnitId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UnitId> for String {
    fn from(id: UnitId) -> Self {
        id.0
    }
}

/// Identifier of a hierarchy edge, `e-{sequence}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EdgeId(u64);

impl EdgeId {
    pub fn new(sequence: u64) -> Self {
        Self(sequence)
    }

    /// Returns the sequence number
    pub fn sequence(&self) -> u64 {
        self.0
    }

    /// Returns the id that follows this one, or `None` for the last
    /// representable id
    pub fn next(&self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e-{}", self.0)
    }
}

impl FromStr for EdgeId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let sequence = s
            .strip_prefix("e-")
            .filter(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u64>().ok())
            .ok_or_else(|| IdError::InvalidEdgeId(s.to_string()))?;

        Ok(Self(sequence))
    }
}

impl TryFrom<String> for EdgeId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EdgeId> for String {
    fn from(id: EdgeId) -> Self {
        id.to_string()
    }
}

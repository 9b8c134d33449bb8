//! Unit domain model
//!
//! A unit is an organizational entity (corps, division, brigade, ...) whose
//! place in the chain of command changes over time. The unit record itself
//! carries no hierarchy; edges live in the validity index.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::id::UnitId;

/// A unit as known to the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,

    /// Display name used when building lineage names
    pub name: String,

    /// Coarse rank of the unit (e.g. 1 = army, 2 = corps), independent of
    /// its actual depth in the hierarchy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_hint: Option<u32>,

    /// Free-text branch or type (infantry, cavalry, artillery, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formed: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dissolved: Option<NaiveDate>,
}

impl Unit {
    /// Creates a unit with only an id and a name
    pub fn new(id: UnitId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into().trim().to_string(),
            level_hint: None,
            kind: None,
            formed: None,
            dissolved: None,
        }
    }

    /// Sets the level hint
    pub fn with_level_hint(mut self, level: u32) -> Self {
        self.level_hint = Some(level);
        self
    }

    /// Sets the branch or type
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Sets the formation and dissolution dates
    pub fn with_service(mut self, formed: Option<NaiveDate>, dissolved: Option<NaiveDate>) -> Self {
        self.formed = formed;
        self.dissolved = dissolved;
        self
    }

    /// Returns the rank level, 0 when no hint is recorded
    pub fn rank_level(&self) -> u32 {
        self.level_hint.unwrap_or(0)
    }

    /// Returns true if the unit existed on the given date according to its
    /// formation and dissolution dates. Unknown dates are treated as open.
    pub fn in_service_on(&self, date: NaiveDate) -> bool {
        self.formed.map(|f| f <= date).unwrap_or(true)
            && self.dissolved.map(|d| date < d).unwrap_or(true)
    }
}

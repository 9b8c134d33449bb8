//! Hierarchy edges and their validity intervals
//!
//! An edge asserts that `child` reported to `parent` during the half-open
//! interval `[start, end)`. An open end means the edge is still active.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::HierarchyError;
use super::id::{EdgeId, UnitId};

/// Half-open validity interval `[start, end)`, or `[start, ∞)` when open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Validity {
    #[serde(rename = "start_date")]
    start: NaiveDate,
    #[serde(rename = "end_date", default, skip_serializing_if = "Option::is_none")]
    end: Option<NaiveDate>,
}

impl Validity {
    /// Creates an interval, rejecting `end <= start`
    pub fn new(start: NaiveDate, end: Option<NaiveDate>) -> Result<Self, HierarchyError> {
        match end {
            Some(end) if end <= start => Err(HierarchyError::InvalidInterval { start, end }),
            _ => Ok(Self { start, end }),
        }
    }

    /// Creates an interval with no end
    pub fn open(start: NaiveDate) -> Self {
        Self { start, end: None }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.end
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Returns true if `start <= date < end`
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && self.end.map(|end| date < end).unwrap_or(true)
    }

    /// Returns true if the two intervals share at least one instant
    pub fn overlaps(&self, other: &Validity) -> bool {
        let self_starts_first = other.end.map(|end| self.start < end).unwrap_or(true);
        let other_starts_first = self.end.map(|end| other.start < end).unwrap_or(true);
        self_starts_first && other_starts_first
    }

    /// Returns true if `date` falls strictly after the start and before the
    /// end, i.e. it splits this interval into two non-empty parts
    pub fn splits_at(&self, date: NaiveDate) -> bool {
        self.start < date && self.end.map(|end| date < end).unwrap_or(true)
    }

    /// Returns a copy ending at `end`
    pub(crate) fn closed_at(&self, end: NaiveDate) -> Result<Self, HierarchyError> {
        Self::new(self.start, Some(end))
    }
}

/// A record that `child` reported to `parent` during `validity`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyEdge {
    pub id: EdgeId,

    #[serde(rename = "child_unit_id")]
    pub child: UnitId,

    #[serde(rename = "parent_unit_id")]
    pub parent: UnitId,

    #[serde(flatten)]
    pub validity: Validity,
}

impl HierarchyEdge {
    pub fn start(&self) -> NaiveDate {
        self.validity.start()
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.validity.end()
    }

    pub fn is_active_at(&self, date: NaiveDate) -> bool {
        self.validity.contains(date)
    }

    /// Returns true if the edge names `unit` on either side
    pub fn references(&self, unit: &UnitId) -> bool {
        &self.child == unit || &self.parent == unit
    }
}

//! Error taxonomy for the hierarchy engine
//!
//! Write-path failures leave the index untouched and come back as
//! [`HierarchyError`]. Read-path corruption is reported as an
//! [`InvariantViolation`], either as an error or next to a best-effort
//! result in [`Partial`].

use chrono::NaiveDate;
use thiserror::Error;

use super::id::{EdgeId, UnitId};

/// Evidence that stored data breaks a structural invariant
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("Unit {unit} has concurrently active parent edges on {at}: {}", join_edge_ids(.edges))]
    ConcurrentParents {
        unit: UnitId,
        at: NaiveDate,
        edges: Vec<EdgeId>,
    },

    #[error("Walk from {start} on {at} exceeded the depth bound of {limit}")]
    DepthExceeded {
        start: UnitId,
        at: NaiveDate,
        limit: usize,
    },

    #[error("Hierarchy on {at} contains a cycle through {unit}")]
    CyclicSnapshot { unit: UnitId, at: NaiveDate },

    #[error("Edge {edge} references unit {unit}, which is not registered")]
    DanglingUnit { edge: EdgeId, unit: UnitId },
}

fn join_edge_ids(edges: &[EdgeId]) -> String {
    edges
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("A unit cannot be its own parent: {0}")]
    SelfParent(UnitId),

    #[error("Invalid interval: end date {end} is not after start date {start}")]
    InvalidInterval { start: NaiveDate, end: NaiveDate },

    #[error("Interval overlaps existing edge {existing} of unit {child}")]
    OverlappingInterval { child: UnitId, existing: EdgeId },

    #[error("Unit not found: {0}")]
    UnknownUnit(UnitId),

    #[error("Edge not found: {0}")]
    UnknownEdge(EdgeId),

    #[error("Edge id {0} is the last one available; no further edges can be allocated")]
    EdgeIdsExhausted(EdgeId),

    #[error("Edge {edge} is already closed at {end}")]
    EdgeAlreadyClosed { edge: EdgeId, end: NaiveDate },

    #[error("Placing {child} under {parent} would create a cycle on {at}")]
    CycleDetected {
        child: UnitId,
        parent: UnitId,
        at: NaiveDate,
    },

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    #[error("Hierarchy lock poisoned by a panicked writer")]
    Poisoned,
}

/// A best-effort read result, plus the violation that cut it short, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partial<T> {
    pub value: T,
    pub violation: Option<InvariantViolation>,
}

impl<T> Partial<T> {
    pub fn complete(value: T) -> Self {
        Self {
            value,
            violation: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.violation.is_none()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Partial<U> {
        Partial {
            value: f(self.value),
            violation: self.violation,
        }
    }

    /// Discards the partial value when a violation was reported
    pub fn into_result(self) -> Result<T, InvariantViolation> {
        match self.violation {
            Some(violation) => Err(violation),
            None => Ok(self.value),
        }
    }
}

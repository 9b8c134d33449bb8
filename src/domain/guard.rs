//! Interval-aware cycle guard
//!
//! A proposed edge `child -> parent` over `[start, end)` creates a cycle if,
//! at some instant in that interval, walking parent edges up from `parent`
//! reaches `child`. Ancestor chains only change where some edge on them
//! starts or ends, so the guard collects those breakpoints from every edge
//! reachable upward from `parent` during the interval and walks once per
//! breakpoint.

use std::collections::{BTreeSet, VecDeque};

use chrono::NaiveDate;
use log::{error, warn};

use super::edge::Validity;
use super::error::{HierarchyError, InvariantViolation};
use super::id::UnitId;
use super::index::ValidityIndex;

/// Default bound on ancestor walks performed by the guard
pub const DEFAULT_GUARD_DEPTH: usize = 256;

/// Rejects edges whose commit would close a cycle at any instant
pub struct CycleGuard<'a> {
    index: &'a ValidityIndex,
    depth_limit: usize,
}

impl<'a> CycleGuard<'a> {
    pub fn new(index: &'a ValidityIndex) -> Self {
        Self {
            index,
            depth_limit: DEFAULT_GUARD_DEPTH,
        }
    }

    pub fn with_depth_limit(mut self, depth_limit: usize) -> Self {
        self.depth_limit = depth_limit;
        self
    }

    /// Dates inside `validity` at which the ancestor chain of `parent` may
    /// change, always including `validity.start()`
    pub fn breakpoints(&self, child: &UnitId, parent: &UnitId, validity: &Validity) -> BTreeSet<NaiveDate> {
        let mut dates = BTreeSet::from([validity.start()]);
        let mut visited = BTreeSet::from([parent.clone()]);
        let mut queue = VecDeque::from([parent.clone()]);

        while let Some(unit) = queue.pop_front() {
            for edge in self.index.edges_for(&unit) {
                if !edge.validity.overlaps(validity) {
                    continue;
                }

                for date in std::iter::once(edge.start()).chain(edge.end()) {
                    if validity.splits_at(date) {
                        dates.insert(date);
                    }
                }

                // Above the proposed child the walk has already failed
                if &edge.parent != child && visited.insert(edge.parent.clone()) {
                    queue.push_back(edge.parent.clone());
                }
            }
        }

        dates
    }

    /// Checks that `child -> parent` over `validity` keeps every snapshot a forest
    pub fn check(&self, child: &UnitId, parent: &UnitId, validity: &Validity) -> Result<(), HierarchyError> {
        if child == parent {
            return Err(HierarchyError::SelfParent(child.clone()));
        }

        for at in self.breakpoints(child, parent, validity) {
            self.walk_at(child, parent, at)?;
        }

        Ok(())
    }

    /// Walks up from `parent` at one instant looking for `child`
    fn walk_at(&self, child: &UnitId, parent: &UnitId, at: NaiveDate) -> Result<(), HierarchyError> {
        let cycle = || HierarchyError::CycleDetected {
            child: child.clone(),
            parent: parent.clone(),
            at,
        };

        let mut seen = BTreeSet::new();
        let mut current = parent.clone();

        for _ in 0..self.depth_limit {
            if &current == child {
                warn!(
                    "event=cycle_rejected child={} parent={} at={}",
                    child, parent, at
                );
                return Err(cycle());
            }
            if !seen.insert(current.clone()) {
                error!(
                    "event=invariant_violation source=guard detail=\"existing cycle through {} on {}\"",
                    current, at
                );
                return Err(cycle());
            }

            match self.index.parent_edge_at(&current, at)? {
                Some(edge) => current = edge.parent.clone(),
                None => return Ok(()),
            }
        }

        let violation = InvariantViolation::DepthExceeded {
            start: parent.clone(),
            at,
            limit: self.depth_limit,
        };
        error!("event=invariant_violation source=guard detail=\"{}\"", violation);
        Err(violation.into())
    }
}

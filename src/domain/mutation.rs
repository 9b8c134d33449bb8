//! The write path for hierarchy edges
//!
//! Every change to a [`ValidityIndex`] goes through [`HierarchyWriter`].
//! Each operation validates fully before touching the index, so a
//! rejected call leaves it exactly as it was.

use chrono::NaiveDate;
use log::{debug, warn};

use super::edge::{HierarchyEdge, Validity};
use super::error::HierarchyError;
use super::guard::{CycleGuard, DEFAULT_GUARD_DEPTH};
use super::id::{EdgeId, UnitId};
use super::index::ValidityIndex;
use super::registry::UnitRegistry;

fn rejected(operation: &str, err: HierarchyError) -> HierarchyError {
    warn!("event=mutation_rejected op={} reason=\"{}\"", operation, err);
    err
}

/// Outcome of a [`HierarchyWriter::reparent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reparented {
    /// The previously active edge, now closed at the effective date
    pub closed: Option<EdgeId>,

    /// The new open edge under the new parent
    pub opened: EdgeId,
}

/// Validating writer over an index and the registry it refers to
pub struct HierarchyWriter<'a, R: UnitRegistry + ?Sized> {
    index: &'a mut ValidityIndex,
    registry: &'a R,
    guard_depth: usize,
}

impl<'a, R: UnitRegistry + ?Sized> HierarchyWriter<'a, R> {
    pub fn new(index: &'a mut ValidityIndex, registry: &'a R) -> Self {
        Self {
            index,
            registry,
            guard_depth: DEFAULT_GUARD_DEPTH,
        }
    }

    pub fn with_guard_depth(mut self, guard_depth: usize) -> Self {
        self.guard_depth = guard_depth;
        self
    }

    /// Read access to the index being written
    pub fn index(&self) -> &ValidityIndex {
        &*self.index
    }

    /// Records that `child` reports to `parent` from `start` until `end`
    pub fn add_edge(
        &mut self,
        child: &UnitId,
        parent: &UnitId,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<EdgeId, HierarchyError> {
        let validity = self
            .validate_new_edge(child, parent, start, end)
            .map_err(|e| rejected("add_edge", e))?;

        let id = self.index.next_edge_id();
        self.index.insert(HierarchyEdge {
            id,
            child: child.clone(),
            parent: parent.clone(),
            validity,
        });

        debug!(
            "event=edge_added edge={} child={} parent={} start={} end={}",
            id,
            child,
            parent,
            start,
            end.map(|d| d.to_string()).unwrap_or_else(|| "open".to_string())
        );
        Ok(id)
    }

    fn validate_new_edge(
        &self,
        child: &UnitId,
        parent: &UnitId,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Validity, HierarchyError> {
        if child == parent {
            return Err(HierarchyError::SelfParent(child.clone()));
        }

        let validity = Validity::new(start, end)?;

        for unit in [child, parent] {
            if !self.registry.unit_exists(unit) {
                return Err(HierarchyError::UnknownUnit(unit.clone()));
            }
        }

        if let Some(existing) = self.index.overlapping_edge(child, &validity, None) {
            return Err(HierarchyError::OverlappingInterval {
                child: child.clone(),
                existing: existing.id,
            });
        }

        CycleGuard::new(&*self.index)
            .with_depth_limit(self.guard_depth)
            .check(child, parent, &validity)?;

        let id = self.index.next_edge_id();
        if id.next().is_none() {
            return Err(HierarchyError::EdgeIdsExhausted(id));
        }

        Ok(validity)
    }

    /// Sets the end date of an open edge. Shortening an interval cannot
    /// introduce a cycle, so the guard is not consulted.
    pub fn close_edge(&mut self, edge: EdgeId, end: NaiveDate) -> Result<HierarchyEdge, HierarchyError> {
        let closed = self
            .closed_validity(edge, end)
            .map_err(|e| rejected("close_edge", e))?;

        self.index.set_validity(edge, closed);
        debug!("event=edge_closed edge={} end={}", edge, end);

        self.index
            .edge(edge)
            .cloned()
            .ok_or(HierarchyError::UnknownEdge(edge))
    }

    fn closed_validity(&self, edge: EdgeId, end: NaiveDate) -> Result<Validity, HierarchyError> {
        let current = self
            .index
            .edge(edge)
            .ok_or(HierarchyError::UnknownEdge(edge))?;

        if let Some(existing_end) = current.end() {
            return Err(HierarchyError::EdgeAlreadyClosed {
                edge,
                end: existing_end,
            });
        }

        current.validity.closed_at(end)
    }

    /// Moves `child` under `new_parent` from `effective` on.
    ///
    /// The edge active at `effective`, if any, is cut short there (whether
    /// it was open or already bounded) and an open edge to `new_parent`
    /// starts. If the new edge is rejected the old interval is restored
    /// before the error is returned.
    pub fn reparent(
        &mut self,
        child: &UnitId,
        new_parent: &UnitId,
        effective: NaiveDate,
    ) -> Result<Reparented, HierarchyError> {
        let active = self
            .index
            .parent_edge_at(child, effective)
            .map_err(|v| rejected("reparent", v.into()))?
            .map(|edge| (edge.id, edge.validity));

        if let Some((id, previous)) = active {
            // On the edge's own start date this is an empty interval
            let shortened = previous
                .closed_at(effective)
                .map_err(|e| rejected("reparent", e))?;
            self.index.set_validity(id, shortened);
            debug!("event=edge_closed edge={} end={} reason=reparent", id, effective);
        }

        match self.add_edge(child, new_parent, effective, None) {
            Ok(opened) => Ok(Reparented {
                closed: active.map(|(id, _)| id),
                opened,
            }),
            Err(err) => {
                if let Some((id, previous)) = active {
                    self.index.set_validity(id, previous);
                    debug!("event=edge_restored edge={} reason=reparent_rollback", id);
                }
                Err(err)
            }
        }
    }

    /// Hard-deletes an edge to correct a data-entry error. Surrounding
    /// history is not re-validated.
    pub fn remove_edge(&mut self, edge: EdgeId) -> Result<HierarchyEdge, HierarchyError> {
        let removed = self
            .index
            .remove(edge)
            .ok_or_else(|| rejected("remove_edge", HierarchyError::UnknownEdge(edge)))?;

        debug!(
            "event=edge_removed edge={} child={} parent={}",
            removed.id, removed.child, removed.parent
        );
        Ok(removed)
    }

    /// Removes every edge naming `unit` as child or parent. The registry
    /// calls this before deleting the unit.
    pub fn remove_edges_referencing(&mut self, unit: &UnitId) -> Vec<HierarchyEdge> {
        let mut ids: Vec<EdgeId> = self.index.edges_for(unit).iter().map(|e| e.id).collect();
        ids.extend(self.index.child_edges(unit).iter().map(|e| e.id));

        let removed: Vec<HierarchyEdge> = ids
            .into_iter()
            .filter_map(|id| self.index.remove(id))
            .collect();

        debug!(
            "event=edges_detached unit={} count={}",
            unit,
            removed.len()
        );
        removed
    }
}

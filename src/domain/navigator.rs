//! Point-in-time structural queries
//!
//! The navigator reads a committed [`ValidityIndex`] together with a
//! [`UnitRegistry`]. Walks are depth-bounded. When stored data breaks an
//! invariant the walk stops, logs the violation and returns what it had
//! gathered so far in a [`Partial`].

use std::collections::{BTreeSet, VecDeque};

use chrono::NaiveDate;
use log::error;

use super::edge::{HierarchyEdge, Validity};
use super::error::{HierarchyError, InvariantViolation, Partial};
use super::guard::DEFAULT_GUARD_DEPTH;
use super::id::UnitId;
use super::index::ValidityIndex;
use super::registry::UnitRegistry;
use super::unit::Unit;

/// Default bound on ancestor and descendant walks
pub const DEFAULT_WALK_DEPTH: usize = 100;

/// Depth bounds applied by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    /// Bound for navigator walks (ancestors, descendants, levels)
    pub walk_depth: usize,

    /// Bound for cycle-guard walks on the write path
    pub guard_depth: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            walk_depth: DEFAULT_WALK_DEPTH,
            guard_depth: DEFAULT_GUARD_DEPTH,
        }
    }
}

fn report(violation: InvariantViolation) -> InvariantViolation {
    error!("event=invariant_violation source=navigator detail=\"{}\"", violation);
    violation
}

/// A unit reached while expanding descendants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descendant<'a> {
    pub unit: &'a Unit,

    /// Distance from the unit the expansion started at (children are 1)
    pub depth: usize,
}

/// Read-only structural queries over a committed index
pub struct HierarchyNavigator<'a, R: UnitRegistry + ?Sized> {
    index: &'a ValidityIndex,
    registry: &'a R,
    walk_depth: usize,
}

impl<'a, R: UnitRegistry + ?Sized> HierarchyNavigator<'a, R> {
    pub fn new(index: &'a ValidityIndex, registry: &'a R) -> Self {
        Self {
            index,
            registry,
            walk_depth: DEFAULT_WALK_DEPTH,
        }
    }

    pub fn with_walk_depth(mut self, walk_depth: usize) -> Self {
        self.walk_depth = walk_depth;
        self
    }

    pub fn index(&self) -> &'a ValidityIndex {
        self.index
    }

    pub fn registry(&self) -> &'a R {
        self.registry
    }

    /// Looks up a unit that the caller named
    pub fn unit(&self, id: &UnitId) -> Result<&'a Unit, HierarchyError> {
        self.registry
            .unit(id)
            .ok_or_else(|| HierarchyError::UnknownUnit(id.clone()))
    }

    /// Looks up a unit that an edge named
    fn resolve(&self, edge: &HierarchyEdge, id: &UnitId) -> Result<&'a Unit, InvariantViolation> {
        self.registry.unit(id).ok_or_else(|| {
            report(InvariantViolation::DanglingUnit {
                edge: edge.id,
                unit: id.clone(),
            })
        })
    }

    /// The parent of `unit` on `date`, or `None` if it was a root then
    pub fn parent_at(&self, unit: &UnitId, date: NaiveDate) -> Result<Option<&'a Unit>, HierarchyError> {
        self.unit(unit)?;

        match self.index.parent_edge_at(unit, date)? {
            Some(edge) => Ok(Some(self.resolve(edge, &edge.parent)?)),
            None => Ok(None),
        }
    }

    /// Root-first chain of units ending with `unit` itself
    pub fn ancestor_path_at(
        &self,
        unit: &UnitId,
        date: NaiveDate,
    ) -> Result<Partial<Vec<&'a Unit>>, HierarchyError> {
        let start = self.unit(unit)?;
        let mut path = vec![start];
        let mut seen = BTreeSet::from([start.id.clone()]);
        let mut violation = None;

        loop {
            let current = &path[path.len() - 1].id;
            let edge = match self.index.parent_edge_at(current, date) {
                Ok(Some(edge)) => edge,
                Ok(None) => break,
                Err(v) => {
                    violation = Some(v);
                    break;
                }
            };

            if path.len() > self.walk_depth {
                violation = Some(report(InvariantViolation::DepthExceeded {
                    start: unit.clone(),
                    at: date,
                    limit: self.walk_depth,
                }));
                break;
            }

            let parent = match self.resolve(edge, &edge.parent) {
                Ok(parent) => parent,
                Err(v) => {
                    violation = Some(v);
                    break;
                }
            };
            if !seen.insert(parent.id.clone()) {
                violation = Some(report(InvariantViolation::CyclicSnapshot {
                    unit: parent.id.clone(),
                    at: date,
                }));
                break;
            }

            path.push(parent);
        }

        path.reverse();
        Ok(Partial {
            value: path,
            violation,
        })
    }

    /// Nesting depth on `date`; roots are level 0
    pub fn level_at(&self, unit: &UnitId, date: NaiveDate) -> Result<Partial<usize>, HierarchyError> {
        Ok(self.ancestor_path_at(unit, date)?.map(|path| path.len() - 1))
    }

    /// Direct children of `parent` on `date`, ordered by unit id
    pub fn children_at(&self, parent: &UnitId, date: NaiveDate) -> Result<Vec<&'a Unit>, HierarchyError> {
        self.unit(parent)?;

        self.index
            .children_edges_at(parent, date)
            .into_iter()
            .map(|edge| self.resolve(edge, &edge.child).map_err(HierarchyError::from))
            .collect()
    }

    /// Every unit that was ever a direct child of `parent`, with the
    /// interval it served there, in chronological order
    pub fn children_history(&self, parent: &UnitId) -> Result<Vec<(&'a Unit, Validity)>, HierarchyError> {
        self.unit(parent)?;

        self.index
            .child_edges(parent)
            .into_iter()
            .map(|edge| -> Result<_, HierarchyError> {
                let child = self.resolve(edge, &edge.child)?;
                Ok((child, edge.validity))
            })
            .collect()
    }

    /// Breadth-first expansion below `unit` on `date`. Siblings come out
    /// in unit-id order. A violation ends the sequence with one `Err`.
    pub fn descendants_at(&self, unit: &UnitId, date: NaiveDate) -> Result<Descendants<'a, R>, HierarchyError> {
        let root = self.unit(unit)?;
        let mut descendants = Descendants {
            index: self.index,
            registry: self.registry,
            root: root.id.clone(),
            at: date,
            limit: self.walk_depth,
            queue: VecDeque::new(),
            seen: BTreeSet::from([root.id.clone()]),
            pending: None,
            finished: false,
        };
        descendants.expand(&root.id, 0);
        Ok(descendants)
    }

    /// Names along the ancestor path joined with `separator`, root first.
    /// Without a date only the unit's own name is returned.
    pub fn lineage_name_at(
        &self,
        unit: &UnitId,
        date: Option<NaiveDate>,
        separator: &str,
    ) -> Result<Partial<String>, HierarchyError> {
        let Some(date) = date else {
            return Ok(Partial::complete(self.unit(unit)?.name.clone()));
        };

        Ok(self.ancestor_path_at(unit, date)?.map(|path| {
            path.iter()
                .map(|u| u.name.as_str())
                .collect::<Vec<_>>()
                .join(separator)
        }))
    }

    /// Registered units with no active parent edge on `date`
    pub fn top_level_at(&self, date: NaiveDate) -> Partial<Vec<&'a Unit>> {
        let all: BTreeSet<UnitId> = self.registry.unit_ids().into_iter().collect();
        self.tops_among(&all, date)
    }

    /// Units of `subset` whose parent on `date` is absent or outside `subset`
    pub fn top_level_within(
        &self,
        subset: &BTreeSet<UnitId>,
        date: NaiveDate,
    ) -> Result<Partial<Vec<&'a Unit>>, HierarchyError> {
        for id in subset {
            self.unit(id)?;
        }
        Ok(self.tops_among(subset, date))
    }

    fn tops_among(&self, subset: &BTreeSet<UnitId>, date: NaiveDate) -> Partial<Vec<&'a Unit>> {
        let mut tops = Vec::new();
        let mut violation = None;

        for id in subset {
            let Some(unit) = self.registry.unit(id) else {
                continue;
            };
            match self.index.parent_edge_at(id, date) {
                Ok(Some(edge)) if subset.contains(&edge.parent) => {}
                // The chain is cut at an unregistered parent; the unit is
                // the highest one that can be shown
                Ok(Some(edge)) if !self.registry.unit_exists(&edge.parent) => {
                    violation.get_or_insert(report(InvariantViolation::DanglingUnit {
                        edge: edge.id,
                        unit: edge.parent.clone(),
                    }));
                    tops.push(unit);
                }
                Ok(_) => tops.push(unit),
                // Concurrent parents: not a root, but keep the first report
                Err(v) => {
                    violation.get_or_insert(v);
                }
            }
        }

        Partial {
            value: tops,
            violation,
        }
    }
}

/// Lazy breadth-first sequence of descendants, see
/// [`HierarchyNavigator::descendants_at`]
pub struct Descendants<'a, R: UnitRegistry + ?Sized> {
    index: &'a ValidityIndex,
    registry: &'a R,
    root: UnitId,
    at: NaiveDate,
    limit: usize,
    queue: VecDeque<Descendant<'a>>,
    seen: BTreeSet<UnitId>,
    pending: Option<InvariantViolation>,
    finished: bool,
}

impl<'a, R: UnitRegistry + ?Sized> Descendants<'a, R> {
    fn expand(&mut self, parent: &UnitId, depth: usize) {
        let edges = self.index.children_edges_at(parent, self.at);
        if edges.is_empty() {
            return;
        }

        if depth >= self.limit {
            self.pending = Some(report(InvariantViolation::DepthExceeded {
                start: self.root.clone(),
                at: self.at,
                limit: self.limit,
            }));
            return;
        }

        for edge in edges {
            if !self.seen.insert(edge.child.clone()) {
                // A unit reached twice either has two parents or sits on a cycle
                let violation = match self.index.parent_edge_at(&edge.child, self.at) {
                    Err(concurrent) => concurrent,
                    Ok(_) => report(InvariantViolation::CyclicSnapshot {
                        unit: edge.child.clone(),
                        at: self.at,
                    }),
                };
                self.pending = Some(violation);
                return;
            }

            match self.registry.unit(&edge.child) {
                Some(unit) => self.queue.push_back(Descendant {
                    unit,
                    depth: depth + 1,
                }),
                None => {
                    self.pending = Some(report(InvariantViolation::DanglingUnit {
                        edge: edge.id,
                        unit: edge.child.clone(),
                    }));
                    return;
                }
            }
        }
    }
}

impl<'a, R: UnitRegistry + ?Sized> Iterator for Descendants<'a, R> {
    type Item = Result<Descendant<'a>, InvariantViolation>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let Some(next) = self.queue.pop_front() else {
            self.finished = true;
            return self.pending.take().map(Err);
        };

        if self.pending.is_none() {
            self.expand(&next.unit.id, next.depth);
        }
        Some(Ok(next))
    }
}

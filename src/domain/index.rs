//! Validity index over hierarchy edges
//!
//! Edges are stored per child unit in a [`Timeline`] sorted by start date,
//! with a reverse index grouping edge ids by parent unit. Both structures
//! are updated inside the same `&mut self` call, so a reader holding
//! `&ValidityIndex` never sees one without the other.
//!
//! Point queries binary-search the timeline on start date. Each timeline
//! also keeps a running maximum of end dates (`reach`): once the reach of
//! the prefix ending at slot `i` is at or before the query date, no edge
//! in that prefix can cover the date and the backward scan stops. On
//! non-overlapping data that is one lookup; on corrupted data every
//! covering edge is still found and reported.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use log::error;

use super::edge::{HierarchyEdge, Validity};
use super::error::{HierarchyError, InvariantViolation};
use super::id::{EdgeId, UnitId};

/// Later of two optional end dates, where `None` is unbounded
fn later_end(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<NaiveDate> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        _ => None,
    }
}

/// Edge history of a single child unit
#[derive(Debug, Clone, Default)]
struct Timeline {
    /// Sorted by (start, id)
    edges: Vec<HierarchyEdge>,

    /// `reach[i]` is the latest end among `edges[..=i]`
    reach: Vec<Option<NaiveDate>>,
}

impl Timeline {
    fn insert(&mut self, edge: HierarchyEdge) {
        let key = (edge.start(), edge.id);
        let at = self.edges.partition_point(|e| (e.start(), e.id) < key);
        self.edges.insert(at, edge);
        self.recompute_reach(at);
    }

    fn remove(&mut self, id: EdgeId) -> Option<HierarchyEdge> {
        let at = self.edges.iter().position(|e| e.id == id)?;
        let edge = self.edges.remove(at);
        self.reach.pop();
        self.recompute_reach(at);
        Some(edge)
    }

    /// Replaces the validity of an edge whose start date is unchanged
    fn set_validity(&mut self, id: EdgeId, validity: Validity) -> Option<Validity> {
        let at = self.edges.iter().position(|e| e.id == id)?;
        let previous = std::mem::replace(&mut self.edges[at].validity, validity);
        self.recompute_reach(at);
        Some(previous)
    }

    fn recompute_reach(&mut self, from: usize) {
        self.reach.resize(self.edges.len(), None);
        for i in from..self.edges.len() {
            let end = self.edges[i].end();
            self.reach[i] = if i == 0 {
                end
            } else {
                later_end(self.reach[i - 1], end)
            };
        }
    }

    /// Every edge whose interval contains `date`, latest start first
    fn active_at(&self, date: NaiveDate) -> Vec<&HierarchyEdge> {
        let upper = self.edges.partition_point(|e| e.start() <= date);
        let mut hits = Vec::new();

        for i in (0..upper).rev() {
            if self.reach[i].map(|end| end <= date).unwrap_or(false) {
                break;
            }
            if self.edges[i].is_active_at(date) {
                hits.push(&self.edges[i]);
            }
        }

        hits
    }

    fn get(&self, id: EdgeId) -> Option<&HierarchyEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Forward (by child) and reverse (by parent) index of hierarchy edges
#[derive(Debug, Clone)]
pub struct ValidityIndex {
    timelines: BTreeMap<UnitId, Timeline>,
    by_parent: BTreeMap<UnitId, BTreeSet<EdgeId>>,
    owners: HashMap<EdgeId, UnitId>,
    next_id: EdgeId,
}

impl Default for ValidityIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidityIndex {
    /// Creates an empty index. Edge ids start at `e-1`.
    pub fn new() -> Self {
        Self {
            timelines: BTreeMap::new(),
            by_parent: BTreeMap::new(),
            owners: HashMap::new(),
            next_id: EdgeId::new(1),
        }
    }

    /// Loads persisted edges without the mutation checks.
    ///
    /// Overlapping intervals and cycles are accepted here so that data
    /// from an earlier system can be loaded and then diagnosed; queries
    /// report them as invariant violations. Self-parenting and inverted
    /// intervals are rejected. A repeated edge id replaces the earlier edge.
    pub fn from_edges(edges: impl IntoIterator<Item = HierarchyEdge>) -> Result<Self, HierarchyError> {
        let mut index = Self::new();

        for edge in edges {
            if edge.child == edge.parent {
                return Err(HierarchyError::SelfParent(edge.child));
            }
            Validity::new(edge.start(), edge.end())?;
            if edge.id.next().is_none() {
                return Err(HierarchyError::EdgeIdsExhausted(edge.id));
            }

            index.remove(edge.id);
            index.insert(edge);
        }

        Ok(index)
    }

    /// Looks up an edge by id
    pub fn edge(&self, id: EdgeId) -> Option<&HierarchyEdge> {
        let child = self.owners.get(&id)?;
        self.timelines.get(child)?.get(id)
    }

    /// All edges with `unit` as child, sorted by start date ascending
    pub fn edges_for(&self, unit: &UnitId) -> &[HierarchyEdge] {
        self.timelines
            .get(unit)
            .map(|t| t.edges.as_slice())
            .unwrap_or(&[])
    }

    /// The edge of `unit` whose interval contains `date`, if any.
    ///
    /// More than one covering edge means the no-overlap invariant is
    /// broken; that is reported, never resolved by picking one.
    pub fn parent_edge_at(
        &self,
        unit: &UnitId,
        date: NaiveDate,
    ) -> Result<Option<&HierarchyEdge>, InvariantViolation> {
        let Some(timeline) = self.timelines.get(unit) else {
            return Ok(None);
        };

        let mut active = timeline.active_at(date);
        match active.len() {
            0 => Ok(None),
            1 => Ok(active.pop()),
            _ => {
                let mut edges: Vec<EdgeId> = active.iter().map(|e| e.id).collect();
                edges.sort();
                let violation = InvariantViolation::ConcurrentParents {
                    unit: unit.clone(),
                    at: date,
                    edges,
                };
                error!("event=invariant_violation source=index detail=\"{}\"", violation);
                Err(violation)
            }
        }
    }

    /// Edges naming `parent` whose interval contains `date`, ordered by
    /// child id then edge id
    pub fn children_edges_at(&self, parent: &UnitId, date: NaiveDate) -> Vec<&HierarchyEdge> {
        let mut edges: Vec<_> = self
            .parent_edge_ids(parent)
            .filter_map(|id| self.edge(id))
            .filter(|e| e.is_active_at(date))
            .collect();
        edges.sort_by(|a, b| (&a.child, a.id).cmp(&(&b.child, b.id)));
        edges
    }

    /// Every edge that ever named `parent`, ordered by start date then id
    pub fn child_edges(&self, parent: &UnitId) -> Vec<&HierarchyEdge> {
        let mut edges: Vec<_> = self
            .parent_edge_ids(parent)
            .filter_map(|id| self.edge(id))
            .collect();
        edges.sort_by_key(|e| (e.start(), e.id));
        edges
    }

    fn parent_edge_ids(&self, parent: &UnitId) -> impl Iterator<Item = EdgeId> + '_ {
        self.by_parent.get(parent).into_iter().flatten().copied()
    }

    /// The edge of `child` that shares an instant with `validity`, if any.
    /// `ignore` excludes one edge from the comparison.
    pub fn overlapping_edge(
        &self,
        child: &UnitId,
        validity: &Validity,
        ignore: Option<EdgeId>,
    ) -> Option<&HierarchyEdge> {
        self.edges_for(child)
            .iter()
            .filter(|e| Some(e.id) != ignore)
            .find(|e| e.validity.overlaps(validity))
    }

    /// All edges, grouped by child id and sorted by start within a child
    pub fn edges(&self) -> impl Iterator<Item = &HierarchyEdge> {
        self.timelines.values().flat_map(|t| t.edges.iter())
    }

    /// Units that appear as a child in at least one edge
    pub fn children_with_history(&self) -> impl Iterator<Item = &UnitId> {
        self.timelines.keys()
    }

    /// The id the next inserted edge will receive
    pub fn next_edge_id(&self) -> EdgeId {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Commits an edge into the forward and reverse indexes
    pub(crate) fn insert(&mut self, edge: HierarchyEdge) {
        // The last id is refused on load and never allocated
        if let Some(next) = edge.id.next().filter(|next| *next > self.next_id) {
            self.next_id = next;
        }

        self.owners.insert(edge.id, edge.child.clone());
        self.by_parent
            .entry(edge.parent.clone())
            .or_default()
            .insert(edge.id);
        self.timelines
            .entry(edge.child.clone())
            .or_default()
            .insert(edge);
    }

    /// Removes an edge from both indexes
    pub(crate) fn remove(&mut self, id: EdgeId) -> Option<HierarchyEdge> {
        let child = self.owners.remove(&id)?;
        let timeline = self.timelines.get_mut(&child)?;
        let edge = timeline.remove(id)?;

        if timeline.is_empty() {
            self.timelines.remove(&child);
        }
        if let Some(ids) = self.by_parent.get_mut(&edge.parent) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_parent.remove(&edge.parent);
            }
        }

        Some(edge)
    }

    /// Replaces an edge's validity, returning the previous one. The start
    /// date must not change; callers only ever move the end.
    pub(crate) fn set_validity(&mut self, id: EdgeId, validity: Validity) -> Option<Validity> {
        let child = self.owners.get(&id)?;
        let timeline = self.timelines.get_mut(child)?;
        debug_assert_eq!(timeline.get(id).map(|e| e.start()), Some(validity.start()));
        timeline.set_validity(id, validity)
    }
}

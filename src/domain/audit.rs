//! Whole-index verification
//!
//! Checks the two structural invariants over everything stored: no child
//! has overlapping intervals, and the snapshot at every edge boundary date
//! is a forest. Meant for data loaded from outside the mutation path.
//! Snapshots are materialized as petgraph graphs.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use log::{error, info};
use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use super::error::InvariantViolation;
use super::id::{EdgeId, UnitId};
use super::index::ValidityIndex;

/// Two edges of one child that share an instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlapFinding {
    pub child: UnitId,
    pub first: EdgeId,
    pub second: EdgeId,

    /// First instant covered by both edges
    pub from: NaiveDate,
}

/// A cycle in the snapshot at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleFinding {
    pub at: NaiveDate,

    /// Units on the cycle, sorted
    pub units: Vec<UnitId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub edges_checked: usize,
    pub instants_checked: usize,
    pub overlaps: Vec<OverlapFinding>,
    pub cycles: Vec<CycleFinding>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.overlaps.is_empty() && self.cycles.is_empty()
    }

    /// The findings expressed as invariant violations
    pub fn violations(&self) -> Vec<InvariantViolation> {
        let overlaps = self.overlaps.iter().map(|o| InvariantViolation::ConcurrentParents {
            unit: o.child.clone(),
            at: o.from,
            edges: vec![o.first, o.second],
        });
        let cycles = self.cycles.iter().filter_map(|c| {
            c.units.first().map(|unit| InvariantViolation::CyclicSnapshot {
                unit: unit.clone(),
                at: c.at,
            })
        });
        overlaps.chain(cycles).collect()
    }
}

/// Audits the whole index
pub fn audit(index: &ValidityIndex) -> AuditReport {
    let overlaps = find_overlaps(index);

    let instants: BTreeSet<NaiveDate> = index
        .edges()
        .flat_map(|e| std::iter::once(e.start()).chain(e.end()))
        .collect();

    let cycles: Vec<CycleFinding> = instants
        .iter()
        .flat_map(|&at| snapshot_cycles(index, at))
        .collect();

    let report = AuditReport {
        edges_checked: index.len(),
        instants_checked: instants.len(),
        overlaps,
        cycles,
    };

    for violation in report.violations() {
        error!("event=invariant_violation source=audit detail=\"{}\"", violation);
    }
    info!(
        "event=audit_complete edges={} instants={} overlaps={} cycles={}",
        report.edges_checked,
        report.instants_checked,
        report.overlaps.len(),
        report.cycles.len()
    );

    report
}

fn find_overlaps(index: &ValidityIndex) -> Vec<OverlapFinding> {
    let mut findings = Vec::new();

    for child in index.children_with_history() {
        let edges = index.edges_for(child);
        for (i, first) in edges.iter().enumerate() {
            // Sorted by start: stop once a later edge starts after `first` ends
            for second in edges[i + 1..]
                .iter()
                .take_while(|e| first.end().map(|end| e.start() < end).unwrap_or(true))
            {
                findings.push(OverlapFinding {
                    child: child.clone(),
                    first: first.id,
                    second: second.id,
                    from: second.start(),
                });
            }
        }
    }

    findings
}

/// Builds the child -> parent graph of edges active at `at` and returns
/// every cycle in it
fn snapshot_cycles(index: &ValidityIndex, at: NaiveDate) -> Vec<CycleFinding> {
    let mut graph: DiGraph<UnitId, ()> = DiGraph::new();
    let mut nodes: HashMap<UnitId, NodeIndex> = HashMap::new();

    let mut node = |graph: &mut DiGraph<UnitId, ()>, id: &UnitId| {
        *nodes
            .entry(id.clone())
            .or_insert_with(|| graph.add_node(id.clone()))
    };

    for edge in index.edges().filter(|e| e.is_active_at(at)) {
        let child = node(&mut graph, &edge.child);
        let parent = node(&mut graph, &edge.parent);
        graph.add_edge(child, parent, ());
    }

    if !is_cyclic_directed(&graph) {
        return Vec::new();
    }

    tarjan_scc(&graph)
        .into_iter()
        .filter(|component| component.len() > 1)
        .map(|component| {
            let mut units: Vec<UnitId> = component.iter().map(|&n| graph[n].clone()).collect();
            units.sort();
            CycleFinding { at, units }
        })
        .collect()
}

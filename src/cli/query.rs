//! Point-in-time queries (parent, path, level, lineage, children,
//! descendants, roots) and the audit command
//!
//! A query that runs into corrupt data still prints what it could resolve,
//! then fails with the violation.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde_json::json;

use super::output::Output;
use crate::domain::{audit as audit_index, HierarchyError, InvariantViolation, Partial, SharedHierarchy, Unit, UnitCatalog, UnitId};
use crate::storage::{Project, WriteLock};

/// Opens the current project and loads its engine
pub(super) fn open_engine(output: &Output, context: &str) -> Result<(Project, SharedHierarchy<UnitCatalog>)> {
    let project = Project::open_current()?;
    output.verbose_ctx(
        context,
        &format!("Opened project at: {}", project.root().display()),
    );

    let engine = project.load_engine()?;
    Ok((project, engine))
}

/// Like [`open_engine`], but takes the project write lock first. Keep the
/// lock alive until the changed stores are saved.
pub(super) fn open_engine_for_write(
    output: &Output,
    context: &str,
) -> Result<(Project, WriteLock, SharedHierarchy<UnitCatalog>)> {
    let project = Project::open_current()?;
    output.verbose_ctx(
        context,
        &format!("Opened project at: {}", project.root().display()),
    );

    let lock = project.lock_for_write()?;
    let engine = project.load_engine()?;
    Ok((project, lock, engine))
}

/// Turns a reported violation into the command's failure
fn finish(violation: Option<InvariantViolation>) -> Result<()> {
    match violation {
        Some(violation) => Err(violation.into()),
        None => Ok(()),
    }
}

fn owned(units: Vec<&Unit>) -> Vec<Unit> {
    units.into_iter().cloned().collect()
}

fn violation_json(violation: &Option<InvariantViolation>) -> serde_json::Value {
    violation
        .as_ref()
        .map(|v| json!(v.to_string()))
        .unwrap_or(serde_json::Value::Null)
}

/// Show the direct parent of a unit on a date
pub fn parent(output: &Output, unit: &UnitId, at: NaiveDate) -> Result<()> {
    let (_, engine) = open_engine(output, "parent")?;

    let parent = engine.read(|nav| nav.parent_at(unit, at).map(|p| p.cloned()))??;

    if output.is_json() {
        output.data(&json!({
            "unit": unit,
            "at": at,
            "parent": parent,
        }));
    } else {
        match parent {
            Some(parent) => println!("{} ({})", parent.name, parent.id),
            None => println!("{} has no parent on {}", unit, at),
        }
    }

    Ok(())
}

/// Show the ancestor chain of a unit, root first
pub fn path(output: &Output, unit: &UnitId, at: NaiveDate) -> Result<()> {
    let (_, engine) = open_engine(output, "path")?;

    let Partial { value, violation } =
        engine.read(|nav| nav.ancestor_path_at(unit, at).map(|p| p.map(owned)))??;

    if output.is_json() {
        output.data(&json!({
            "unit": unit,
            "at": at,
            "path": value,
            "violation": violation_json(&violation),
        }));
    } else {
        for (level, ancestor) in value.iter().enumerate() {
            println!("{}{} ({})", "  ".repeat(level), ancestor.name, ancestor.id);
        }
    }

    finish(violation)
}

/// Show the nesting depth of a unit
pub fn level(output: &Output, unit: &UnitId, at: NaiveDate) -> Result<()> {
    let (_, engine) = open_engine(output, "level")?;

    let Partial { value, violation } = engine.read(|nav| nav.level_at(unit, at))??;

    if output.is_json() {
        output.data(&json!({
            "unit": unit,
            "at": at,
            "level": value,
            "violation": violation_json(&violation),
        }));
    } else {
        println!("{}", value);
    }

    finish(violation)
}

/// Show the full lineage name of a unit
pub fn lineage(output: &Output, unit: &UnitId, at: Option<NaiveDate>, separator: Option<&str>) -> Result<()> {
    let (project, engine) = open_engine(output, "lineage")?;
    let separator = separator.unwrap_or(&project.config().project.lineage_separator);
    output.verbose_ctx("lineage", &format!("Joining names with {:?}", separator));

    let Partial { value, violation } =
        engine.read(|nav| nav.lineage_name_at(unit, at, separator))??;

    if output.is_json() {
        output.data(&json!({
            "unit": unit,
            "at": at,
            "lineage": value,
            "violation": violation_json(&violation),
        }));
    } else {
        println!("{}", value);
    }

    finish(violation)
}

/// List the direct children of a unit on a date
pub fn children(output: &Output, unit: &UnitId, at: NaiveDate) -> Result<()> {
    let (_, engine) = open_engine(output, "children")?;

    let children = engine.read(|nav| nav.children_at(unit, at).map(owned))??;
    output.verbose_ctx("children", &format!("Found {} children", children.len()));

    if output.is_json() {
        output.data(&children);
    } else if children.is_empty() {
        println!("{} has no children on {}", unit, at);
    } else {
        println!("{:<24} NAME", "ID");
        println!("{}", "-".repeat(60));
        for child in children {
            println!("{:<24} {}", child.id, child.name);
        }
    }

    Ok(())
}

/// List every unit below a unit on a date, breadth first
pub fn descendants(output: &Output, unit: &UnitId, at: NaiveDate) -> Result<()> {
    let (_, engine) = open_engine(output, "descendants")?;

    let (rows, violation) = engine.read(|nav| -> Result<_, HierarchyError> {
        let mut rows = Vec::new();
        for item in nav.descendants_at(unit, at)? {
            match item {
                Ok(descendant) => rows.push((descendant.unit.clone(), descendant.depth)),
                Err(violation) => return Ok((rows, Some(violation))),
            }
        }
        Ok((rows, None))
    })??;

    if output.is_json() {
        let items: Vec<_> = rows
            .iter()
            .map(|(unit, depth)| {
                json!({
                    "id": unit.id,
                    "name": unit.name,
                    "depth": depth,
                })
            })
            .collect();
        output.data(&json!({
            "unit": unit,
            "at": at,
            "descendants": items,
            "violation": violation_json(&violation),
        }));
    } else if rows.is_empty() && violation.is_none() {
        println!("{} has no descendants on {}", unit, at);
    } else {
        for (descendant, depth) in &rows {
            println!("{}{} ({})", "  ".repeat(depth.saturating_sub(1)), descendant.name, descendant.id);
        }
    }

    finish(violation)
}

/// List units with no parent on a date
pub fn roots(output: &Output, at: NaiveDate) -> Result<()> {
    let (_, engine) = open_engine(output, "roots")?;

    let Partial { value, violation } = engine.read(|nav| nav.top_level_at(at).map(owned))?;

    if output.is_json() {
        output.data(&json!({
            "at": at,
            "roots": value,
            "violation": violation_json(&violation),
        }));
    } else if value.is_empty() {
        println!("No top-level units on {}", at);
    } else {
        for root in &value {
            println!("{:<24} {}", root.id, root.name);
        }
    }

    finish(violation)
}

/// Verify the stored hierarchy: no overlapping intervals per unit and no
/// cycles on any date
pub fn audit(output: &Output) -> Result<()> {
    let (_, engine) = open_engine(output, "audit")?;

    let report = engine.read(|nav| audit_index(nav.index()))?;

    if output.is_json() {
        output.data(&report);
    } else {
        println!(
            "Checked {} edges at {} dates",
            report.edges_checked, report.instants_checked
        );
        for overlap in &report.overlaps {
            println!(
                "OVERLAP  {}: {} and {} both active from {}",
                overlap.child, overlap.first, overlap.second, overlap.from
            );
        }
        for cycle in &report.cycles {
            let units: Vec<_> = cycle.units.iter().map(UnitId::as_str).collect();
            println!("CYCLE    {}: {}", cycle.at, units.join(" -> "));
        }
        if report.is_clean() {
            println!("No violations found.");
        }
    }

    if !report.is_clean() {
        bail!(
            "Audit found {} violation(s)",
            report.overlaps.len() + report.cycles.len()
        );
    }

    Ok(())
}

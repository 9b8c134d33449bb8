//! Edge CLI commands and reparenting
//!
//! Every write goes through the engine's validating writer and is
//! persisted only after it succeeds.

use anyhow::Result;
use chrono::NaiveDate;
use clap::Subcommand;
use serde_json::json;

use super::output::Output;
use super::query::{open_engine, open_engine_for_write};
use crate::domain::{EdgeId, UnitId};

#[derive(Subcommand)]
pub enum EdgeCommands {
    /// Place a unit under a parent for a period
    ///
    /// Examples:
    ///   echelon edge add 2nd-bde 1st-div --from 1805-01-01
    ///   echelon edge add 2nd-bde 1st-div --from 1805-01-01 --until 1807-06-01
    Add {
        /// Child unit ID
        child: UnitId,

        /// Parent unit ID
        parent: UnitId,

        /// First day of the assignment (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,

        /// First day the assignment no longer holds (omit for open)
        #[arg(long)]
        until: Option<NaiveDate>,
    },

    /// Close an open edge
    Close {
        /// Edge ID (e.g. e-3)
        edge: EdgeId,

        /// First day the assignment no longer holds
        #[arg(long)]
        at: NaiveDate,
    },

    /// Delete an edge recorded in error
    Remove {
        /// Edge ID (e.g. e-3)
        edge: EdgeId,
    },

    /// Show the parent history of a unit
    History {
        /// Unit ID
        unit: UnitId,

        /// Show the units that served under it instead
        #[arg(long)]
        as_parent: bool,
    },
}

pub fn run(cmd: EdgeCommands, output: &Output) -> Result<()> {
    match cmd {
        EdgeCommands::Add {
            child,
            parent,
            from,
            until,
        } => add_edge(output, &child, &parent, from, until),
        EdgeCommands::Close { edge, at } => close_edge(output, edge, at),
        EdgeCommands::Remove { edge } => remove_edge(output, edge),
        EdgeCommands::History { unit, as_parent } => {
            if as_parent {
                children_history(output, &unit)
            } else {
                parent_history(output, &unit)
            }
        }
    }
}

fn add_edge(
    output: &Output,
    child: &UnitId,
    parent: &UnitId,
    from: NaiveDate,
    until: Option<NaiveDate>,
) -> Result<()> {
    let (project, _lock, engine) = open_engine_for_write(output, "edge")?;

    let edge = engine.write(|w| {
        let id = w.add_edge(child, parent, from, until)?;
        Ok(w.index().edge(id).cloned())
    })?;
    project.save_edges(&engine.index_snapshot()?)?;

    match edge {
        Some(edge) if output.is_json() => output.data(&edge),
        Some(edge) => output.success(&format!("Added edge {}: {} under {} from {}", edge.id, child, parent, from)),
        None => output.success(&format!("Added edge: {} under {} from {}", child, parent, from)),
    }

    Ok(())
}

fn close_edge(output: &Output, edge: EdgeId, at: NaiveDate) -> Result<()> {
    let (project, _lock, engine) = open_engine_for_write(output, "edge")?;

    let closed = engine.write(|w| w.close_edge(edge, at))?;
    project.save_edges(&engine.index_snapshot()?)?;

    if output.is_json() {
        output.data(&closed);
    } else {
        output.success(&format!("Closed edge {} ({} under {}) at {}", closed.id, closed.child, closed.parent, at));
    }

    Ok(())
}

fn remove_edge(output: &Output, edge: EdgeId) -> Result<()> {
    let (project, _lock, engine) = open_engine_for_write(output, "edge")?;

    let removed = engine.write(|w| w.remove_edge(edge))?;
    project.save_edges(&engine.index_snapshot()?)?;

    if output.is_json() {
        output.data(&removed);
    } else {
        output.success(&format!("Removed edge {} ({} under {})", removed.id, removed.child, removed.parent));
    }

    Ok(())
}

/// Move a unit under a new parent from a date on
pub fn reparent(output: &Output, child: &UnitId, new_parent: &UnitId, at: NaiveDate) -> Result<()> {
    let (project, _lock, engine) = open_engine_for_write(output, "reparent")?;

    let outcome = engine.write(|w| w.reparent(child, new_parent, at))?;
    project.save_edges(&engine.index_snapshot()?)?;

    if output.is_json() {
        output.data(&json!({
            "child": child,
            "parent": new_parent,
            "at": at,
            "closed": outcome.closed,
            "opened": outcome.opened,
        }));
    } else {
        let closed = outcome
            .closed
            .map(|id| format!(", closed {}", id))
            .unwrap_or_default();
        output.success(&format!(
            "Moved {} under {} from {} (opened {}{})",
            child, new_parent, at, outcome.opened, closed
        ));
    }

    Ok(())
}

fn parent_history(output: &Output, unit: &UnitId) -> Result<()> {
    let (_, engine) = open_engine(output, "history")?;

    let edges = engine.read(|nav| -> Result<_> {
        nav.unit(unit)?;
        Ok(nav.index().edges_for(unit).to_vec())
    })??;

    if output.is_json() {
        output.data(&edges);
    } else if edges.is_empty() {
        println!("{} has never had a parent", unit);
    } else {
        println!("{:<8} {:<10} {:<10} PARENT", "EDGE", "FROM", "UNTIL");
        println!("{}", "-".repeat(60));
        for edge in &edges {
            let until = edge.end().map(|d| d.to_string()).unwrap_or_else(|| "open".to_string());
            println!("{:<8} {:<10} {:<10} {}", edge.id, edge.start(), until, edge.parent);
        }
    }

    Ok(())
}

fn children_history(output: &Output, unit: &UnitId) -> Result<()> {
    let (_, engine) = open_engine(output, "history")?;

    let rows = engine.read(|nav| -> Result<_> {
        Ok(nav
            .children_history(unit)?
            .into_iter()
            .map(|(child, validity)| (child.clone(), validity))
            .collect::<Vec<_>>())
    })??;

    if output.is_json() {
        let items: Vec<_> = rows
            .iter()
            .map(|(child, validity)| {
                json!({
                    "child": child,
                    "start_date": validity.start(),
                    "end_date": validity.end(),
                })
            })
            .collect();
        output.data(&items);
    } else if rows.is_empty() {
        println!("No unit has ever served under {}", unit);
    } else {
        println!("{:<24} {:<10} {:<10} NAME", "CHILD", "FROM", "UNTIL");
        println!("{}", "-".repeat(72));
        for (child, validity) in &rows {
            let until = validity.end().map(|d| d.to_string()).unwrap_or_else(|| "open".to_string());
            println!("{:<24} {:<10} {:<10} {}", child.id, validity.start(), until, child.name);
        }
    }

    Ok(())
}

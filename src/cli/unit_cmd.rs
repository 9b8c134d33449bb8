//! Unit CLI commands

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::Subcommand;
use serde_json::json;

use super::output::Output;
use super::query::{open_engine, open_engine_for_write};
use crate::domain::{Unit, UnitId, UnitRegistry};
use crate::storage::Project;

#[derive(Subcommand)]
pub enum UnitCommands {
    /// Register a unit
    ///
    /// Examples:
    ///   echelon unit add 1st-corps "I Corps" --level 2 --kind infantry
    ///   echelon unit add 33rd "33rd Regiment of Foot" --formed 1702-03-12
    Add {
        /// Unit ID (lowercase letters, digits, '-' and '_')
        id: UnitId,

        /// Display name
        name: String,

        /// Coarse rank, independent of position in the hierarchy
        #[arg(long)]
        level: Option<u32>,

        /// Branch or type (infantry, cavalry, ...)
        #[arg(long)]
        kind: Option<String>,

        /// Formation date (YYYY-MM-DD)
        #[arg(long)]
        formed: Option<NaiveDate>,

        /// Dissolution date (YYYY-MM-DD)
        #[arg(long)]
        dissolved: Option<NaiveDate>,
    },

    /// List registered units
    List,

    /// Show unit details and its parent history
    Show {
        /// Unit ID
        id: UnitId,

        /// Also resolve parent, level and lineage on this date
        #[arg(long)]
        at: Option<NaiveDate>,
    },

    /// Remove a unit and every edge that references it
    Remove {
        /// Unit ID
        id: UnitId,
    },
}

pub fn run(cmd: UnitCommands, output: &Output) -> Result<()> {
    match cmd {
        UnitCommands::Add {
            id,
            name,
            level,
            kind,
            formed,
            dissolved,
        } => {
            let mut unit = Unit::new(id, name).with_service(formed, dissolved);
            if let Some(level) = level {
                unit = unit.with_level_hint(level);
            }
            if let Some(kind) = kind {
                unit = unit.with_kind(kind);
            }
            add_unit(output, unit)
        }
        UnitCommands::List => list_units(output),
        UnitCommands::Show { id, at } => show_unit(output, &id, at),
        UnitCommands::Remove { id } => remove_unit(output, &id),
    }
}

fn add_unit(output: &Output, unit: Unit) -> Result<()> {
    if unit.name.is_empty() {
        bail!("Unit name cannot be empty");
    }
    if let (Some(formed), Some(dissolved)) = (unit.formed, unit.dissolved) {
        if dissolved <= formed {
            bail!(
                "Dissolution date {} must be after formation date {}",
                dissolved,
                formed
            );
        }
    }

    let project = Project::open_current()?;
    let _lock = project.lock_for_write()?;
    let catalog = project.load_catalog()?;

    if catalog.unit_exists(&unit.id) {
        bail!("Unit already exists: {}", unit.id);
    }

    project.unit_store().append(&unit)?;
    output.verbose_ctx("unit", &format!("Appended {} to {}", unit.id, project.unit_store().path().display()));

    if output.is_json() {
        output.data(&unit);
    } else {
        output.success(&format!("Added unit {}: {}", unit.id, unit.name));
    }

    Ok(())
}

fn list_units(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let catalog = project.load_catalog()?;

    if output.is_json() {
        let units: Vec<&Unit> = catalog.iter().collect();
        output.data(&units);
        return Ok(());
    }

    if catalog.is_empty() {
        println!("No units registered.");
        return Ok(());
    }

    println!("{:<24} {:<6} {:<12} NAME", "ID", "LEVEL", "KIND");
    println!("{}", "-".repeat(72));
    for unit in catalog.iter() {
        let level = unit.level_hint.map(|l| l.to_string()).unwrap_or_default();
        println!(
            "{:<24} {:<6} {:<12} {}",
            unit.id,
            level,
            unit.kind.as_deref().unwrap_or(""),
            unit.name
        );
    }

    Ok(())
}

fn show_unit(output: &Output, id: &UnitId, at: Option<NaiveDate>) -> Result<()> {
    let (project, engine) = open_engine(output, "unit")?;
    let separator = project.config().project.lineage_separator.clone();

    let (unit, history, snapshot) = engine.read(|nav| -> Result<_> {
        let unit = nav.unit(id)?.clone();
        let history = nav.index().edges_for(id).to_vec();

        let snapshot = match at {
            Some(date) => {
                let parent = nav.parent_at(id, date)?.cloned();
                let level = nav.level_at(id, date)?;
                let lineage = nav.lineage_name_at(id, Some(date), &separator)?;
                Some((date, parent, level, lineage))
            }
            None => None,
        };

        Ok((unit, history, snapshot))
    })??;

    let violation = snapshot
        .as_ref()
        .and_then(|(_, _, level, lineage)| level.violation.clone().or_else(|| lineage.violation.clone()));

    if output.is_json() {
        let at_json = snapshot.as_ref().map(|(date, parent, level, lineage)| {
            json!({
                "date": date,
                "parent": parent,
                "level": level.value,
                "lineage": lineage.value,
            })
        });
        output.data(&json!({
            "unit": unit,
            "edges": history,
            "at": at_json,
            "violation": violation.as_ref().map(ToString::to_string),
        }));
    } else {
        println!("ID:        {}", unit.id);
        println!("Name:      {}", unit.name);
        if let Some(kind) = &unit.kind {
            println!("Kind:      {}", kind);
        }
        println!("Rank:      {}", unit.rank_level());
        if let Some(formed) = unit.formed {
            println!("Formed:    {}", formed);
        }
        if let Some(dissolved) = unit.dissolved {
            println!("Dissolved: {}", dissolved);
        }

        if let Some((date, parent, level, lineage)) = &snapshot {
            println!();
            println!("On {}:", date);
            match parent {
                Some(parent) => println!("  Parent:  {} ({})", parent.name, parent.id),
                None => println!("  Parent:  (none)"),
            }
            println!("  Level:   {}", level.value);
            println!("  Lineage: {}", lineage.value);
        }

        if !history.is_empty() {
            println!();
            println!("Parent history:");
            for edge in &history {
                let end = edge.end().map(|d| d.to_string()).unwrap_or_else(|| "open".to_string());
                println!("  {:<8} {} .. {:<10} {}", edge.id, edge.start(), end, edge.parent);
            }
        }
    }

    match violation {
        Some(violation) => Err(violation.into()),
        None => Ok(()),
    }
}

fn remove_unit(output: &Output, id: &UnitId) -> Result<()> {
    let (project, _lock, engine) = open_engine_for_write(output, "unit")?;

    let removed = engine.retire_unit(id, |catalog, id| {
        catalog.remove(id);
    })?;

    let (catalog, index) = engine.into_parts()?;
    // Edges first, so an interrupted removal never leaves edges to a missing unit
    project.save_edges(&index)?;
    project.save_catalog(&catalog)?;

    if output.is_json() {
        output.data(&json!({
            "removed": id,
            "edges_removed": removed,
        }));
    } else {
        output.success(&format!("Removed unit {} ({} edges detached)", id, removed.len()));
    }

    Ok(())
}

//! Main CLI application structure

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use super::output::{Output, OutputFormat};
use super::{edge_cmd, logging, query, unit_cmd};
use crate::domain::UnitId;
use crate::storage::{Config, Project};

#[derive(Parser)]
#[command(name = "echelon")]
#[command(author, version, about = "Time-aware organizational hierarchies")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new echelon project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Manage units
    #[command(subcommand)]
    Unit(unit_cmd::UnitCommands),

    /// Manage hierarchy edges
    #[command(subcommand)]
    Edge(edge_cmd::EdgeCommands),

    /// Move a unit under a new parent from a date on
    Reparent {
        /// Unit to move
        child: UnitId,

        /// Its new parent
        new_parent: UnitId,

        /// Effective date (YYYY-MM-DD)
        #[arg(long)]
        at: NaiveDate,
    },

    /// Show the direct parent of a unit
    Parent {
        unit: UnitId,

        #[arg(long)]
        at: NaiveDate,
    },

    /// Show the chain of command from the top down to a unit
    Path {
        unit: UnitId,

        #[arg(long)]
        at: NaiveDate,
    },

    /// Show how deeply a unit is nested (top level is 0)
    Level {
        unit: UnitId,

        #[arg(long)]
        at: NaiveDate,
    },

    /// Show the full name of a unit, built from its ancestors
    Lineage {
        unit: UnitId,

        /// Without a date only the unit's own name is printed
        #[arg(long)]
        at: Option<NaiveDate>,

        /// Separator between names (overrides config)
        #[arg(long)]
        separator: Option<String>,
    },

    /// List the direct children of a unit
    Children {
        unit: UnitId,

        #[arg(long)]
        at: NaiveDate,
    },

    /// List every unit below a unit, breadth first
    Descendants {
        unit: UnitId,

        #[arg(long)]
        at: NaiveDate,
    },

    /// List top-level units
    Roots {
        #[arg(long)]
        at: NaiveDate,
    },

    /// Check stored edges for overlaps and cycles
    Audit,
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    let level = logging::effective_level(cli.verbose, config.project.log_level.as_deref()).to_string();
    let _logger = logging::init_logging(&level)?;

    let format = cli
        .format
        .unwrap_or_else(|| OutputFormat::from(config.global.default_format));
    let output = Output::new(format);

    output.verbose_ctx("cli", &format!("echelon starting, log level {}", level));

    match cli.command {
        Commands::Init { path } => {
            output.verbose_ctx("init", &format!("Initializing project at: {}", path));
            let project = Project::init(&path)?;
            output.verbose_ctx("init", &format!("Created data directory at: {}", project.data_dir().display()));
            output.success(&format!("Initialized echelon project at {}", project.root().display()));
        }

        Commands::Unit(cmd) => unit_cmd::run(cmd, &output)?,
        Commands::Edge(cmd) => edge_cmd::run(cmd, &output)?,

        Commands::Reparent { child, new_parent, at } => edge_cmd::reparent(&output, &child, &new_parent, at)?,

        Commands::Parent { unit, at } => query::parent(&output, &unit, at)?,
        Commands::Path { unit, at } => query::path(&output, &unit, at)?,
        Commands::Level { unit, at } => query::level(&output, &unit, at)?,
        Commands::Lineage { unit, at, separator } => {
            query::lineage(&output, &unit, at, separator.as_deref())?
        }
        Commands::Children { unit, at } => query::children(&output, &unit, at)?,
        Commands::Descendants { unit, at } => query::descendants(&output, &unit, at)?,
        Commands::Roots { at } => query::roots(&output, at)?,
        Commands::Audit => query::audit(&output)?,
    }

    Ok(())
}

//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Project management | `init`, `audit` |
//! | Unit | Unit registry | `unit add`, `unit list`, `unit show` |
//! | Edge | Hierarchy changes | `edge add`, `edge close`, `reparent` |
//! | Query | Point-in-time views | `parent`, `path`, `lineage`, `roots` |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug logging on stderr:
//! ```bash
//! echelon --verbose path 2nd-bde --at 1806-10-14
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod edge_cmd;
mod logging;
mod output;
mod query;
mod unit_cmd;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};

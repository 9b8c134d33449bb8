//! # Storage Layer
//!
//! Persistence for echelon projects with git-friendly file formats.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Units | JSONL (one JSON per line) | `.echelon/units.jsonl` |
//! | Edges | JSONL (one JSON per line) | `.echelon/edges.jsonl` |
//! | Config | TOML | `.echelon/config.toml` |
//!
//! ## Concurrency Safety
//!
//! - [`JsonlStore`] takes a shared `fs2` lock to read and an exclusive one to write
//! - All rewrites are atomic (temp file + rename)
//!
//! ## Key Types
//!
//! - [`Project`] - Entry point for accessing an echelon project
//! - [`UnitStore`] / [`EdgeStore`] - Read/write units and edges as JSONL
//! - [`Config`] - Project and global configuration

mod config;
mod jsonl;
mod project;

pub use config::{Config, ConfigError, GlobalConfig, OutputFormat, ProjectConfig, PROJECT_DIR};
pub use jsonl::{EdgeStore, JsonlStore, Record, UnitStore};
pub use project::{Project, ProjectError, WriteLock};

//! Project management
//!
//! Handles project initialization and turns the stores into a loaded
//! engine.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use log::debug;
use thiserror::Error;

use super::config::PROJECT_DIR;
use super::{Config, EdgeStore, UnitStore};
use crate::domain::{SharedHierarchy, UnitCatalog, ValidityIndex};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Project already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("Not in an echelon project. Run 'echelon init' first.")]
    NotInProject,

    #[error("Failed to create project: {0}")]
    CreateFailed(String),
}

const DEFAULT_CONFIG: &str = r#"# echelon configuration

# Separator between unit names in lineage output
lineage_separator = " — "

# Maximum ancestor/descendant walk before reporting corrupt data
max_walk_depth = 100

# Maximum ancestor walk while checking a new edge for cycles
guard_depth = 256

# Log filter (error, warn, info, debug, trace)
# log_level = "warn"
"#;

const LOCK_FILE: &str = "lock";

/// Exclusive hold on a project's stores across processes, taken before a
/// write command loads anything and released on drop
#[derive(Debug)]
pub struct WriteLock {
    _file: File,
}

/// An echelon project on disk
#[derive(Debug)]
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.join(PROJECT_DIR).is_dir() {
            return Err(ProjectError::NotInProject.into());
        }

        let config = Config::for_project(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the project at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_project_root().ok_or(ProjectError::NotInProject)?;

        Self::open(root)
    }

    /// Initializes a new project at the given path
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let data_dir = root.join(PROJECT_DIR);

        if data_dir.join("units.jsonl").exists() {
            return Err(ProjectError::AlreadyExists(root).into());
        }

        fs::create_dir_all(&data_dir)
            .map_err(|e| ProjectError::CreateFailed(e.to_string()))
            .with_context(|| format!("Failed to create {} directory: {}", PROJECT_DIR, data_dir.display()))?;

        let config_path = data_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        // Empty stores so the project is recognizable as initialized
        let stores = [
            UnitStore::for_project(&root).path().to_path_buf(),
            EdgeStore::for_project(&root).path().to_path_buf(),
        ];
        for store in &stores {
            if !store.exists() {
                fs::write(store, "").with_context(|| format!("Failed to create {}", store.display()))?;
            }
        }

        let gitignore_path = data_dir.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(&gitignore_path, "# Leftovers from interrupted writes\n*.tmp\nlock\n").with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        debug!("event=project_initialized root={}", root.display());
        Self::open(root)
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .echelon directory path
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the unit store
    pub fn unit_store(&self) -> UnitStore {
        UnitStore::for_project(&self.root)
    }

    /// Returns the edge store
    pub fn edge_store(&self) -> EdgeStore {
        EdgeStore::for_project(&self.root)
    }

    /// Blocks until no other process is writing to this project.
    ///
    /// The per-store locks only cover a single read or rewrite; this one is
    /// held from loading through saving so a concurrent command cannot
    /// validate against a stale snapshot and overwrite a committed change.
    pub fn lock_for_write(&self) -> Result<WriteLock> {
        let path = self.data_dir().join(LOCK_FILE);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to open lock file: {}", path.display()))?;

        file.lock_exclusive()
            .with_context(|| format!("Failed to acquire project write lock: {}", path.display()))?;
        debug!("event=write_lock_acquired path={}", path.display());

        Ok(WriteLock { _file: file })
    }

    /// Loads all registered units
    pub fn load_catalog(&self) -> Result<UnitCatalog> {
        Ok(UnitCatalog::from_units(self.unit_store().read_all()?))
    }

    /// Loads persisted edges as-is. Overlaps or cycles in the stored data
    /// are reported by queries and `audit`, not here.
    pub fn load_index(&self) -> Result<ValidityIndex> {
        let edges = self.edge_store().read_all()?;
        ValidityIndex::from_edges(edges)
            .with_context(|| format!("Invalid edge in {}", self.edge_store().path().display()))
    }

    /// Loads units and edges into a shared engine using the configured
    /// depth bounds
    pub fn load_engine(&self) -> Result<SharedHierarchy<UnitCatalog>> {
        let catalog = self.load_catalog()?;
        let index = self.load_index()?;
        debug!(
            "event=engine_loaded units={} edges={}",
            catalog.len(),
            index.len()
        );
        Ok(SharedHierarchy::new(catalog, index, self.config.project.limits()))
    }

    /// Persists the full unit catalog
    pub fn save_catalog(&self, catalog: &UnitCatalog) -> Result<()> {
        self.unit_store().write_all(catalog.iter())
    }

    /// Persists every edge of the index
    pub fn save_edges(&self, index: &ValidityIndex) -> Result<()> {
        self.edge_store().write_all(index.edges())
    }
}

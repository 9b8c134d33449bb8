//! JSONL storage for units and edges
//!
//! Units live in `.echelon/units.jsonl` and edges in `.echelon/edges.jsonl`,
//! one JSON object per line. Uses file locking for concurrent access
//! safety.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::{EdgeId, HierarchyEdge, Unit, UnitId};

/// A record stored one-per-line, identified by a key
pub trait Record: Serialize + DeserializeOwned {
    type Key: Ord + Clone + Display;

    /// Singular noun used in error messages
    const KIND: &'static str;

    fn key(&self) -> Self::Key;
}

impl Record for Unit {
    type Key = UnitId;
    const KIND: &'static str = "unit";

    fn key(&self) -> UnitId {
        self.id.clone()
    }
}

impl Record for HierarchyEdge {
    type Key = EdgeId;
    const KIND: &'static str = "edge";

    fn key(&self) -> EdgeId {
        self.id
    }
}

/// Store for records in JSONL format
pub struct JsonlStore<T: Record> {
    path: PathBuf,
    _record: PhantomData<T>,
}

pub type UnitStore = JsonlStore<Unit>;
pub type EdgeStore = JsonlStore<HierarchyEdge>;

impl UnitStore {
    /// Creates the default unit store for a project
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(project_root.join(".echelon").join("units.jsonl"))
    }
}

impl EdgeStore {
    /// Creates the default edge store for a project
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(project_root.join(".echelon").join("edges.jsonl"))
    }
}

impl<T: Record> JsonlStore<T> {
    /// Creates a new store at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    /// Returns the path to the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads all records, ordered by key. A key that appears on several
    /// lines resolves to its last line.
    pub fn read_all(&self) -> Result<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open {} store: {}", T::KIND, self.path.display()))?;

        // Acquire shared lock for reading
        file.lock_shared()
            .with_context(|| format!("Failed to acquire read lock on {} store", T::KIND))?;

        let reader = BufReader::new(&file);
        let mut records = BTreeMap::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read line {}", line_num + 1))?;

            if line.trim().is_empty() {
                continue;
            }

            let record: T = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse {} at line {}", T::KIND, line_num + 1))?;

            records.insert(record.key(), record);
        }

        // Lock is released when file is dropped
        Ok(records.into_values().collect())
    }

    /// Writes all records to the store (full rewrite, sorted by key)
    pub fn write_all<'a>(&self, records: impl IntoIterator<Item = &'a T>) -> Result<()>
    where
        T: 'a,
    {
        self.ensure_parent_dir()?;

        // Write to temp file first
        let temp_path = self.path.with_extension("jsonl.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            // Acquire exclusive lock
            file.lock_exclusive()
                .with_context(|| format!("Failed to acquire write lock on {} store", T::KIND))?;

            let mut writer = BufWriter::new(&file);

            let mut sorted: Vec<&T> = records.into_iter().collect();
            sorted.sort_by_key(|r| r.key());

            for record in sorted {
                let line = serde_json::to_string(record)
                    .with_context(|| format!("Failed to serialize {}", T::KIND))?;
                writeln!(writer, "{}", line).with_context(|| format!("Failed to write {}", T::KIND))?;
            }

            writer
                .flush()
                .with_context(|| format!("Failed to flush {} store", T::KIND))?;
        }

        // Atomic rename
        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }

    /// Appends a single record without rewriting the file
    pub fn append(&self, record: &T) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {} store: {}", T::KIND, self.path.display()))?;

        file.lock_exclusive()
            .with_context(|| format!("Failed to acquire write lock on {} store", T::KIND))?;

        let mut writer = BufWriter::new(&file);
        let line = serde_json::to_string(record)
            .with_context(|| format!("Failed to serialize {}", T::KIND))?;
        writeln!(writer, "{}", line).with_context(|| format!("Failed to write {}", T::KIND))?;

        writer
            .flush()
            .with_context(|| format!("Failed to flush {} store", T::KIND))?;

        Ok(())
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        Ok(())
    }
}

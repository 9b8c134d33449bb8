//! Configuration handling for echelon
//!
//! Configuration is stored in `.echelon/config.toml` (project) and
//! `~/.config/echelon/config.toml` (global).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{EngineLimits, DEFAULT_GUARD_DEPTH, DEFAULT_WALK_DEPTH};

/// Name of the per-project data directory
pub const PROJECT_DIR: &str = ".echelon";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Project-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Joins unit names in `lineage` output
    pub lineage_separator: String,

    /// Bound for ancestor and descendant walks
    pub max_walk_depth: usize,

    /// Bound for the cycle check on every write
    pub guard_depth: usize,

    /// Log filter, e.g. "info" or "echelon=debug"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            lineage_separator: " — ".to_string(),
            max_walk_depth: DEFAULT_WALK_DEPTH,
            guard_depth: DEFAULT_GUARD_DEPTH,
            log_level: None,
        }
    }
}

impl ProjectConfig {
    /// Rejects bounds that would make every walk fail
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_walk_depth == 0 {
            return Err(ConfigError::Invalid("max_walk_depth must be at least 1".to_string()));
        }
        if self.guard_depth == 0 {
            return Err(ConfigError::Invalid("guard_depth must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Depth bounds handed to the engine
    pub fn limits(&self) -> EngineLimits {
        EngineLimits {
            walk_depth: self.max_walk_depth,
            guard_depth: self.guard_depth,
        }
    }
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Output format used when `--format` is not given
    pub default_format: OutputFormat,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from default locations
    pub fn load() -> Result<Self> {
        let global = Self::load_global()?;
        let (project, project_root) = Self::load_project()?;

        Ok(Self {
            project,
            global,
            project_root,
        })
    }

    /// Loads configuration for a specific project
    pub fn for_project(project_root: &Path) -> Result<Self> {
        let global = Self::load_global()?;
        let project = Self::load_project_config(project_root)?;

        Ok(Self {
            project,
            global,
            project_root: Some(project_root.to_path_buf()),
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "echelon", "echelon").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration
    fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Finds and loads project configuration
    fn load_project() -> Result<(ProjectConfig, Option<PathBuf>)> {
        match Self::find_project_root() {
            Some(root) => {
                let config = Self::load_project_config(&root)?;
                Ok((config, Some(root)))
            }
            None => Ok((ProjectConfig::default(), None)),
        }
    }

    /// Loads and validates project configuration from a specific root
    fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
        let config_path = project_root.join(PROJECT_DIR).join("config.toml");

        if !config_path.exists() {
            return Ok(ProjectConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read project config: {}", config_path.display()))?;

        Self::parse_project_config(&content).context("Failed to parse project config")
    }

    fn parse_project_config(content: &str) -> Result<ProjectConfig, ConfigError> {
        let config: ProjectConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Finds the project root by looking for `.echelon/` in the current
    /// directory or any parent
    pub fn find_project_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        Self::find_project_root_from(&current)
    }

    /// Same as [`Config::find_project_root`], starting at `start`
    pub fn find_project_root_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Returns true if we're in an echelon project
    pub fn is_in_project(&self) -> bool {
        self.project_root.is_some()
    }

    /// Returns the project root, or an error if not in a project
    pub fn require_project_root(&self) -> Result<&Path> {
        self.project_root
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Not in an echelon project. Run 'echelon init' first."))
    }

    /// Saves the project configuration
    pub fn save_project(&self) -> Result<()> {
        let root = self.require_project_root()?;
        let config_path = root.join(PROJECT_DIR).join("config.toml");

        let content =
            toml::to_string_pretty(&self.project).context("Failed to serialize project config")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write project config: {}", config_path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let config = Config {
            project: ProjectConfig::default(),
            global: GlobalConfig::default(),
            project_root: None,
        };

        assert_eq!(config.project.lineage_separator, " — ");
        assert_eq!(config.project.max_walk_depth, 100);
        assert_eq!(config.project.guard_depth, 256);
        assert_eq!(config.global.default_format, OutputFormat::Text);
    }

    #[test]
    fn parse_project_config() {
        let toml = r#"
lineage_separator = " / "
max_walk_depth = 12
log_level = "debug"
"#;

        let config = Config::parse_project_config(toml).unwrap();
        assert_eq!(config.lineage_separator, " / ");
        assert_eq!(config.max_walk_depth, 12);
        assert_eq!(config.guard_depth, 256);
        assert_eq!(config.log_level.as_deref(), Some("debug"));

        let limits = config.limits();
        assert_eq!(limits.walk_depth, 12);
        assert_eq!(limits.guard_depth, 256);
    }

    #[test]
    fn zero_depth_is_invalid() {
        let err = Config::parse_project_config("guard_depth = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_config_is_a_parse_error() {
        let err = Config::parse_project_config("max_walk_depth = \"deep\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn parse_global_config() {
        let config: GlobalConfig = toml::from_str("default_format = \"json\"").unwrap();
        assert_eq!(config.default_format, OutputFormat::Json);
    }

    #[test]
    fn find_project_root() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(PROJECT_DIR)).unwrap();

        let sub_dir = dir.path().join("sub").join("dir");
        fs::create_dir_all(&sub_dir).unwrap();

        let root = Config::find_project_root_from(&sub_dir);
        // Canonicalize both paths to handle macOS /var -> /private/var symlinks
        let expected = dir.path().canonicalize().ok();
        let actual = root.and_then(|p| p.canonicalize().ok());
        assert_eq!(actual, expected);
    }

    #[test]
    fn config_not_in_project() {
        let config = Config {
            project: ProjectConfig::default(),
            global: GlobalConfig::default(),
            project_root: None,
        };

        assert!(!config.is_in_project());
        assert!(config.require_project_root().is_err());
    }

    #[test]
    fn save_and_reload_project_config() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(PROJECT_DIR)).unwrap();

        let mut config = Config::for_project(dir.path()).unwrap();
        config.project.max_walk_depth = 7;
        config.save_project().unwrap();

        let reloaded = Config::for_project(dir.path()).unwrap();
        assert_eq!(reloaded.project.max_walk_depth, 7);
    }
}

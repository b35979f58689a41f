//! Configuration handling for angreal
//!
//! Configuration is stored in `.angreal/config.toml` (project) and
//! `~/.config/angreal/config.toml` (global, platform dependent).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::project::MARKER_DIR;
use crate::venv::InstallerBackend;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Defaults for isolated environments declared by tasks
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct VenvConfig {
    /// Provisioning backend (auto, uv or pip)
    pub installer: InstallerBackend,

    /// Python version used when a task does not ask for one
    pub python: Option<String>,
}

/// Shell completion settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompletionConfig {
    /// Install the completion script on first task run
    pub auto_install: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self { auto_install: true }
    }
}

/// Project-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ProjectConfig {
    pub venv: VenvConfig,
    pub completion: CompletionConfig,
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct GlobalConfig {
    /// Directory holding downloaded templates (defaults to `~/.angrealrc`)
    pub template_cache: Option<PathBuf>,

    pub completion: CompletionConfig,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
}

impl Config {
    /// Loads global configuration plus the project's, if any
    pub fn for_project(project_root: &Path) -> Result<Self> {
        Ok(Self {
            project: Self::load_project_config(project_root)?,
            global: Self::load_global()?,
        })
    }

    /// Global configuration only, for commands run outside a project
    pub fn global_only() -> Result<Self> {
        Ok(Self {
            project: ProjectConfig::default(),
            global: Self::load_global()?,
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "angreal", "angreal").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Whether completion may be installed without being asked
    pub fn auto_install_completion(&self) -> bool {
        self.project.completion.auto_install && self.global.completion.auto_install
    }

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

    fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
        let config_path = project_root.join(MARKER_DIR).join("config.toml");

        if !config_path.exists() {
            return Ok(ProjectConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read project config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse project config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.project.venv.installer, InstallerBackend::Auto);
        assert!(config.auto_install_completion());
    }

    #[test]
    fn parse_project_config() {
        let toml = r#"
[venv]
installer = "pip"
python = "3.11"

[completion]
auto_install = false
"#;

        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.venv.installer, InstallerBackend::Pip);
        assert_eq!(config.venv.python.as_deref(), Some("3.11"));
        assert!(!config.completion.auto_install);
    }

    #[test]
    fn parse_global_config() {
        let config: GlobalConfig = toml::from_str("template_cache = \"/tmp/templates\"").unwrap();
        assert_eq!(config.template_cache, Some(PathBuf::from("/tmp/templates")));
        assert!(config.completion.auto_install);
    }

    #[test]
    fn missing_project_config_is_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_project_config(dir.path()).unwrap();
        assert_eq!(config, ProjectConfig::default());
    }

    #[test]
    fn broken_project_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(MARKER_DIR)).unwrap();
        fs::write(dir.path().join(MARKER_DIR).join("config.toml"), "[venv\n").unwrap();

        let err = Config::load_project_config(dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse project config"));
    }
}

//! Project management
//!
//! Locates the `.angreal/` marker directory, loads configuration and
//! scaffolds new projects.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use super::templates::copy_tree;
use super::Config;
use crate::engine::{discover, DiscoveryReport, TaskRegistry};
use crate::source::{LoaderSettings, TaskLoader};

/// Directory marking a project root
pub const MARKER_DIR: &str = ".angreal";

const DEFAULT_CONFIG: &str = r#"# angreal project configuration

[venv]
# Provisioning backend for task environments: auto, uv or pip
installer = "auto"

[completion]
# Install the shell completion script on first task run
auto_install = true
"#;

const EXAMPLE_TASK: &str = r#"# Files named task_*.toml in this directory declare commands.
# Run this one with: angreal hello --name you

[[command]]
name = "hello"
about = "Print a greeting"
run = 'echo "hello ${ANGREAL_ARG_NAME}"'

[[command.arg]]
name = "name"
long = "name"
default_value = "world"
help = "who to greet"
"#;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not in an angreal project: no .angreal directory in {} or its parents", .0.display())]
    NotFound(PathBuf),

    #[error("Project already exists at {} (use --force to overwrite)", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Template {} has no .angreal directory", .0.display())]
    InvalidTemplate(PathBuf),
}

/// An angreal project
#[derive(Debug)]
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.join(MARKER_DIR).is_dir() {
            return Err(ProjectError::NotFound(root).into());
        }

        let config = Config::for_project(&root)?;
        Ok(Self { root, config })
    }

    /// Opens the project at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let root = Self::find_root(&cwd).ok_or(ProjectError::NotFound(cwd))?;
        Self::open(root)
    }

    /// Walks from `start` up to the filesystem root looking for the marker
    pub fn find_root(start: &Path) -> Option<PathBuf> {
        let start = start.canonicalize().ok()?;
        start
            .ancestors()
            .find(|dir| dir.join(MARKER_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Creates a project at `root`
    ///
    /// Without a template a default config and an example task are written.
    /// A template directory is copied verbatim and must contain its own
    /// marker directory.
    pub fn init(root: impl Into<PathBuf>, template: Option<&Path>, force: bool) -> Result<Self> {
        let root = root.into();
        let angreal_dir = root.join(MARKER_DIR);

        if angreal_dir.exists() && !force {
            return Err(ProjectError::AlreadyExists(root).into());
        }

        match template {
            Some(template) => {
                if !template.join(MARKER_DIR).is_dir() {
                    return Err(ProjectError::InvalidTemplate(template.to_path_buf()).into());
                }
                copy_tree(template, &root).with_context(|| {
                    format!("Failed to copy template {}", template.display())
                })?;
            }
            None => {
                fs::create_dir_all(&angreal_dir).with_context(|| {
                    format!("Failed to create {} directory: {}", MARKER_DIR, angreal_dir.display())
                })?;

                let config_path = angreal_dir.join("config.toml");
                fs::write(&config_path, DEFAULT_CONFIG)
                    .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

                let task_path = angreal_dir.join("task_example.toml");
                fs::write(&task_path, EXAMPLE_TASK)
                    .with_context(|| format!("Failed to write task: {}", task_path.display()))?;
            }
        }

        Self::open(root)
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .angreal directory path
    pub fn angreal_dir(&self) -> PathBuf {
        self.root.join(MARKER_DIR)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Settings handed to task loaders
    pub fn loader_settings(&self) -> LoaderSettings {
        LoaderSettings::new(&self.root)
            .with_installer(self.config.project.venv.installer)
            .with_python(self.config.project.venv.python.clone())
    }

    /// Loads this project's task sources into `registry`
    pub fn discover(
        &self,
        registry: &mut TaskRegistry,
        loaders: &[Box<dyn TaskLoader>],
    ) -> Result<DiscoveryReport> {
        discover(&self.angreal_dir(), &self.loader_settings(), registry, loaders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::default_loaders;
    use tempfile::TempDir;

    #[test]
    fn init_creates_structure() {
        let dir = TempDir::new().unwrap();
        let project = Project::init(dir.path(), None, false).unwrap();

        assert!(project.angreal_dir().is_dir());
        assert!(project.angreal_dir().join("config.toml").is_file());
        assert!(project.angreal_dir().join("task_example.toml").is_file());
    }

    #[test]
    fn init_refuses_existing_project_without_force() {
        let dir = TempDir::new().unwrap();
        Project::init(dir.path(), None, false).unwrap();

        let err = Project::init(dir.path(), None, false).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert!(Project::init(dir.path(), None, true).is_ok());
    }

    #[test]
    fn example_task_is_discoverable() {
        let dir = TempDir::new().unwrap();
        let project = Project::init(dir.path(), None, false).unwrap();

        let mut registry = TaskRegistry::new();
        let report = project.discover(&mut registry, &default_loaders()).unwrap();
        assert!(report.is_clean());
        assert_eq!(registry.commands()[0].descriptor.name, "hello");
    }

    #[test]
    fn init_from_template_copies_tree() {
        let template = TempDir::new().unwrap();
        fs::create_dir_all(template.path().join(MARKER_DIR)).unwrap();
        fs::write(template.path().join(MARKER_DIR).join("task_x.toml"), "").unwrap();
        fs::write(template.path().join("README.md"), "hi").unwrap();

        let target = TempDir::new().unwrap();
        Project::init(target.path(), Some(template.path()), false).unwrap();

        assert!(target.path().join(MARKER_DIR).join("task_x.toml").is_file());
        assert!(target.path().join("README.md").is_file());
    }

    #[test]
    fn template_without_marker_is_rejected() {
        let template = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        assert!(Project::init(target.path(), Some(template.path()), false).is_err());
    }

    #[test]
    fn find_root_walks_up() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(MARKER_DIR)).unwrap();
        let sub_dir = dir.path().join("sub").join("dir");
        fs::create_dir_all(&sub_dir).unwrap();

        // Canonicalize to handle macOS /var -> /private/var symlinks
        let expected = dir.path().canonicalize().ok();
        assert_eq!(Project::find_root(&sub_dir), expected);
    }

    #[test]
    fn open_non_project_fails() {
        let dir = TempDir::new().unwrap();
        let err = Project::open(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Not in an angreal project"));
    }
}

//! Task discovery
//!
//! Every `task_*` file in the marker directory is loaded on its own. A file
//! that fails is reported and skipped; the rest still register.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::registry::TaskRegistry;
use crate::source::{is_task_file_name, LoaderSettings, TaskLoadError, TaskLoader};

/// What a discovery run loaded and what it had to skip
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub loaded: Vec<PathBuf>,
    pub failures: Vec<TaskLoadError>,
}

impl DiscoveryReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Task source files in `dir`, sorted by file name
pub fn task_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read task directory: {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_task = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(is_task_file_name);
        if is_task {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Loads every task source in `dir` into a cleared `registry`
pub fn discover(
    dir: &Path,
    settings: &LoaderSettings,
    registry: &mut TaskRegistry,
    loaders: &[Box<dyn TaskLoader>],
) -> Result<DiscoveryReport> {
    registry.clear();
    let mut report = DiscoveryReport::default();

    for path in task_files(dir)? {
        let Some(loader) = loaders.iter().find(|loader| loader.accepts(&path)) else {
            report.failures.push(TaskLoadError {
                path,
                reason: "no loader for this file".to_string(),
            });
            continue;
        };

        match loader.load(&path, settings) {
            Ok(declarations) => {
                registry.absorb(&path, declarations);
                report.loaded.push(path);
            }
            Err(e) => report.failures.push(TaskLoadError {
                path,
                reason: format!("{:#}", e),
            }),
        }
    }

    Ok(report)
}

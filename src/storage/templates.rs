//! Local template cache
//!
//! Templates are plain directories under the cache directory (by default
//! `~/.angrealrc`). Fetching them from a remote is not handled here.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use directories::BaseDirs;
use thiserror::Error;

use super::GlobalConfig;
use crate::engine::SuggestionSource;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Could not determine the home directory")]
    NoHome,
}

/// Directory of cached project templates
#[derive(Debug, Clone)]
pub struct TemplateCache {
    dir: PathBuf,
}

impl TemplateCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The configured cache, falling back to `~/.angrealrc`
    pub fn from_config(config: &GlobalConfig) -> Result<Self, TemplateError> {
        match &config.template_cache {
            Some(dir) => Ok(Self::new(dir)),
            None => {
                let dirs = BaseDirs::new().ok_or(TemplateError::NoHome)?;
                Ok(Self::new(dirs.home_dir().join(".angrealrc")))
            }
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cached template names, sorted, hidden entries skipped
    pub fn names(&self) -> io::Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Resolves a filesystem path or a cached template name to a directory
    pub fn resolve(&self, name_or_path: &str) -> Result<PathBuf, TemplateError> {
        let as_path = Path::new(name_or_path);
        if as_path.is_dir() {
            return Ok(as_path.to_path_buf());
        }

        let cached = self.dir.join(name_or_path);
        if cached.is_dir() {
            return Ok(cached);
        }

        Err(TemplateError::NotFound(name_or_path.to_string()))
    }
}

impl SuggestionSource for TemplateCache {
    fn suggestions(&self) -> Result<Vec<String>> {
        Ok(self.names()?)
    }
}

/// Copies `src` into `dst` recursively, leaving out `.git`
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        if entry.file_name() == ".git" {
            continue;
        }

        let from = entry.path();
        let to = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&from, &to)?;
        } else {
            fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

//! # Storage Layer
//!
//! Everything angreal keeps on disk outside of task environments.
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Task sources | TOML / YAML / executables | `.angreal/task_*` |
//! | Project config | TOML | `.angreal/config.toml` |
//! | Global config | TOML | platform config dir (`directories`) |
//! | Templates | Directories | `~/.angrealrc/<name>/` |
//!
//! ## Key Types
//!
//! - [`Project`] - Entry point: root discovery, config, task discovery
//! - [`Config`] - Project and global configuration
//! - [`TemplateCache`] - Cached templates for `init`

mod config;
mod project;
mod templates;

pub use config::{CompletionConfig, Config, ConfigError, GlobalConfig, ProjectConfig, VenvConfig};
pub use project::{Project, ProjectError, MARKER_DIR};
pub use templates::{copy_tree, TemplateCache, TemplateError};

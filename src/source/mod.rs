//! # Task Sources
//!
//! Files in `.angreal/` named `task_*` declare commands, groups and
//! arguments. Loading a file returns its [`Declaration`]s; nothing is
//! registered as a side effect.
//!
//! ## Loaders
//!
//! | File | Loader | Callback |
//! |------|--------|----------|
//! | `task_<name>.toml` | [`DeclarativeLoader`] | `run` shell script |
//! | `task_<name>.yaml` / `.yml` | [`DeclarativeLoader`] | `run` shell script |
//! | `task_<name>` (executable) | [`ExecutableLoader`] | the executable, via `--invoke` |
//!
//! ## Executable protocol
//!
//! ```text
//! angreal                          task_deploy
//!  │                               │
//!  ├── Spawn: task_deploy --manifest
//!  │   Stdout: {"groups": [...], "commands": [...]}
//!  │                               │
//!  ├── Spawn: task_deploy --invoke deploy.prod
//!  │   Stdin: {"operation": "invoke", "command": "deploy.prod", "args": {...}}
//!  └── exit status is the task's result
//! ```

mod declarative;
mod executable;
mod protocol;
mod schema;
mod shell;

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;
use thiserror::Error;

use crate::domain::{ArgumentDescriptor, BoundArgs, CommandDescriptor, GroupDescriptor, TreePath};
use crate::venv::InstallerBackend;

pub use declarative::DeclarativeLoader;
pub use executable::{ExecutableLoader, ExecutableTask};
pub use protocol::{InvokeRequest, INVOKE_FLAG, MANIFEST_FLAG};
pub use schema::{CommandDecl, GroupDecl, LateArgumentDecl, TaskFile, VenvDecl};
pub use shell::ShellTask;

/// File name prefix of task sources
pub const TASK_PREFIX: &str = "task_";

/// One thing a task source declares
#[derive(Debug, Clone)]
pub enum Declaration {
    Group(GroupDescriptor),
    Command(CommandDescriptor),
    /// An argument declared apart from its command, bound at assembly
    Argument {
        command: TreePath,
        argument: ArgumentDescriptor,
    },
}

/// A task source that could not be loaded
#[derive(Debug, Clone, Error)]
#[error("Failed to load {}: {reason}", path.display())]
pub struct TaskLoadError {
    pub path: PathBuf,
    pub reason: String,
}

/// Project facts loaders need to build callbacks
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    pub root: PathBuf,
    pub installer: InstallerBackend,
    /// Python version for environments that do not name one
    pub python: Option<String>,
}

impl LoaderSettings {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            installer: InstallerBackend::default(),
            python: None,
        }
    }

    pub fn with_installer(mut self, installer: InstallerBackend) -> Self {
        self.installer = installer;
        self
    }

    pub fn with_python(mut self, python: Option<String>) -> Self {
        self.python = python;
        self
    }
}

/// Turns one kind of task source file into declarations
pub trait TaskLoader {
    fn name(&self) -> &'static str;

    /// Whether this loader handles `path`
    fn accepts(&self, path: &Path) -> bool;

    fn load(&self, path: &Path, settings: &LoaderSettings) -> Result<Vec<Declaration>>;
}

/// Loaders in the order they are consulted
pub fn default_loaders() -> Vec<Box<dyn TaskLoader>> {
    vec![Box::new(DeclarativeLoader), Box::new(ExecutableLoader)]
}

/// True for file names following the `task_<name>` convention
pub fn is_task_file_name(name: &str) -> bool {
    name.len() > TASK_PREFIX.len() && name.starts_with(TASK_PREFIX)
}

/// Environment variable carrying the value of argument `name`
pub fn arg_env_name(name: &str) -> String {
    let mut var = String::from("ANGREAL_ARG_");
    var.extend(name.chars().map(|c| {
        if c.is_ascii_alphanumeric() {
            c.to_ascii_uppercase()
        } else {
            '_'
        }
    }));
    var
}

/// Exports the invocation to a task subprocess
///
/// Sets `ANGREAL_ROOT`, `ANGREAL_COMMAND` (dotted path), `ANGREAL_ARGS`
/// (JSON) and one `ANGREAL_ARG_<NAME>` per bound argument.
pub(crate) fn export_invocation(
    command: &mut Command,
    root: &Path,
    path: &TreePath,
    args: &BoundArgs,
) {
    command.env("ANGREAL_ROOT", root);
    command.env("ANGREAL_COMMAND", path.to_string());
    if let Ok(json) = serde_json::to_string(args) {
        command.env("ANGREAL_ARGS", json);
    }
    for (name, value) in args.iter() {
        command.env(arg_env_name(name), value.to_string());
    }
}

//! Execution context threaded into task callbacks
//!
//! Instead of mutating the process environment, angreal captures it once into
//! an [`ExecutionContext`] and spawns every task subprocess from that value.
//! Environment activation edits the context, never the process.

use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Search path, environment variables and interpreter prefix for subprocesses
///
/// `PATH` lives in `path`, never in `vars`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    pub path: Vec<PathBuf>,
    pub vars: BTreeMap<String, String>,
    pub prefix: Option<PathBuf>,
}

impl ExecutionContext {
    /// Captures the current process environment
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn capture() -> Self {
        let mut vars = BTreeMap::new();
        let mut path = Vec::new();

        for (key, value) in env::vars_os() {
            if key == "PATH" {
                path = env::split_paths(&value).collect();
                continue;
            }
            if let (Ok(key), Ok(value)) = (key.into_string(), value.into_string()) {
                vars.insert(key, value);
            }
        }

        let prefix = vars.get("VIRTUAL_ENV").map(PathBuf::from);
        Self { path, vars, prefix }
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn remove_var(&mut self, name: &str) -> Option<String> {
        self.vars.remove(name)
    }

    /// Puts `dir` first on the search path
    pub fn prepend_path(&mut self, dir: impl Into<PathBuf>) {
        self.path.insert(0, dir.into());
    }

    /// Prepends `dir` to a path-list variable such as `PYTHONPATH`
    pub fn prepend_path_var(&mut self, name: &str, dir: &Path) {
        let mut entries = vec![dir.to_path_buf()];
        if let Some(existing) = self.vars.get(name) {
            entries.extend(env::split_paths(existing));
        }
        if let Some(joined) = join(&entries) {
            self.vars.insert(name.to_string(), joined);
        }
    }

    /// `PATH` rendered for a child process
    pub fn path_value(&self) -> Option<OsString> {
        env::join_paths(&self.path).ok()
    }

    /// Replaces a command's environment with this context
    pub fn apply(&self, command: &mut Command) {
        command.env_clear();
        command.envs(&self.vars);
        if let Some(path) = self.path_value() {
            command.env("PATH", path);
        }
    }

    /// A [`Command`] for `program` spawned from this context
    pub fn command(&self, program: impl AsRef<std::ffi::OsStr>) -> Command {
        let mut command = Command::new(program);
        self.apply(&mut command);
        command
    }

    /// Resolves `program` against the context's search path
    pub fn find_program(&self, program: &str) -> Option<PathBuf> {
        let candidates: Vec<String> = if cfg!(windows) {
            vec![format!("{}.exe", program), program.to_string()]
        } else {
            vec![program.to_string()]
        };

        self.path.iter().find_map(|dir| {
            candidates
                .iter()
                .map(|name| dir.join(name))
                .find(|candidate| candidate.is_file())
        })
    }
}

fn join(entries: &[PathBuf]) -> Option<String> {
    env::join_paths(entries)
        .ok()
        .and_then(|joined| joined.into_string().ok())
}

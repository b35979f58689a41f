//! Shell-script callbacks for declarative task files

use std::path::PathBuf;
use std::process::ExitStatus;

use crate::domain::{BoundArgs, TaskCallback, TaskFailure, TreePath};
use crate::venv::ExecutionContext;

use super::export_invocation;

/// Runs a `run` script with `sh -c` (`cmd /C` on Windows)
#[derive(Debug, Clone)]
pub struct ShellTask {
    pub script: String,
    pub root: PathBuf,
    pub workdir: PathBuf,
}

impl ShellTask {
    pub fn new(script: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            script: script.into(),
            workdir: root.clone(),
            root,
        }
    }

    pub fn in_dir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }
}

impl TaskCallback for ShellTask {
    fn invoke(
        &self,
        path: &TreePath,
        args: &BoundArgs,
        ctx: &mut ExecutionContext,
    ) -> Result<(), TaskFailure> {
        let mut command = if cfg!(windows) {
            let mut command = ctx.command("cmd");
            command.arg("/C").arg(&self.script);
            command
        } else {
            let mut command = ctx.command("sh");
            command.arg("-c").arg(&self.script);
            command
        };
        command.current_dir(&self.workdir);
        export_invocation(&mut command, &self.root, path, args);

        let status = command
            .status()
            .map_err(|e| TaskFailure::Crashed(format!("failed to start shell: {}", e)))?;
        status_to_result(status)
    }

    fn describe(&self) -> String {
        let first_line = self.script.lines().next().unwrap_or_default();
        format!("sh: {}", first_line)
    }
}

/// Maps a task process's exit status onto the callback result
pub(crate) fn status_to_result(status: ExitStatus) -> Result<(), TaskFailure> {
    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => Err(TaskFailure::Failed { code }),
        None => Err(TaskFailure::Crashed(format!(
            "terminated by signal ({})",
            status
        ))),
    }
}

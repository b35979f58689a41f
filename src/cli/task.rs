//! Running discovered tasks

use std::process::ExitCode;

use anyhow::{Context, Result};

use super::completion;
use super::output::Output;
use crate::engine::{assemble, CommandTree, DispatchError, Dispatcher, TaskRegistry};
use crate::source::default_loaders;
use crate::storage::Project;
use crate::venv::ExecutionContext;

/// Discovers the project's tasks and assembles them
///
/// Files that fail to load are reported as warnings and left out; an
/// assembly error fails the whole tree.
pub fn load_tree(project: &Project, output: &Output) -> Result<CommandTree> {
    let mut registry = TaskRegistry::new();
    let report = project.discover(&mut registry, &default_loaders())?;

    output.verbose_ctx(
        "discover",
        &format!(
            "Loaded {} task file(s) from {}",
            report.loaded.len(),
            project.angreal_dir().display()
        ),
    );
    for failure in &report.failures {
        output.warning(&failure.to_string());
    }

    assemble(&registry).context("Failed to assemble the command tree")
}

/// Runs the task named by `tokens` (group path, command, arguments)
pub fn run(tokens: &[String], output: &Output) -> Result<ExitCode> {
    let project = Project::open_current()?;
    output.verbose_ctx("task", &format!("Project root: {}", project.root().display()));

    let tree = load_tree(&project, output)?;
    completion::auto_install(project.config(), output);

    let mut ctx = ExecutionContext::capture();
    match Dispatcher::new(&tree).dispatch(tokens, &mut ctx) {
        Ok(path) => {
            output.verbose_ctx("task", &format!("Finished '{}'", path.to_command_line()));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            report(&e, output);
            Ok(exit_code(e.exit_code()))
        }
    }
}

fn report(error: &DispatchError, output: &Output) {
    match error {
        DispatchError::UnknownCommand { .. } | DispatchError::GroupRequiresCommand { .. } => {
            output.error(&error.to_string());
            if !output.is_json() {
                eprintln!("Run 'angreal list' to see every command.");
            }
        }
        DispatchError::TaskFailed { failure, .. } if !failure.is_expected() => {
            output.error(&format!("{} (the task did not run to completion)", error));
        }
        _ => output.error(&error.to_string()),
    }
}

/// Maps a task exit status onto the process exit code
pub fn exit_code(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(0) => ExitCode::FAILURE,
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}

//! Completion commands
//!
//! `_complete` and `_completion` are called by the shell scripts and must
//! never fail loudly; `completion` manages the installed scripts.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use directories::BaseDirs;

use super::output::Output;
use super::shell::Shell;
use super::task::load_tree;
use crate::engine::{CommandTree, Completer};
use crate::storage::{Config, Project, TemplateCache};

/// Setting this variable disables automatic completion installation
pub const NO_AUTO_COMPLETION_ENV: &str = "ANGREAL_NO_AUTO_COMPLETION";

#[derive(Subcommand)]
pub enum CompletionCommands {
    /// Install the completion script for a shell (detected from $SHELL by default)
    Install {
        #[arg(value_enum)]
        shell: Option<Shell>,
    },

    /// Remove installed completion scripts
    Uninstall {
        #[arg(value_enum)]
        shell: Option<Shell>,
    },

    /// Show where completion is installed
    Status,
}

/// Prints one candidate per line for `words`
///
/// Outside a project, or when the tree cannot be built, nothing is printed.
pub fn complete(words: &[String]) {
    let quiet = Output::quiet();
    let tree = Project::open_current()
        .ok()
        .and_then(|project| load_tree(&project, &quiet).ok());
    let templates = Config::global_only()
        .ok()
        .and_then(|config| TemplateCache::from_config(&config.global).ok());

    let completion = match &tree {
        Some(tree) => candidates(tree, templates.as_ref(), words),
        None => Completer::empty().complete(words).to_vec(),
    };
    for candidate in completion {
        println!("{}", candidate);
    }
}

fn candidates(tree: &CommandTree, templates: Option<&TemplateCache>, words: &[String]) -> Vec<String> {
    let mut completer = Completer::new(tree);
    if let Some(templates) = templates {
        completer = completer.with_source("init", templates);
    }
    completer.complete(words).to_vec()
}

/// Prints the completion script for `shell`
pub fn script(shell: Shell) {
    print!("{}", shell.script());
}

pub fn run(cmd: CompletionCommands, output: &Output) -> Result<()> {
    let home = home_dir()?;

    match cmd {
        CompletionCommands::Install { shell } => {
            let shell = resolve_shell(shell)?;
            let reinstall = shell.is_installed(&home);
            let path = shell
                .install(&home)
                .with_context(|| format!("Failed to install {} completion", shell.name()))?;
            output.verbose_ctx("completion", &format!("Wrote {}", path.display()));

            if output.is_json() {
                output.data(&serde_json::json!({
                    "shell": shell,
                    "path": path,
                    "reinstalled": reinstall,
                }));
            } else {
                output.success(&format!(
                    "Installed {} completion at {}. Restart your shell to use it.",
                    shell.name(),
                    path.display()
                ));
            }
        }

        CompletionCommands::Uninstall { shell } => {
            let shells = match shell {
                Some(shell) => vec![shell],
                None => Shell::ALL.to_vec(),
            };

            let mut removed = Vec::new();
            for shell in shells {
                removed.extend(shell.uninstall(&home)?);
            }

            if output.is_json() {
                output.data(&serde_json::json!({ "removed": removed }));
            } else if removed.is_empty() {
                output.success("No completion scripts were installed");
            } else {
                for path in &removed {
                    output.success(&format!("Removed {}", path.display()));
                }
            }
        }

        CompletionCommands::Status => {
            let detected = Shell::detect();
            let rows: Vec<_> = Shell::ALL
                .iter()
                .map(|shell| {
                    serde_json::json!({
                        "shell": shell,
                        "installed": shell.is_installed(&home),
                        "path": shell.script_path(&home),
                        "current": detected == Some(*shell),
                    })
                })
                .collect();

            if output.is_json() {
                output.data(&rows);
            } else {
                for shell in Shell::ALL {
                    let state = if shell.is_installed(&home) {
                        format!("installed ({})", shell.script_path(&home).display())
                    } else {
                        "not installed".to_string()
                    };
                    let current = if detected == Some(shell) { " [current shell]" } else { "" };
                    println!("{:<5} {}{}", shell.name(), state, current);
                }
            }
        }
    }

    Ok(())
}

/// Installs completion for the user's shell the first time a task runs
///
/// Failures are only reported in verbose mode.
pub fn auto_install(config: &Config, output: &Output) {
    if std::env::var_os(NO_AUTO_COMPLETION_ENV).is_some() || !config.auto_install_completion() {
        return;
    }
    let Some(shell) = Shell::detect() else {
        return;
    };
    let Ok(home) = home_dir() else {
        return;
    };
    if shell.is_installed(&home) {
        return;
    }

    match shell.install(&home) {
        Ok(path) => eprintln!(
            "Installed {} completion at {}; restart your shell to use it. Set {} to skip this.",
            shell.name(),
            path.display(),
            NO_AUTO_COMPLETION_ENV
        ),
        Err(e) => output.verbose_ctx("completion", &format!("Auto-install skipped: {:#}", e)),
    }
}

fn resolve_shell(shell: Option<Shell>) -> Result<Shell> {
    shell.or_else(Shell::detect).ok_or_else(|| {
        anyhow::anyhow!("Could not detect a supported shell from $SHELL; pass bash or zsh")
    })
}

fn home_dir() -> Result<PathBuf> {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .context("Could not determine the home directory")
}

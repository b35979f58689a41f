//! Main CLI application structure

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};

use super::completion::{self, CompletionCommands};
use super::output::{Output, OutputFormat};
use super::shell::Shell;
use super::{list, task};
use crate::storage::{Config, Project, TemplateCache};

#[derive(Parser)]
#[command(name = "angreal")]
#[command(author, version, about = "Project-local task runner")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new angreal project
    Init {
        /// Template name (from the template cache) or path
        template: Option<String>,

        /// Directory to initialize
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing .angreal directory
        #[arg(long)]
        force: bool,
    },

    /// List the commands discovered in this project
    List,

    /// Manage shell completion
    #[command(subcommand)]
    Completion(CompletionCommands),

    /// Print completion candidates (used by the shell scripts)
    #[command(name = "_complete", hide = true)]
    Complete {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        words: Vec<String>,
    },

    /// Print a completion script (used by `completion install`)
    #[command(name = "_completion", hide = true)]
    CompletionScript {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// A discovered task: group names, command name, then its arguments
    #[command(external_subcommand)]
    Task(Vec<String>),
}

/// Main entry point for the CLI
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let output = Output::new(cli.format, cli.verbose);

    output.verbose("angreal starting");

    match cli.command {
        Some(Commands::Init {
            template,
            path,
            force,
        }) => init(&output, template.as_deref(), path, force)?,

        Some(Commands::List) => list::run(&output)?,

        Some(Commands::Completion(cmd)) => completion::run(cmd, &output)?,

        Some(Commands::Complete { words }) => completion::complete(&words),

        Some(Commands::CompletionScript { shell }) => completion::script(shell),

        Some(Commands::Task(tokens)) => {
            output.verbose_ctx("task", &format!("Dispatching: {}", tokens.join(" ")));
            return task::run(&tokens, &output);
        }

        None => {
            if Project::open_current().is_ok() {
                list::run(&output)?;
            } else {
                Cli::command().print_help().context("Failed to print help")?;
            }
        }
    }

    output.verbose("Command completed successfully");
    Ok(ExitCode::SUCCESS)
}

fn init(output: &Output, template: Option<&str>, path: PathBuf, force: bool) -> Result<()> {
    let template_dir = match template {
        Some(name) => {
            let config = Config::global_only()?;
            let cache = TemplateCache::from_config(&config.global)?;
            output.verbose_ctx("init", &format!("Template cache: {}", cache.dir().display()));
            Some(cache.resolve(name)?)
        }
        None => None,
    };

    output.verbose_ctx("init", &format!("Initializing project at: {}", path.display()));
    let project = Project::init(&path, template_dir.as_deref(), force)?;
    output.verbose_ctx(
        "init",
        &format!("Created .angreal directory at: {}", project.angreal_dir().display()),
    );
    output.success(&format!(
        "Initialized angreal project at {}",
        project.root().display()
    ));
    Ok(())
}

//! Command descriptors and the callback interface

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use thiserror::Error;

use super::argument::ArgumentDescriptor;
use super::path::{validate_name, TreePath};
use super::value::BoundArgs;
use super::DescriptorError;
use crate::venv::{EnvError, ExecutionContext};

/// Failure reported by a task callback
#[derive(Debug, Error)]
pub enum TaskFailure {
    /// The task ran and reported failure through its exit status
    #[error("task exited with status {code}")]
    Failed { code: i32 },

    /// The task could not run to completion (spawn failure, signal, bad protocol)
    #[error("task crashed: {0}")]
    Crashed(String),

    /// The isolated environment wrapping the task could not be prepared
    #[error(transparent)]
    Environment(#[from] EnvError),
}

impl TaskFailure {
    /// True for failures the task itself chose to report
    pub fn is_expected(&self) -> bool {
        matches!(self, TaskFailure::Failed { .. })
    }

    /// Exit code the process should mirror, when the task produced one
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            TaskFailure::Failed { code } => Some(*code),
            _ => None,
        }
    }
}

/// The invocable part of a command
///
/// `path` is the placement the user dispatched through, so a command
/// attached to several groups knows which one was used.
pub trait TaskCallback {
    fn invoke(
        &self,
        path: &TreePath,
        args: &BoundArgs,
        ctx: &mut ExecutionContext,
    ) -> Result<(), TaskFailure>;

    /// Short human description, shown by `list --verbose`
    fn describe(&self) -> String {
        "callback".to_string()
    }
}

/// Adapts a closure into a [`TaskCallback`]
pub struct FnTask<F>(pub F);

impl<F> TaskCallback for FnTask<F>
where
    F: Fn(&TreePath, &BoundArgs, &mut ExecutionContext) -> Result<(), TaskFailure>,
{
    fn invoke(
        &self,
        path: &TreePath,
        args: &BoundArgs,
        ctx: &mut ExecutionContext,
    ) -> Result<(), TaskFailure> {
        (self.0)(path, args, ctx)
    }

    fn describe(&self) -> String {
        "closure".to_string()
    }
}

/// Describes one invocable unit of work
#[derive(Clone, Serialize)]
pub struct CommandDescriptor {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_about: Option<String>,

    /// Declaration order is kept for help output
    pub arguments: Vec<ArgumentDescriptor>,

    /// Group paths the command is attached to; empty means root level
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub groups: BTreeSet<TreePath>,

    #[serde(skip)]
    pub callback: Rc<dyn TaskCallback>,
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("about", &self.about)
            .field("arguments", &self.arguments)
            .field("groups", &self.groups)
            .field("callback", &self.callback.describe())
            .finish()
    }
}

impl CommandDescriptor {
    pub fn new(name: impl Into<String>, callback: Rc<dyn TaskCallback>) -> Self {
        Self {
            name: name.into(),
            about: None,
            long_about: None,
            arguments: Vec::new(),
            groups: BTreeSet::new(),
            callback,
        }
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    pub fn long_about(mut self, long_about: impl Into<String>) -> Self {
        self.long_about = Some(long_about.into());
        self
    }

    pub fn arg(mut self, argument: ArgumentDescriptor) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn in_group(mut self, group: TreePath) -> Self {
        self.groups.insert(group);
        self
    }

    /// Parent paths this command is placed under
    pub fn placements(&self) -> Vec<TreePath> {
        if self.groups.is_empty() {
            vec![TreePath::root()]
        } else {
            self.groups.iter().cloned().collect()
        }
    }

    pub fn argument(&self, name: &str) -> Option<&ArgumentDescriptor> {
        self.arguments.iter().find(|a| a.name == name)
    }

    pub fn find_long(&self, long: &str) -> Option<&ArgumentDescriptor> {
        self.arguments
            .iter()
            .find(|a| a.long_name() == Some(long))
    }

    pub fn find_short(&self, short: char) -> Option<&ArgumentDescriptor> {
        self.arguments.iter().find(|a| a.short == Some(short))
    }

    /// Positional arguments in declaration order
    pub fn positionals(&self) -> impl Iterator<Item = &ArgumentDescriptor> {
        self.arguments.iter().filter(|a| a.is_positional())
    }

    /// Appends a late-bound argument, keeping names and flags unique
    pub fn add_argument(&mut self, argument: ArgumentDescriptor) -> Result<(), DescriptorError> {
        argument.validate()?;
        self.check_unique(&argument)?;
        self.arguments.push(argument);
        Ok(())
    }

    fn check_unique(&self, candidate: &ArgumentDescriptor) -> Result<(), DescriptorError> {
        for existing in &self.arguments {
            if existing.name == candidate.name {
                return Err(DescriptorError::DuplicateArgument {
                    command: self.name.clone(),
                    argument: candidate.name.clone(),
                });
            }
            if candidate.short.is_some() && existing.short == candidate.short {
                return Err(DescriptorError::DuplicateFlag {
                    command: self.name.clone(),
                    flag: candidate.display_short(),
                });
            }
            if candidate.long_name().is_some() && existing.long_name() == candidate.long_name() {
                return Err(DescriptorError::DuplicateFlag {
                    command: self.name.clone(),
                    flag: candidate.display_flag(),
                });
            }
        }
        Ok(())
    }

    /// Checks the name, every argument, and argument uniqueness
    pub fn validate(&self) -> Result<(), DescriptorError> {
        validate_name(&self.name, "command")?;

        let mut names = HashSet::new();
        let mut shorts = HashSet::new();
        let mut longs = HashSet::new();
        for argument in &self.arguments {
            argument.validate()?;

            if !names.insert(argument.name.as_str()) {
                return Err(DescriptorError::DuplicateArgument {
                    command: self.name.clone(),
                    argument: argument.name.clone(),
                });
            }
            if let Some(short) = argument.short {
                if !shorts.insert(short) {
                    return Err(DescriptorError::DuplicateFlag {
                        command: self.name.clone(),
                        flag: argument.display_short(),
                    });
                }
            }
            if let Some(long) = argument.long_name() {
                if !longs.insert(long) {
                    return Err(DescriptorError::DuplicateFlag {
                        command: self.name.clone(),
                        flag: format!("--{}", long),
                    });
                }
            }
        }
        Ok(())
    }
}

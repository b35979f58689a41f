//! Dispatching a token sequence against the command tree

use std::rc::Rc;

use thiserror::Error;

use super::binding::bind;
use super::tree::CommandTree;
use crate::domain::{BoundArgs, CommandDescriptor, TaskFailure, TreePath, ValueType};
use crate::venv::ExecutionContext;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unknown command '{token}'{} (available: {})", at_level(.path), list(.available))]
    UnknownCommand {
        path: TreePath,
        token: String,
        available: Vec<String>,
    },

    #[error("{} (available: {})", needs_command(.path), list(.available))]
    GroupRequiresCommand {
        path: TreePath,
        available: Vec<String>,
    },

    #[error("Unknown argument '{token}' for '{command}'")]
    UnknownArgument { command: TreePath, token: String },

    #[error("Missing required argument {argument} for '{command}'")]
    MissingArgument { command: TreePath, argument: String },

    #[error("Invalid value '{value}' for {argument} of '{command}': expected {expected}")]
    ArgumentTypeError {
        command: TreePath,
        argument: String,
        value: String,
        expected: ValueType,
    },

    #[error("{argument} of '{command}' takes {expected} value(s), got {got}")]
    InvalidArity {
        command: TreePath,
        argument: String,
        expected: String,
        got: usize,
    },

    #[error("{argument} of '{command}' requires a value")]
    MissingValue { command: TreePath, argument: String },

    #[error("{argument} of '{command}' does not take a value")]
    UnexpectedValue { command: TreePath, argument: String },

    #[error("{argument} of '{command}' must be given as {argument}=VALUE")]
    RequireEquals { command: TreePath, argument: String },

    #[error("Task '{command}' failed (arguments: {args}): {failure}")]
    TaskFailed {
        command: TreePath,
        args: String,
        #[source]
        failure: TaskFailure,
    },
}

fn at_level(path: &TreePath) -> String {
    if path.is_root() {
        String::new()
    } else {
        format!(" in '{}'", path.to_command_line())
    }
}

fn needs_command(path: &TreePath) -> String {
    if path.is_root() {
        "A command is required".to_string()
    } else {
        format!("'{}' is a group and requires a command", path.to_command_line())
    }
}

fn list(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

impl DispatchError {
    /// Process exit code for this error
    ///
    /// Task failures mirror the task's own code; input errors use 2.
    pub fn exit_code(&self) -> i32 {
        match self {
            DispatchError::TaskFailed { failure, .. } => failure.exit_code().unwrap_or(1),
            _ => 2,
        }
    }

    /// True for mistakes in what the user typed
    pub fn is_usage_error(&self) -> bool {
        !matches!(self, DispatchError::TaskFailed { .. })
    }
}

/// A command found in the tree, with the tokens left for its arguments
#[derive(Debug)]
pub struct Resolved<'a> {
    pub path: TreePath,
    pub command: Rc<CommandDescriptor>,
    pub rest: &'a [String],
}

/// Walks a [`CommandTree`] and runs the matched command
pub struct Dispatcher<'t> {
    tree: &'t CommandTree,
}

impl<'t> Dispatcher<'t> {
    pub fn new(tree: &'t CommandTree) -> Self {
        Self { tree }
    }

    /// Consumes group names until a command matches
    pub fn resolve<'a>(&self, tokens: &'a [String]) -> Result<Resolved<'a>, DispatchError> {
        let mut node = self.tree.root();
        let mut path = TreePath::root();

        for (index, token) in tokens.iter().enumerate() {
            if token.starts_with('-') {
                break;
            }
            if let Some(command) = node.command(token) {
                return Ok(Resolved {
                    path: path.child(token.clone()),
                    command: Rc::clone(command),
                    rest: &tokens[index + 1..],
                });
            }
            match node.group(token) {
                Some(group) => {
                    node = group;
                    path.push(token.clone());
                }
                None => {
                    return Err(DispatchError::UnknownCommand {
                        path,
                        token: token.clone(),
                        available: node.child_names(),
                    })
                }
            }
        }

        Err(DispatchError::GroupRequiresCommand {
            path,
            available: node.child_names(),
        })
    }

    /// Resolves and binds without running anything
    pub fn prepare(
        &self,
        tokens: &[String],
    ) -> Result<(TreePath, Rc<CommandDescriptor>, BoundArgs), DispatchError> {
        let resolved = self.resolve(tokens)?;
        let args = bind(&resolved.path, &resolved.command, resolved.rest)?;
        Ok((resolved.path, resolved.command, args))
    }

    /// Resolves, binds and invokes, returning the path that ran
    pub fn dispatch(
        &self,
        tokens: &[String],
        ctx: &mut ExecutionContext,
    ) -> Result<TreePath, DispatchError> {
        let (path, command, args) = self.prepare(tokens)?;

        command
            .callback
            .invoke(&path, &args, ctx)
            .map_err(|failure| DispatchError::TaskFailed {
                command: path.clone(),
                args: args.summary(),
                failure,
            })?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ArgValue, ArgumentDescriptor, FnTask, GroupDescriptor};
    use crate::engine::{assemble, TaskRegistry};
    use crate::source::Declaration;
    use std::cell::RefCell;
    use std::path::Path;

    type Calls = Rc<RefCell<Vec<(String, BoundArgs)>>>;

    fn recording(name: &str, calls: &Calls) -> CommandDescriptor {
        let calls = Rc::clone(calls);
        CommandDescriptor::new(
            name,
            Rc::new(FnTask(move |path: &TreePath, args: &BoundArgs, _: &mut ExecutionContext| {
                calls.borrow_mut().push((path.to_string(), args.clone()));
                Ok(())
            })),
        )
        .arg(ArgumentDescriptor::new("test").short('t').long("test").flag())
    }

    fn tree(calls: &Calls) -> CommandTree {
        let mut registry = TaskRegistry::new();
        registry.absorb(
            Path::new("task_group.toml"),
            vec![
                Declaration::Group(GroupDescriptor::new("group1")),
                Declaration::Command(
                    recording("flag", calls).in_group(TreePath::parse("group1").unwrap()),
                ),
                Declaration::Command(
                    recording("flag2", calls).in_group(TreePath::parse("group1.group2").unwrap()),
                ),
                Declaration::Command(CommandDescriptor::new(
                    "fail",
                    Rc::new(FnTask(|_: &TreePath, _: &BoundArgs, _: &mut ExecutionContext| {
                        Err(TaskFailure::Failed { code: 4 })
                    })),
                )),
            ],
        );
        assemble(&registry).unwrap()
    }

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn nested_dispatch_routes_to_the_right_command() {
        let calls: Calls = Rc::default();
        let tree = tree(&calls);
        let dispatcher = Dispatcher::new(&tree);
        let mut ctx = ExecutionContext::default();

        dispatcher
            .dispatch(&tokens(&["group1", "flag", "-t"]), &mut ctx)
            .unwrap();
        dispatcher
            .dispatch(&tokens(&["group1", "group2", "flag2", "-t"]), &mut ctx)
            .unwrap();

        let calls = calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "group1.flag");
        assert_eq!(calls[1].0, "group1.group2.flag2");
        assert_eq!(calls[1].1.get("test"), Some(&ArgValue::Bool(true)));
    }

    #[test]
    fn unknown_command_lists_level() {
        let calls: Calls = Rc::default();
        let tree = tree(&calls);

        match Dispatcher::new(&tree).resolve(&tokens(&["group1", "nope"])) {
            Err(DispatchError::UnknownCommand {
                path,
                token,
                available,
            }) => {
                assert_eq!(path.to_string(), "group1");
                assert_eq!(token, "nope");
                assert_eq!(available, vec!["flag", "group2"]);
            }
            other => panic!("unexpected {:?}", other.map(|r| r.path)),
        }
    }

    #[test]
    fn path_ending_on_group_needs_command() {
        let calls: Calls = Rc::default();
        let tree = tree(&calls);

        let err = Dispatcher::new(&tree)
            .resolve(&tokens(&["group1", "group2"]))
            .unwrap_err();
        assert!(matches!(err, DispatchError::GroupRequiresCommand { .. }));
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("flag2"));
    }

    #[test]
    fn task_failure_mirrors_exit_code() {
        let calls: Calls = Rc::default();
        let tree = tree(&calls);

        let err = Dispatcher::new(&tree)
            .dispatch(&tokens(&["fail"]), &mut ExecutionContext::default())
            .unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(!err.is_usage_error());
        assert!(err.to_string().contains("Task 'fail' failed"));
    }

    #[test]
    fn bad_argument_never_invokes() {
        let calls: Calls = Rc::default();
        let tree = tree(&calls);

        let err = Dispatcher::new(&tree)
            .dispatch(&tokens(&["group1", "flag", "--nope"]), &mut ExecutionContext::default())
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownArgument { .. }));
        assert!(calls.borrow().is_empty());
    }
}

//! Domain models for angreal
//!
//! Descriptors for commands, groups and arguments, the dotted paths that
//! address them, and the typed values bound at dispatch. No I/O happens here.

mod argument;
mod command;
mod group;
mod path;
mod value;

use thiserror::Error;

pub use argument::ArgumentDescriptor;
pub use command::{CommandDescriptor, FnTask, TaskCallback, TaskFailure};
pub use group::GroupDescriptor;
pub use path::{validate_name, TreePath};
pub use value::{ArgValue, BoundArgs, ValueType};

/// A descriptor that violates its own invariants
#[derive(Debug, Error, PartialEq)]
pub enum DescriptorError {
    #[error("{0} name must not be empty")]
    EmptyName(&'static str),

    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: &'static str,
    },

    #[error("argument '{0}' does not take a value but declares value counts")]
    ValuesOnFlag(String),

    #[error("argument '{argument}' has an invalid value range {min}..={max}")]
    InvalidValueRange { argument: String, min: u32, max: u32 },

    #[error("argument '{argument}' has an invalid flag '{flag}'")]
    InvalidFlag { argument: String, flag: String },

    #[error("default '{value}' of argument '{argument}' is not a valid {expected}")]
    InvalidDefault {
        argument: String,
        value: String,
        expected: ValueType,
    },

    #[error("argument '{argument}' has {count} default value(s) but accepts {accepted}")]
    DefaultArity {
        argument: String,
        count: usize,
        accepted: String,
    },

    #[error("command '{command}' declares argument '{argument}' twice")]
    DuplicateArgument { command: String, argument: String },

    #[error("command '{command}' uses flag '{flag}' for more than one argument")]
    DuplicateFlag { command: String, flag: String },
}

//! # Engine
//!
//! Discovery, tree assembly, dispatch and completion.
//!
//! ## Flow
//!
//! ```text
//! .angreal/task_*  ──discover──▶  TaskRegistry  ──assemble──▶  CommandTree
//!                                                                │
//!                                      ┌─────────────────────────┤
//!                                      ▼                         ▼
//!                                 Dispatcher                 Completer
//!                              (bind + invoke)          (`_complete` words)
//! ```
//!
//! ## Key Types
//!
//! - [`TaskRegistry`] - Pool of everything the task sources declared
//! - [`CommandTree`] - Assembled, collision-free hierarchy
//! - [`Dispatcher`] - Resolves a token sequence and runs the command
//! - [`Completer`] - Next-token candidates for shell completion

mod binding;
mod completion;
mod discovery;
mod dispatch;
mod registry;
mod tree;

pub use binding::bind;
pub use completion::{Completer, Completion, SuggestionSource};
pub use discovery::{discover, task_files, DiscoveryReport};
pub use dispatch::{DispatchError, Dispatcher, Resolved};
pub use registry::{LateArgument, RegisteredCommand, TaskRegistry};
pub use tree::{assemble, AssemblyError, CommandTree, GroupNode, RESERVED_ROOT_NAMES};

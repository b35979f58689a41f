//! angreal - a project-local task runner
//!
//! Tasks live in `.angreal/task_*` files next to the code they automate.
//! angreal discovers them, assembles a command tree (groups nest), binds
//! command-line arguments, and runs each task, optionally inside an
//! isolated Python environment. Shell completion is driven by the same tree.

pub mod cli;
pub mod domain;
pub mod engine;
pub mod source;
pub mod storage;
pub mod venv;

pub use domain::{ArgumentDescriptor, CommandDescriptor, GroupDescriptor, TreePath};
pub use engine::{CommandTree, Dispatcher, TaskRegistry};

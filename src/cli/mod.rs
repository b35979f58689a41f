//! # Command-Line Interface
//!
//! User-facing commands and output formatting.
//!
//! ## Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `init [TEMPLATE]` | Scaffold `.angreal/`, or copy a template |
//! | `list` | Show the discovered command tree |
//! | `completion install\|uninstall\|status` | Manage shell completion |
//! | `<group>... <command> [args]` | Run a discovered task |
//! | `_complete`, `_completion` | Hidden; called by the completion scripts |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) before the task path for debug output:
//! ```bash
//! angreal --verbose docs build
//! ```
//!
//! ## Exit Codes
//!
//! A task that fails passes its own exit code through. Unknown commands and
//! argument errors exit with 2; other errors with 1.

mod app;
mod completion;
mod list;
mod output;
mod shell;
mod task;

pub use app::{run, Cli, Commands};
pub use completion::NO_AUTO_COMPLETION_ENV;
pub use output::{Output, OutputFormat};
pub use shell::Shell;

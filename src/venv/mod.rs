//! # Isolated Environments
//!
//! Python virtual environments that tasks can run inside.
//!
//! ## Overview
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`ExecutionContext`] | Search path, variables and prefix handed to subprocesses |
//! | [`IsolatedEnvironment`] | Creates, activates and removes one environment |
//! | [`Requirements`] | A package, a package list, or a manifest file |
//! | [`VenvRequired`] | Task callback wrapper that runs inside an environment |
//!
//! ## On-disk layout
//!
//! ```text
//! .venv/
//! ├── bin/ (Scripts/ on Windows)
//! │   └── python
//! ├── lib/python3.X/site-packages/
//! └── .angreal-env.json     # written once creation and install succeeded
//! .venv.lock                # provisioning lock
//! .venv.pending             # present while angreal is creating .venv
//! ```

mod context;
mod environment;
mod installer;
mod required;
mod requirements;

use std::path::PathBuf;

use thiserror::Error;

pub use context::ExecutionContext;
pub use environment::{
    normalize_path, ActivationState, ActiveEnvironment, EnvMarker, IsolatedEnvironment, ENV_MARKER,
};
pub use installer::{Installer, InstallerBackend};
pub use required::{VenvRequired, VenvSpec};
pub use requirements::Requirements;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("Failed to create environment at {path}: {detail}")]
    EnvironmentCreation { path: PathBuf, detail: String },

    #[error("Failed to install dependencies into {path}: {detail}")]
    DependencyInstall { path: PathBuf, detail: String },

    #[error("Invalid requirements: {0}")]
    InvalidRequirementsSpec(String),

    #[error("Environment at {0} has not been created")]
    NotCreated(PathBuf),

    #[error("Environment I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

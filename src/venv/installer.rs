//! Environment provisioning backends
//!
//! `uv` is preferred when available; the standard `venv` module plus `pip`
//! is the fallback.

use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Output};

use serde::{Deserialize, Serialize};

use super::context::ExecutionContext;
use super::requirements::Requirements;
use super::EnvError;

/// Configured provisioning backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallerBackend {
    /// `uv` when it is on the search path, otherwise `pip`
    #[default]
    Auto,
    Uv,
    Pip,
}

impl InstallerBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallerBackend::Auto => "auto",
            InstallerBackend::Uv => "uv",
            InstallerBackend::Pip => "pip",
        }
    }
}

/// A resolved backend able to create environments and install packages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installer {
    Uv,
    Pip,
}

impl Installer {
    /// Picks the concrete installer for `backend` within `ctx`
    pub fn resolve(backend: InstallerBackend, ctx: &ExecutionContext) -> Self {
        match backend {
            InstallerBackend::Uv => Installer::Uv,
            InstallerBackend::Pip => Installer::Pip,
            InstallerBackend::Auto => {
                if ctx.find_program("uv").is_some() {
                    Installer::Uv
                } else {
                    Installer::Pip
                }
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Installer::Uv => "uv",
            Installer::Pip => "pip",
        }
    }

    /// Creates an environment at `path`, optionally pinned to `python`
    pub fn create(
        &self,
        path: &Path,
        python: Option<&str>,
        ctx: &ExecutionContext,
    ) -> Result<(), EnvError> {
        let mut command = match self {
            Installer::Uv => {
                let mut command = ctx.command("uv");
                command.arg("venv").arg("--seed");
                if let Some(version) = python {
                    command.arg("--python").arg(version);
                }
                command.arg(path);
                command
            }
            Installer::Pip => {
                let (program, launcher_args) = host_python(python);
                let mut command = ctx.command(program);
                command.args(launcher_args).arg("-m").arg("venv").arg(path);
                command
            }
        };

        run(&mut command).map_err(|detail| EnvError::EnvironmentCreation {
            path: path.to_path_buf(),
            detail,
        })
    }

    /// Installs `requirements` with the environment's interpreter
    pub fn install(
        &self,
        env_path: &Path,
        python_executable: &Path,
        requirements: &Requirements,
        ctx: &ExecutionContext,
    ) -> Result<(), EnvError> {
        let mut command = match self {
            Installer::Uv => {
                let mut command = ctx.command("uv");
                command
                    .arg("pip")
                    .arg("install")
                    .arg("--python")
                    .arg(python_executable);
                command
            }
            Installer::Pip => {
                let mut command = ctx.command(python_executable);
                command.arg("-m").arg("pip").arg("install");
                command
            }
        };
        command.args(requirements.install_args());

        run(&mut command).map_err(|detail| EnvError::DependencyInstall {
            path: env_path.to_path_buf(),
            detail,
        })
    }
}

/// Interpreter (and launcher arguments) used to bootstrap a `venv` when
/// `uv` is not in play
fn host_python(version: Option<&str>) -> (OsString, Vec<String>) {
    match version {
        Some(version) if cfg!(windows) => ("py".into(), vec![format!("-{}", version)]),
        Some(version) => (format!("python{}", version).into(), Vec::new()),
        None if cfg!(windows) => ("python".into(), Vec::new()),
        None => ("python3".into(), Vec::new()),
    }
}

/// Runs a provisioning tool, returning its diagnostics on failure
fn run(command: &mut Command) -> Result<(), String> {
    let program = command.get_program().to_string_lossy().to_string();
    let output: Output = command
        .output()
        .map_err(|e| format!("failed to run {}: {}", program, e))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let diagnostics = if stderr.is_empty() { stdout } else { stderr };
    Err(match output.status.code() {
        Some(code) => format!("{} exited with status {}: {}", program, code, diagnostics),
        None => format!("{} was terminated by a signal: {}", program, diagnostics),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn pinned_host_python() {
        let (program, args) = host_python(Some("3.11"));
        if cfg!(windows) {
            assert_eq!(program, "py");
            assert_eq!(args, vec!["-3.11"]);
        } else {
            assert_eq!(program, "python3.11");
            assert!(args.is_empty());
        }
    }

    #[test]
    fn explicit_backends_resolve_directly() {
        let ctx = ExecutionContext::default();
        assert_eq!(Installer::resolve(InstallerBackend::Uv, &ctx), Installer::Uv);
        assert_eq!(Installer::resolve(InstallerBackend::Pip, &ctx), Installer::Pip);
    }

    #[test]
    fn auto_falls_back_to_pip_without_uv() {
        let dir = TempDir::new().unwrap();
        let mut ctx = ExecutionContext::default();
        ctx.path = vec![dir.path().to_path_buf()];

        assert_eq!(Installer::resolve(InstallerBackend::Auto, &ctx), Installer::Pip);
    }

    #[test]
    fn backend_parses_from_config() {
        #[derive(Deserialize)]
        struct Wrapper {
            installer: InstallerBackend,
        }
        let parsed: Wrapper = toml::from_str("installer = \"uv\"").unwrap();
        assert_eq!(parsed.installer, InstallerBackend::Uv);
    }

    #[test]
    fn missing_tool_is_a_creation_error() {
        let dir = TempDir::new().unwrap();
        let mut ctx = ExecutionContext::default();
        ctx.path = vec![dir.path().to_path_buf()];

        let err = Installer::Uv
            .create(&dir.path().join("env"), None, &ctx)
            .unwrap_err();
        assert!(matches!(err, EnvError::EnvironmentCreation { .. }));
    }
}

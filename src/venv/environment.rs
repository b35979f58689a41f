//! Isolated interpreter environments
//!
//! An [`IsolatedEnvironment`] moves through three states:
//!
//! ```text
//! Uncreated --ensure--> Created-Inactive --activate--> Active
//!                              ^                          |
//!                              +-------deactivate---------+
//! ```
//!
//! Creation is recorded by a marker file written only after the interpreter
//! and requirements are in place. A pending file next to the environment
//! exists while angreal is creating it, so an interrupted creation is wiped
//! and redone on the next `ensure`. Nothing else is ever deleted by `ensure`:
//! an interpreter found without a marker is adopted, and any other non-empty
//! directory is refused. Activation edits an [`ExecutionContext`], never the
//! process.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::ops::{Deref, DerefMut};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use super::context::ExecutionContext;
use super::installer::{Installer, InstallerBackend};
use super::requirements::Requirements;
use super::EnvError;

/// File at the environment root marking a completed creation
pub const ENV_MARKER: &str = ".angreal-env.json";

/// Contents of [`ENV_MARKER`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvMarker {
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements_digest: Option<String>,
    pub installer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    Inactive,
    Active,
}

/// A self-contained interpreter plus package directory
#[derive(Debug)]
pub struct IsolatedEnvironment {
    path: PathBuf,
    python_version: Option<String>,
    requirements: Option<Requirements>,
    backend: InstallerBackend,
    state: ActivationState,
    saved: Option<ExecutionContext>,
}

impl IsolatedEnvironment {
    /// Describes an environment at `path`, resolved against the current
    /// directory when relative
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let path = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&path))
                .unwrap_or(path)
        };
        let path = normalize_path(&path);

        Self {
            path,
            python_version: None,
            requirements: None,
            backend: InstallerBackend::default(),
            state: ActivationState::Inactive,
            saved: None,
        }
    }

    pub fn with_python(mut self, version: impl Into<String>) -> Self {
        self.python_version = Some(version.into());
        self
    }

    pub fn with_requirements(mut self, requirements: Requirements) -> Self {
        self.requirements = Some(requirements);
        self
    }

    pub fn with_installer(mut self, backend: InstallerBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn python_version(&self) -> Option<&str> {
        self.python_version.as_deref()
    }

    pub fn requirements(&self) -> Option<&Requirements> {
        self.requirements.as_ref()
    }

    pub fn state(&self) -> ActivationState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ActivationState::Active
    }

    /// Directory holding the interpreter and console scripts
    pub fn bin_dir(&self) -> PathBuf {
        if cfg!(windows) {
            self.path.join("Scripts")
        } else {
            self.path.join("bin")
        }
    }

    pub fn python_executable(&self) -> PathBuf {
        if cfg!(windows) {
            self.bin_dir().join("python.exe")
        } else {
            self.bin_dir().join("python")
        }
    }

    /// The environment's `site-packages`, if the interpreter laid one out
    pub fn site_packages(&self) -> Option<PathBuf> {
        if cfg!(windows) {
            let dir = self.path.join("Lib").join("site-packages");
            return dir.is_dir().then_some(dir);
        }

        let lib = self.path.join("lib");
        let mut candidates: Vec<PathBuf> = fs::read_dir(&lib)
            .ok()?
            .flatten()
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map_or(false, |name| name.starts_with("python"))
            })
            .map(|entry| entry.path().join("site-packages"))
            .filter(|dir| dir.is_dir())
            .collect();
        candidates.sort();
        candidates.pop()
    }

    pub fn marker_path(&self) -> PathBuf {
        self.path.join(ENV_MARKER)
    }

    /// Lock file guarding provisioning, next to the environment directory
    pub fn lock_path(&self) -> PathBuf {
        self.sibling("lock")
    }

    fn sibling(&self, extension: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("env"));
        name.push(".");
        name.push(extension);
        self.path.with_file_name(name)
    }

    /// File present only while angreal is creating the environment
    pub fn pending_path(&self) -> PathBuf {
        self.sibling("pending")
    }

    /// Reads the creation marker, if present and well formed
    pub fn marker(&self) -> Option<EnvMarker> {
        let content = fs::read_to_string(self.marker_path()).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// True when both the interpreter and the creation marker exist
    pub fn exists(&self) -> bool {
        self.python_executable().is_file() && self.marker_path().is_file()
    }

    /// Creates the environment and installs requirements when needed
    ///
    /// An existing environment is reused; requirements are reinstalled only
    /// when their digest differs from the one recorded at the last install.
    pub fn ensure(&mut self, ctx: &ExecutionContext) -> Result<(), EnvError> {
        if self.path.parent().is_none() {
            return Err(self.refuse("a filesystem root cannot hold an environment"));
        }

        let _lock = self.lock()?;
        let installer = Installer::resolve(self.backend, ctx);

        if self.pending_path().is_file() && !self.exists() {
            self.remove_dir()?;
        }

        let previous = if self.exists() { self.marker() } else { None };
        if previous.is_none() && !self.python_executable().is_file() {
            self.check_vacant()?;
            self.touch_pending()?;
            installer.create(&self.path, self.python_version.as_deref(), ctx)?;

            if !self.python_executable().is_file() {
                return Err(EnvError::EnvironmentCreation {
                    path: self.path.clone(),
                    detail: format!(
                        "no interpreter at {} after creation",
                        self.python_executable().display()
                    ),
                });
            }
        }

        let digest = match &self.requirements {
            Some(requirements) => Some(requirements.digest()?),
            None => None,
        };
        let recorded = previous
            .as_ref()
            .and_then(|marker| marker.requirements_digest.clone());

        if let Some(requirements) = &self.requirements {
            if digest != recorded {
                installer.install(&self.path, &self.python_executable(), requirements, ctx)?;
            }
        }

        let marker = EnvMarker {
            created_at: previous.map_or_else(Utc::now, |m| m.created_at),
            python: self.python_version.clone(),
            requirements_digest: digest,
            installer: installer.name().to_string(),
        };
        self.write_marker(&marker)?;
        self.clear_pending()
    }

    /// Installs additional requirements into an already created environment
    pub fn install(
        &self,
        requirements: &Requirements,
        ctx: &ExecutionContext,
    ) -> Result<(), EnvError> {
        if !self.exists() {
            return Err(EnvError::NotCreated(self.path.clone()));
        }
        let _lock = self.lock()?;
        Installer::resolve(self.backend, ctx).install(
            &self.path,
            &self.python_executable(),
            requirements,
            ctx,
        )
    }

    /// Points `ctx` at this environment
    ///
    /// A no-op when already active. Only one environment can be active in a
    /// context at a time: activating a second one nests, and its deactivation
    /// restores the first environment's context, not the original one.
    pub fn activate(&mut self, ctx: &mut ExecutionContext) -> Result<(), EnvError> {
        if self.is_active() {
            return Ok(());
        }
        if !self.exists() {
            return Err(EnvError::NotCreated(self.path.clone()));
        }

        self.saved = Some(ctx.clone());

        ctx.prepend_path(self.bin_dir());
        if let Some(site_packages) = self.site_packages() {
            ctx.prepend_path_var("PYTHONPATH", &site_packages);
        }
        ctx.set_var("VIRTUAL_ENV", self.path.to_string_lossy());
        ctx.remove_var("PYTHONHOME");
        ctx.prefix = Some(self.path.clone());

        self.state = ActivationState::Active;
        Ok(())
    }

    /// Restores the context saved by the matching [`activate`](Self::activate)
    ///
    /// A no-op when inactive.
    pub fn deactivate(&mut self, ctx: &mut ExecutionContext) {
        if !self.is_active() {
            return;
        }
        if let Some(saved) = self.saved.take() {
            *ctx = saved;
        }
        self.state = ActivationState::Inactive;
    }

    /// Activates for the lifetime of the returned guard
    pub fn activate_scoped<'a>(
        &'a mut self,
        ctx: &'a mut ExecutionContext,
    ) -> Result<ActiveEnvironment<'a>, EnvError> {
        self.activate(ctx)?;
        Ok(ActiveEnvironment { env: self, ctx })
    }

    /// Deletes the environment directory
    pub fn remove(&mut self, ctx: &mut ExecutionContext) -> Result<(), EnvError> {
        self.deactivate(ctx);
        let _lock = self.lock()?;
        self.remove_dir()?;
        self.clear_pending()
    }

    /// Fails unless the path is absent or an empty directory
    fn check_vacant(&self) -> Result<(), EnvError> {
        let mut entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(_) if self.path.exists() => {
                return Err(self.refuse("the path exists and is not a directory"))
            }
            Err(source) => {
                return Err(EnvError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if entries.next().is_some() {
            return Err(self.refuse("the directory is not empty and holds no interpreter"));
        }
        Ok(())
    }

    fn refuse(&self, reason: &str) -> EnvError {
        EnvError::EnvironmentCreation {
            path: self.path.clone(),
            detail: format!("refusing to overwrite: {}", reason),
        }
    }

    fn remove_dir(&self) -> Result<(), EnvError> {
        match fs::remove_dir_all(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(EnvError::Io {
                path: self.path.clone(),
                source: e,
            }),
            _ => Ok(()),
        }
    }

    fn touch_pending(&self) -> Result<(), EnvError> {
        let path = self.pending_path();
        fs::write(&path, Utc::now().to_rfc3339()).map_err(|source| EnvError::Io { path, source })
    }

    fn clear_pending(&self) -> Result<(), EnvError> {
        let path = self.pending_path();
        match fs::remove_file(&path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(EnvError::Io { path, source: e }),
            _ => Ok(()),
        }
    }

    fn lock(&self) -> Result<File, EnvError> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(|source| EnvError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|source| EnvError::Io {
                path: lock_path.clone(),
                source,
            })?;
        file.lock_exclusive().map_err(|source| EnvError::Io {
            path: lock_path,
            source,
        })?;
        Ok(file)
    }

    fn write_marker(&self, marker: &EnvMarker) -> Result<(), EnvError> {
        let path = self.marker_path();
        let content = serde_json::to_string_pretty(marker).map_err(|e| EnvError::Io {
            path: path.clone(),
            source: e.into(),
        })?;
        fs::write(&path, content).map_err(|source| EnvError::Io { path, source })
    }
}

/// Resolves `.` and `..` components without touching the filesystem
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(normalized.components().next_back(), Some(Component::Normal(_))) {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Guard keeping an environment active; deactivates on drop
pub struct ActiveEnvironment<'a> {
    env: &'a mut IsolatedEnvironment,
    ctx: &'a mut ExecutionContext,
}

impl ActiveEnvironment<'_> {
    pub fn environment(&self) -> &IsolatedEnvironment {
        self.env
    }
}

impl Deref for ActiveEnvironment<'_> {
    type Target = ExecutionContext;

    fn deref(&self) -> &ExecutionContext {
        self.ctx
    }
}

impl DerefMut for ActiveEnvironment<'_> {
    fn deref_mut(&mut self) -> &mut ExecutionContext {
        self.ctx
    }
}

impl Drop for ActiveEnvironment<'_> {
    fn drop(&mut self) {
        self.env.deactivate(self.ctx);
    }
}

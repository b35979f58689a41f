//! Executable task sources
//!
//! Any executable `task_*` file that is not a declarative file is asked for
//! its manifest with `--manifest` and later re-spawned with `--invoke`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::rc::Rc;

use anyhow::{Context, Result};

use super::protocol::{InvokeRequest, INVOKE_FLAG, MANIFEST_FLAG};
use super::schema::TaskFile;
use super::shell::status_to_result;
use super::{export_invocation, Declaration, LoaderSettings, TaskLoader};
use crate::domain::{BoundArgs, TaskCallback, TaskFailure, TreePath};
use crate::venv::ExecutionContext;

/// Loads executable `task_*` files through the manifest protocol
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutableLoader;

impl ExecutableLoader {
    fn load_manifest(path: &Path, root: &Path) -> Result<TaskFile> {
        let output = Command::new(path)
            .arg(MANIFEST_FLAG)
            .current_dir(root)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to execute task source: {}", path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Manifest request failed ({}): {}", output.status, stderr.trim());
        }

        serde_json::from_slice(&output.stdout).context("Failed to parse task manifest")
    }
}

impl TaskLoader for ExecutableLoader {
    fn name(&self) -> &'static str {
        "executable"
    }

    fn accepts(&self, path: &Path) -> bool {
        is_executable(path)
    }

    fn load(&self, path: &Path, settings: &LoaderSettings) -> Result<Vec<Declaration>> {
        let manifest = Self::load_manifest(path, &settings.root)?;
        let executable = path.to_path_buf();

        manifest.into_declarations(settings, |command| {
            let task = ExecutableTask {
                executable: executable.clone(),
                root: settings.root.clone(),
                workdir: command.working_dir(settings),
            };
            Ok(Rc::new(task) as Rc<dyn TaskCallback>)
        })
    }
}

/// Callback that re-spawns the declaring executable
#[derive(Debug, Clone)]
pub struct ExecutableTask {
    pub executable: PathBuf,
    pub root: PathBuf,
    pub workdir: PathBuf,
}

impl TaskCallback for ExecutableTask {
    fn invoke(
        &self,
        path: &TreePath,
        args: &BoundArgs,
        ctx: &mut ExecutionContext,
    ) -> Result<(), TaskFailure> {
        let mut command = ctx.command(&self.executable);
        command
            .arg(INVOKE_FLAG)
            .arg(path.to_string())
            .current_dir(&self.workdir)
            .stdin(Stdio::piped());
        export_invocation(&mut command, &self.root, path, args);

        let mut child = command.spawn().map_err(|e| {
            TaskFailure::Crashed(format!(
                "failed to spawn {}: {}",
                self.executable.display(),
                e
            ))
        })?;

        let request = serde_json::to_string(&InvokeRequest::new(path, args))
            .map_err(|e| TaskFailure::Crashed(format!("failed to encode request: {}", e)))?;
        if let Some(mut stdin) = child.stdin.take() {
            // A task that never reads stdin may exit first; that is not an error.
            let _ = writeln!(stdin, "{}", request);
        }

        let status = child
            .wait()
            .map_err(|e| TaskFailure::Crashed(format!("failed to wait for task: {}", e)))?;
        status_to_result(status)
    }

    fn describe(&self) -> String {
        format!("exec: {}", self.executable.display())
    }
}

/// Checks if a file is executable
fn is_executable(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = path.metadata() {
            return meta.permissions().mode() & 0o111 != 0;
        }
    }

    #[cfg(windows)]
    {
        if let Some(ext) = path.extension() {
            return ext == "exe" || ext == "bat" || ext == "cmd";
        }
    }

    false
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::domain::ArgValue;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_script(path: &Path, body: &str) {
        fs::write(path, body).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    const DEPLOY: &str = r#"#!/bin/sh
if [ "$1" = "--manifest" ]; then
  echo '{"groups":[{"name":"ops"}],"commands":[{"name":"deploy","groups":["ops"],"args":[{"name":"target"}]}]}'
  exit 0
fi
if [ "$1" = "--invoke" ]; then
  read request
  printf '%s\n%s\n' "$2" "$request" > invoked.txt
  exit 0
fi
exit 1
"#;

    #[test]
    fn non_executable_is_not_accepted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("task_x.py");
        fs::write(&path, "print('hi')").unwrap();

        assert!(!ExecutableLoader.accepts(&path));
    }

    #[test]
    fn manifest_and_invoke_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("task_deploy");
        write_script(&path, DEPLOY);
        assert!(ExecutableLoader.accepts(&path));

        let decls = ExecutableLoader
            .load(&path, &LoaderSettings::new(dir.path()))
            .unwrap();
        assert_eq!(decls.len(), 2);

        let command = match &decls[1] {
            Declaration::Command(cmd) => cmd.clone(),
            other => panic!("unexpected {:?}", other),
        };
        let mut args = BoundArgs::new();
        args.insert("target", ArgValue::Str("prod".into()));

        command
            .callback
            .invoke(
                &TreePath::parse("ops.deploy").unwrap(),
                &args,
                &mut ExecutionContext::capture(),
            )
            .unwrap();

        let invoked = fs::read_to_string(dir.path().join("invoked.txt")).unwrap();
        let mut lines = invoked.lines();
        assert_eq!(lines.next(), Some("ops.deploy"));
        let request: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(request["args"]["target"], "prod");
    }

    #[test]
    fn failing_manifest_is_a_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("task_broken");
        write_script(&path, "#!/bin/sh\necho nope >&2\nexit 3\n");

        let err = ExecutableLoader
            .load(&path, &LoaderSettings::new(dir.path()))
            .unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn garbage_manifest_is_a_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("task_garbage");
        write_script(&path, "#!/bin/sh\necho not json\n");

        assert!(ExecutableLoader
            .load(&path, &LoaderSettings::new(dir.path()))
            .is_err());
    }
}

//! Wrapping a task callback in an isolated environment

use std::path::PathBuf;
use std::rc::Rc;

use crate::domain::{BoundArgs, TaskCallback, TaskFailure, TreePath};

use super::context::ExecutionContext;
use super::environment::IsolatedEnvironment;
use super::installer::InstallerBackend;
use super::requirements::Requirements;

/// Where and how to provision the environment for a wrapped task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenvSpec {
    pub path: PathBuf,
    pub python: Option<String>,
    pub requirements: Option<Requirements>,
    pub installer: InstallerBackend,
}

impl VenvSpec {
    fn environment(&self) -> IsolatedEnvironment {
        let mut env = IsolatedEnvironment::new(&self.path).with_installer(self.installer);
        if let Some(python) = &self.python {
            env = env.with_python(python.clone());
        }
        if let Some(requirements) = &self.requirements {
            env = env.with_requirements(requirements.clone());
        }
        env
    }
}

/// Runs the inner callback with its environment ensured and active
///
/// The context is restored before the result is returned, whether the
/// callback succeeded or failed.
pub struct VenvRequired {
    spec: VenvSpec,
    inner: Rc<dyn TaskCallback>,
}

impl VenvRequired {
    pub fn new(spec: VenvSpec, inner: Rc<dyn TaskCallback>) -> Self {
        Self { spec, inner }
    }

    pub fn spec(&self) -> &VenvSpec {
        &self.spec
    }
}

impl TaskCallback for VenvRequired {
    fn invoke(
        &self,
        path: &TreePath,
        args: &BoundArgs,
        ctx: &mut ExecutionContext,
    ) -> Result<(), TaskFailure> {
        let mut env = self.spec.environment();
        env.ensure(ctx)?;

        let mut active = env.activate_scoped(ctx)?;
        self.inner.invoke(path, args, &mut active)
    }

    fn describe(&self) -> String {
        format!("{} in {}", self.inner.describe(), self.spec.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FnTask;
    use crate::venv::environment::tests::fake_environment;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[test]
    fn inner_sees_active_context_and_outer_is_restored() {
        let dir = TempDir::new().unwrap();
        let env = fake_environment(dir.path());
        let env_path = env.path().to_path_buf();

        let seen = Rc::new(RefCell::new(None));
        let seen_inner = Rc::clone(&seen);
        let inner = FnTask(move |_: &TreePath, _: &BoundArgs, ctx: &mut ExecutionContext| {
            *seen_inner.borrow_mut() = ctx.var("VIRTUAL_ENV").map(str::to_string);
            Err(TaskFailure::Failed { code: 2 })
        });

        let wrapped = VenvRequired::new(
            VenvSpec {
                path: env_path.clone(),
                python: None,
                requirements: None,
                installer: InstallerBackend::Pip,
            },
            Rc::new(inner),
        );

        let mut ctx = ExecutionContext::default();
        ctx.path = vec![dir.path().to_path_buf()];
        let before = ctx.clone();

        let result = wrapped.invoke(&TreePath::root(), &BoundArgs::new(), &mut ctx);

        assert!(matches!(result, Err(TaskFailure::Failed { code: 2 })));
        assert_eq!(
            seen.borrow().as_deref(),
            Some(&*env_path.to_string_lossy())
        );
        assert_eq!(ctx, before);
    }

    #[test]
    fn provisioning_failure_surfaces_as_environment_failure() {
        let dir = TempDir::new().unwrap();
        let inner = FnTask(|_: &TreePath, _: &BoundArgs, _: &mut ExecutionContext| Ok(()));
        let wrapped = VenvRequired::new(
            VenvSpec {
                path: dir.path().join("never"),
                python: None,
                requirements: None,
                installer: InstallerBackend::Uv,
            },
            Rc::new(inner),
        );

        let mut ctx = ExecutionContext::default();
        ctx.path = vec![dir.path().to_path_buf()];
        let before = ctx.clone();

        let result = wrapped.invoke(&TreePath::root(), &BoundArgs::new(), &mut ctx);
        assert!(matches!(result, Err(TaskFailure::Environment(_))));
        assert_eq!(ctx, before);
    }

    /// Installs a real package, so it needs network access and uv or pip
    #[test]
    #[ignore]
    fn requirements_are_importable_only_while_active() {
        let dir = TempDir::new().unwrap();
        let imported = Rc::new(RefCell::new(false));
        let imported_inner = Rc::clone(&imported);
        let inner = FnTask(move |_: &TreePath, _: &BoundArgs, ctx: &mut ExecutionContext| {
            let status = ctx
                .command("python")
                .args(["-c", "import six"])
                .status()
                .map_err(|e| TaskFailure::Crashed(e.to_string()))?;
            *imported_inner.borrow_mut() = status.success();
            Ok(())
        });

        let wrapped = VenvRequired::new(
            VenvSpec {
                path: dir.path().join(".venv"),
                python: None,
                requirements: Some(Requirements::Package("six".into())),
                installer: InstallerBackend::Auto,
            },
            Rc::new(inner),
        );

        let mut ctx = ExecutionContext::capture();
        ctx.remove_var("VIRTUAL_ENV");
        ctx.prefix = None;
        let before = ctx.clone();

        wrapped
            .invoke(&TreePath::root(), &BoundArgs::new(), &mut ctx)
            .unwrap();

        assert!(*imported.borrow());
        assert_eq!(ctx, before);
    }
}

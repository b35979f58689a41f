//! TOML and YAML task files

use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};

use super::schema::TaskFile;
use super::shell::ShellTask;
use super::{Declaration, LoaderSettings, TaskLoader};
use crate::domain::TaskCallback;

/// Loads `task_*.toml`, `task_*.yaml` and `task_*.yml`
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclarativeLoader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Toml,
    Yaml,
}

fn format_of(path: &Path) -> Option<Format> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Some(Format::Toml),
        Some("yaml") | Some("yml") => Some(Format::Yaml),
        _ => None,
    }
}

impl TaskLoader for DeclarativeLoader {
    fn name(&self) -> &'static str {
        "declarative"
    }

    fn accepts(&self, path: &Path) -> bool {
        format_of(path).is_some()
    }

    fn load(&self, path: &Path, settings: &LoaderSettings) -> Result<Vec<Declaration>> {
        let format = format_of(path)
            .ok_or_else(|| anyhow!("unsupported extension: {}", path.display()))?;
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read task file: {}", path.display()))?;

        let file: TaskFile = match format {
            Format::Toml => toml::from_str(&content).context("Failed to parse TOML")?,
            Format::Yaml if content.trim().is_empty() => TaskFile::default(),
            Format::Yaml => serde_yaml::from_str(&content).context("Failed to parse YAML")?,
        };

        file.into_declarations(settings, |command| {
            let script = command
                .run
                .as_ref()
                .ok_or_else(|| anyhow!("no `run` script"))?;
            let task = ShellTask::new(script.clone(), settings.root.clone())
                .in_dir(command.working_dir(settings));
            Ok(Rc::new(task) as Rc<dyn TaskCallback>)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn accepts_by_extension() {
        let loader = DeclarativeLoader;
        assert!(loader.accepts(Path::new("task_a.toml")));
        assert!(loader.accepts(Path::new("task_a.yml")));
        assert!(!loader.accepts(Path::new("task_a.py")));
        assert!(!loader.accepts(Path::new("task_a")));
    }

    #[test]
    fn load_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("task_docs.yaml");
        fs::write(
            &path,
            r#"
command:
  - name: build
    about: build the docs
    run: echo building
    arg:
      - name: open
        long: open
        takes_value: false
"#,
        )
        .unwrap();

        let decls = DeclarativeLoader
            .load(&path, &LoaderSettings::new(dir.path()))
            .unwrap();
        assert_eq!(decls.len(), 1);
        match &decls[0] {
            Declaration::Command(cmd) => {
                assert_eq!(cmd.about.as_deref(), Some("build the docs"));
                assert!(cmd.find_long("open").is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn command_without_run_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("task_x.toml");
        fs::write(&path, "[[command]]\nname = \"x\"\n").unwrap();

        let err = DeclarativeLoader
            .load(&path, &LoaderSettings::new(dir.path()))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("no `run` script"));
    }

    #[test]
    fn syntax_error_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("task_bad.toml");
        fs::write(&path, "[[command]\nname = ").unwrap();

        assert!(DeclarativeLoader
            .load(&path, &LoaderSettings::new(dir.path()))
            .is_err());
    }

    #[test]
    fn empty_file_declares_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("task_empty.toml");
        fs::write(&path, "").unwrap();

        let decls = DeclarativeLoader
            .load(&path, &LoaderSettings::new(dir.path()))
            .unwrap();
        assert!(decls.is_empty());
    }
}

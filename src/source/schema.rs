//! Serialized form of a task source
//!
//! The same tree is read from TOML, YAML, and executable manifests (JSON).

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use super::{Declaration, LoaderSettings};
use crate::domain::{ArgumentDescriptor, CommandDescriptor, GroupDescriptor, TaskCallback, TreePath};
use crate::venv::{normalize_path, Requirements, VenvRequired, VenvSpec};

/// Default environment location, relative to the project root
const DEFAULT_VENV_PATH: &str = ".venv";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskFile {
    #[serde(alias = "groups")]
    pub group: Vec<GroupDecl>,

    #[serde(alias = "commands")]
    pub command: Vec<CommandDecl>,

    #[serde(alias = "arguments")]
    pub argument: Vec<LateArgumentDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupDecl {
    pub name: String,
    #[serde(default)]
    pub about: Option<String>,
    /// Dotted path of the enclosing group
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandDecl {
    pub name: String,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub long_about: Option<String>,
    /// Dotted group paths
    #[serde(default)]
    pub groups: Vec<String>,
    /// Shell script (declarative sources only)
    #[serde(default)]
    pub run: Option<String>,
    /// Working directory relative to the project root
    #[serde(default)]
    pub workdir: Option<String>,
    #[serde(default)]
    pub venv: Option<VenvDecl>,
    #[serde(default, alias = "args")]
    pub arg: Vec<ArgumentDescriptor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VenvDecl {
    pub path: Option<String>,
    pub python: Option<String>,
    /// Package name, list of package names, or manifest path
    pub requirements: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LateArgumentDecl {
    /// Dotted path of the target command
    pub command: String,
    #[serde(flatten)]
    pub argument: ArgumentDescriptor,
}

impl VenvDecl {
    pub fn to_spec(&self, settings: &LoaderSettings) -> Result<VenvSpec> {
        let path = normalize_path(
            &settings
                .root
                .join(self.path.as_deref().unwrap_or(DEFAULT_VENV_PATH)),
        );
        if normalize_path(&settings.root).starts_with(&path) {
            return Err(anyhow!(
                "venv path {} would contain the project root",
                path.display()
            ));
        }
        let requirements = self
            .requirements
            .as_ref()
            .map(|value| Requirements::from_value(value, &settings.root))
            .transpose()?;

        Ok(VenvSpec {
            path,
            python: self.python.clone().or_else(|| settings.python.clone()),
            requirements,
            installer: settings.installer,
        })
    }
}

impl CommandDecl {
    /// Working directory for the command's subprocess
    pub fn working_dir(&self, settings: &LoaderSettings) -> PathBuf {
        match &self.workdir {
            Some(dir) => settings.root.join(dir),
            None => settings.root.clone(),
        }
    }
}

impl TaskFile {
    /// Validates the file and turns it into declarations
    ///
    /// `callback` builds the invocable part of each command; a `venv`
    /// table wraps it in [`VenvRequired`].
    pub fn into_declarations<F>(
        self,
        settings: &LoaderSettings,
        mut callback: F,
    ) -> Result<Vec<Declaration>>
    where
        F: FnMut(&CommandDecl) -> Result<Rc<dyn TaskCallback>>,
    {
        let mut declarations = Vec::new();

        for group in self.group {
            let parent = TreePath::parse(group.parent.as_deref().unwrap_or(""))
                .with_context(|| format!("group '{}'", group.name))?;
            let descriptor = GroupDescriptor {
                name: group.name,
                about: group.about,
                parent,
            };
            descriptor.validate()?;
            declarations.push(Declaration::Group(descriptor));
        }

        for command in self.command {
            let mut task = callback(&command)
                .with_context(|| format!("command '{}'", command.name))?;
            if let Some(venv) = &command.venv {
                let spec = venv
                    .to_spec(settings)
                    .with_context(|| format!("command '{}'", command.name))?;
                task = Rc::new(VenvRequired::new(spec, task));
            }

            let mut descriptor = CommandDescriptor::new(command.name.clone(), task);
            descriptor.about = command.about;
            descriptor.long_about = command.long_about;
            descriptor.arguments = command.arg.into_iter().map(|a| a.normalized()).collect();
            for group in &command.groups {
                let path = TreePath::parse(group)
                    .with_context(|| format!("command '{}'", command.name))?;
                if path.is_root() {
                    return Err(anyhow!(
                        "command '{}' lists an empty group path",
                        command.name
                    ));
                }
                descriptor.groups.insert(path);
            }

            descriptor.validate()?;
            declarations.push(Declaration::Command(descriptor));
        }

        for late in self.argument {
            let target = TreePath::parse(&late.command)
                .with_context(|| format!("argument '{}'", late.argument.name))?;
            if target.is_root() {
                return Err(anyhow!(
                    "argument '{}' does not name a command",
                    late.argument.name
                ));
            }
            let argument = late.argument.normalized();
            argument.validate()?;
            declarations.push(Declaration::Argument {
                command: target,
                argument,
            });
        }

        Ok(declarations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoundArgs, FnTask, TaskFailure};
    use crate::venv::ExecutionContext;

    fn noop(_: &CommandDecl) -> Result<Rc<dyn TaskCallback>> {
        Ok(Rc::new(FnTask(
            |_: &TreePath, _: &BoundArgs, _: &mut ExecutionContext| -> Result<(), TaskFailure> {
                Ok(())
            },
        )))
    }

    fn settings() -> LoaderSettings {
        LoaderSettings::new("/project")
    }

    #[test]
    fn parse_full_toml() {
        let file: TaskFile = toml::from_str(
            r#"
[[group]]
name = "group1"
about = "testing group"

[[group]]
name = "group2"
parent = "group1"

[[command]]
name = "flag2"
about = "nested"
groups = ["group1.group2"]
run = "touch nested_group.txt"

[[command.arg]]
name = "test"
short = "t"
takes_value = false

[[argument]]
command = "group1.group2.flag2"
name = "extra"
long = "extra"
"#,
        )
        .unwrap();

        let decls = file.into_declarations(&settings(), noop).unwrap();
        assert_eq!(decls.len(), 4);

        match &decls[1] {
            Declaration::Group(group) => assert_eq!(group.path().to_string(), "group1.group2"),
            other => panic!("unexpected {:?}", other),
        }
        match &decls[2] {
            Declaration::Command(cmd) => {
                assert_eq!(cmd.name, "flag2");
                assert!(cmd.arguments[0].is_flag());
                assert!(cmd.groups.contains(&TreePath::parse("group1.group2").unwrap()));
            }
            other => panic!("unexpected {:?}", other),
        }
        match &decls[3] {
            Declaration::Argument { command, argument } => {
                assert_eq!(command.to_string(), "group1.group2.flag2");
                assert_eq!(argument.long.as_deref(), Some("extra"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn manifest_json_uses_plural_keys() {
        let file: TaskFile = serde_json::from_str(
            r#"{"groups":[{"name":"ops"}],"commands":[{"name":"deploy","groups":["ops"],"args":[{"name":"env"}]}]}"#,
        )
        .unwrap();

        assert_eq!(file.group.len(), 1);
        assert_eq!(file.command[0].arg.len(), 1);
    }

    #[test]
    fn unknown_value_type_is_rejected() {
        let result: Result<TaskFile, _> = toml::from_str(
            r#"
[[command]]
name = "x"
run = "true"

[[command.arg]]
name = "n"
value_type = "complex"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_argument_fails_the_file() {
        let file: TaskFile = toml::from_str(
            r#"
[[command]]
name = "x"
run = "true"

[[command.arg]]
name = "a"

[[command.arg]]
name = "a"
"#,
        )
        .unwrap();

        assert!(file.into_declarations(&settings(), noop).is_err());
    }

    #[test]
    fn values_on_flag_fail_the_file() {
        let file: TaskFile = toml::from_str(
            r#"
[[command]]
name = "x"
run = "true"

[[command.arg]]
name = "a"
takes_value = false
multiple_values = true
"#,
        )
        .unwrap();

        assert!(file.into_declarations(&settings(), noop).is_err());
    }

    #[test]
    fn venv_table_resolves_against_root() {
        let decl = VenvDecl {
            path: None,
            python: Some("3.11".into()),
            requirements: Some(serde_json::json!(["six"])),
        };
        let spec = decl.to_spec(&settings()).unwrap();

        assert_eq!(spec.path, PathBuf::from("/project/.venv"));
        assert_eq!(
            spec.requirements,
            Some(Requirements::Packages(vec!["six".into()]))
        );
    }

    #[test]
    fn venv_path_enclosing_the_project_is_rejected() {
        for path in [".", "", "..", "sub/../.."] {
            let decl = VenvDecl {
                path: Some(path.into()),
                python: None,
                requirements: None,
            };
            let err = decl.to_spec(&settings()).unwrap_err();
            assert!(err.to_string().contains("project root"), "{}: {}", path, err);
        }
    }

    #[test]
    fn venv_path_is_normalized() {
        let decl = VenvDecl {
            path: Some("./envs/../.venv".into()),
            python: None,
            requirements: None,
        };
        assert_eq!(
            decl.to_spec(&settings()).unwrap().path,
            PathBuf::from("/project/.venv")
        );
    }

    #[test]
    fn invalid_requirements_fail() {
        let decl = VenvDecl {
            path: None,
            python: None,
            requirements: Some(serde_json::json!(3)),
        };
        assert!(decl.to_spec(&settings()).is_err());
    }
}

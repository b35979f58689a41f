//! The discovery pool
//!
//! A [`TaskRegistry`] collects what every task source declared. It is an
//! explicit value handed to discovery, so rebuilding is `clear()` plus
//! another discovery run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::domain::{ArgumentDescriptor, CommandDescriptor, GroupDescriptor, TreePath};
use crate::source::Declaration;

/// A command together with the file that declared it
#[derive(Debug, Clone)]
pub struct RegisteredCommand {
    pub source: PathBuf,
    pub descriptor: CommandDescriptor,
}

/// An argument declared apart from its command
#[derive(Debug, Clone)]
pub struct LateArgument {
    pub source: PathBuf,
    pub command: TreePath,
    pub argument: ArgumentDescriptor,
}

#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    groups: BTreeMap<TreePath, GroupDescriptor>,
    commands: Vec<RegisteredCommand>,
    arguments: Vec<LateArgument>,
    sources: Vec<PathBuf>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops everything registered so far
    pub fn clear(&mut self) {
        self.groups.clear();
        self.commands.clear();
        self.arguments.clear();
        self.sources.clear();
    }

    /// Registers the declarations loaded from `source`
    ///
    /// Groups merge by full path; the first description seen is kept.
    /// Ancestors of declared groups and of command group paths are created
    /// implicitly.
    pub fn absorb(&mut self, source: &Path, declarations: Vec<Declaration>) {
        self.sources.push(source.to_path_buf());

        for declaration in declarations {
            match declaration {
                Declaration::Group(group) => self.add_group(group),
                Declaration::Command(descriptor) => {
                    for group in descriptor.groups.clone() {
                        self.ensure_group(&group);
                    }
                    self.commands.push(RegisteredCommand {
                        source: source.to_path_buf(),
                        descriptor,
                    });
                }
                Declaration::Argument { command, argument } => {
                    self.arguments.push(LateArgument {
                        source: source.to_path_buf(),
                        command,
                        argument,
                    });
                }
            }
        }
    }

    fn add_group(&mut self, group: GroupDescriptor) {
        let path = group.path();
        self.ensure_group(&group.parent);

        match self.groups.get_mut(&path) {
            Some(existing) => {
                if existing.about.is_none() {
                    existing.about = group.about;
                }
            }
            None => {
                self.groups.insert(path, group);
            }
        }
    }

    /// Creates `path` and its ancestors as undescribed groups when missing
    fn ensure_group(&mut self, path: &TreePath) {
        for ancestor in path.ancestors().chain(std::iter::once(path.clone())) {
            if ancestor.is_root() || self.groups.contains_key(&ancestor) {
                continue;
            }
            if let Some(group) = GroupDescriptor::at_path(&ancestor) {
                self.groups.insert(ancestor, group);
            }
        }
    }

    pub fn groups(&self) -> impl Iterator<Item = &GroupDescriptor> {
        self.groups.values()
    }

    pub fn group(&self, path: &TreePath) -> Option<&GroupDescriptor> {
        self.groups.get(path)
    }

    pub fn commands(&self) -> &[RegisteredCommand] {
        &self.commands
    }

    pub fn arguments(&self) -> &[LateArgument] {
        &self.arguments
    }

    /// Files that contributed, in load order
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.commands.is_empty() && self.arguments.is_empty()
    }
}

//! Command tree assembly
//!
//! Turns the flat registry into a tree keyed by group path. Assembly fails
//! as a whole on the first problem; no partial tree is ever returned.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde::Serialize;
use thiserror::Error;

use super::registry::TaskRegistry;
use crate::domain::{CommandDescriptor, TreePath};

/// Names owned by angreal itself at the root
pub const RESERVED_ROOT_NAMES: &[&str] = &[
    "init",
    "list",
    "help",
    "completion",
    "_complete",
    "_completion",
];

#[derive(Debug, Error, PartialEq)]
pub enum AssemblyError {
    #[error("Name collision under {parent}: '{name}' is declared by {first} and {second}")]
    NameCollision {
        parent: TreePath,
        name: String,
        first: String,
        second: String,
    },

    #[error("Argument '{argument}' ({source_file}) targets unknown command '{command}'")]
    OrphanArgument {
        command: TreePath,
        argument: String,
        source_file: String,
    },

    #[error("Argument '{argument}' cannot be added to '{command}': {reason}")]
    DuplicateArgument {
        command: TreePath,
        argument: String,
        reason: String,
    },
}

/// One level of the tree
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<String, GroupNode>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub commands: BTreeMap<String, Rc<CommandDescriptor>>,
}

impl GroupNode {
    pub fn group(&self, name: &str) -> Option<&GroupNode> {
        self.groups.get(name)
    }

    pub fn command(&self, name: &str) -> Option<&Rc<CommandDescriptor>> {
        self.commands.get(name)
    }

    /// Names of child groups and commands, sorted
    pub fn child_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .groups
            .keys()
            .chain(self.commands.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.commands.is_empty()
    }
}

/// The assembled hierarchy of groups and commands
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct CommandTree {
    root: GroupNode,
}

impl CommandTree {
    /// A tree with nothing in it, used when no project is available
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &GroupNode {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// The group node at `path`
    pub fn node(&self, path: &TreePath) -> Option<&GroupNode> {
        let mut node = &self.root;
        for segment in path.segments() {
            node = node.groups.get(segment)?;
        }
        Some(node)
    }

    /// The command at full path `path`
    pub fn command(&self, path: &TreePath) -> Option<&Rc<CommandDescriptor>> {
        let parent = path.parent()?;
        self.node(&parent)?.command(path.name()?)
    }

    /// Every command with its full path, depth first in name order
    pub fn commands(&self) -> Vec<(TreePath, Rc<CommandDescriptor>)> {
        let mut out = Vec::new();
        collect(&self.root, &TreePath::root(), &mut out);
        out
    }

    fn node_mut(&mut self, path: &TreePath) -> &mut GroupNode {
        let mut node = &mut self.root;
        for segment in path.segments() {
            node = node.groups.entry(segment.clone()).or_default();
        }
        node
    }
}

fn collect(node: &GroupNode, path: &TreePath, out: &mut Vec<(TreePath, Rc<CommandDescriptor>)>) {
    for (name, command) in &node.commands {
        out.push((path.child(name.clone()), Rc::clone(command)));
    }
    for (name, group) in &node.groups {
        collect(group, &path.child(name.clone()), out);
    }
}

/// A name claimed at some level, with who claimed it
struct Claim {
    name: String,
    origin: String,
}

/// Builds the tree from everything registered
pub fn assemble(registry: &TaskRegistry) -> Result<CommandTree, AssemblyError> {
    check_collisions(registry)?;

    // Late-bound arguments, applied before commands become shared
    let mut commands: Vec<CommandDescriptor> = registry
        .commands()
        .iter()
        .map(|registered| registered.descriptor.clone())
        .collect();

    let mut by_path: HashMap<TreePath, usize> = HashMap::new();
    for (index, command) in commands.iter().enumerate() {
        for parent in command.placements() {
            by_path.insert(parent.child(command.name.clone()), index);
        }
    }

    for late in registry.arguments() {
        let index = *by_path
            .get(&late.command)
            .ok_or_else(|| AssemblyError::OrphanArgument {
                command: late.command.clone(),
                argument: late.argument.name.clone(),
                source_file: late.source.display().to_string(),
            })?;
        commands[index]
            .add_argument(late.argument.clone())
            .map_err(|e| AssemblyError::DuplicateArgument {
                command: late.command.clone(),
                argument: late.argument.name.clone(),
                reason: e.to_string(),
            })?;
    }

    let mut tree = CommandTree::default();
    for group in registry.groups() {
        let node = tree.node_mut(&group.path());
        if node.about.is_none() {
            node.about = group.about.clone();
        }
    }
    for command in commands {
        let placements = command.placements();
        let shared = Rc::new(command);
        for parent in placements {
            tree.node_mut(&parent)
                .commands
                .insert(shared.name.clone(), Rc::clone(&shared));
        }
    }

    Ok(tree)
}

/// Reports the first duplicate name, levels and names in sorted order
fn check_collisions(registry: &TaskRegistry) -> Result<(), AssemblyError> {
    let mut levels: BTreeMap<TreePath, Vec<Claim>> = BTreeMap::new();

    for name in RESERVED_ROOT_NAMES {
        levels.entry(TreePath::root()).or_default().push(Claim {
            name: name.to_string(),
            origin: "angreal (reserved)".to_string(),
        });
    }

    for group in registry.groups() {
        levels.entry(group.parent.clone()).or_default().push(Claim {
            name: group.name.clone(),
            origin: format!("group {}", group.path()),
        });
    }

    for registered in registry.commands() {
        for parent in registered.descriptor.placements() {
            levels.entry(parent).or_default().push(Claim {
                name: registered.descriptor.name.clone(),
                origin: registered.source.display().to_string(),
            });
        }
    }

    for (parent, mut claims) in levels {
        claims.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.origin.cmp(&b.origin)));
        for pair in claims.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(AssemblyError::NameCollision {
                    parent,
                    name: pair[0].name.clone(),
                    first: pair[0].origin.clone(),
                    second: pair[1].origin.clone(),
                });
            }
        }
    }

    Ok(())
}

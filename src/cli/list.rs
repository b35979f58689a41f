//! `angreal list`: the assembled command tree

use anyhow::Result;

use super::output::Output;
use super::task::load_tree;
use crate::engine::GroupNode;
use crate::storage::Project;

pub fn run(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let tree = load_tree(&project, output)?;

    if output.is_json() {
        output.data(&tree);
        return Ok(());
    }

    if tree.is_empty() {
        println!("No tasks found in {}", project.angreal_dir().display());
        return Ok(());
    }

    let mut lines = Vec::new();
    render(tree.root(), 0, output.is_verbose(), &mut lines);
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

/// Indented text for `node`, groups and commands interleaved by name
///
/// With `verbose`, each command gets a second line saying what it runs.
fn render(node: &GroupNode, depth: usize, verbose: bool, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    for name in node.child_names() {
        if let Some(command) = node.command(&name) {
            lines.push(describe(&indent, &name, command.about.as_deref()));
            if verbose {
                lines.push(format!("{}  -> {}", indent, command.callback.describe()));
            }
        } else if let Some(group) = node.group(&name) {
            lines.push(describe(&indent, &format!("{}/", name), group.about.as_deref()));
            render(group, depth + 1, verbose, lines);
        }
    }
}

fn describe(indent: &str, name: &str, about: Option<&str>) -> String {
    match about {
        Some(about) => format!("{}{:<24} {}", indent, name, about),
        None => format!("{}{}", indent, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoundArgs, CommandDescriptor, FnTask, GroupDescriptor, TreePath};
    use crate::engine::{assemble, TaskRegistry};
    use crate::source::{Declaration, ShellTask};
    use crate::venv::ExecutionContext;
    use std::path::Path;
    use std::rc::Rc;

    #[test]
    fn render_nests_groups() {
        let task = Rc::new(FnTask(|_: &TreePath, _: &BoundArgs, _: &mut ExecutionContext| Ok(())));
        let mut registry = TaskRegistry::new();
        registry.absorb(
            Path::new("task_a.toml"),
            vec![
                Declaration::Group(GroupDescriptor::new("docs").about("documentation")),
                Declaration::Command(
                    CommandDescriptor::new("build", task.clone())
                        .in_group(TreePath::parse("docs").unwrap()),
                ),
                Declaration::Command(CommandDescriptor::new("check", task).about("run checks")),
            ],
        );
        let tree = assemble(&registry).unwrap();

        let mut lines = Vec::new();
        render(tree.root(), 0, false, &mut lines);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("check") && lines[0].ends_with("run checks"));
        assert!(lines[1].starts_with("docs/"));
        assert_eq!(lines[2], "  build");
    }

    #[test]
    fn verbose_render_shows_what_runs() {
        let mut registry = TaskRegistry::new();
        registry.absorb(
            Path::new("task_a.toml"),
            vec![Declaration::Command(CommandDescriptor::new(
                "check",
                Rc::new(ShellTask::new("cargo test\necho done", "/project")),
            ))],
        );
        let tree = assemble(&registry).unwrap();

        let mut lines = Vec::new();
        render(tree.root(), 0, true, &mut lines);
        assert_eq!(lines, vec!["check", "  -> sh: cargo test"]);
    }
}

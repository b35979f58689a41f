//! Completion candidates computed from the assembled tree
//!
//! The shell scripts call `angreal _complete -- <words...>` where the last
//! word is the one under the cursor (possibly empty). Candidates are printed
//! one per line.

use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};

use super::tree::{CommandTree, GroupNode};
use crate::domain::CommandDescriptor;

/// Builtins offered at the root next to discovered names
const ROOT_BUILTINS: &[&str] = &["completion", "init", "list"];

const COMPLETION_ACTIONS: &[&str] = &["install", "status", "uninstall"];

const SHELLS: &[&str] = &["bash", "zsh"];

const FORMATS: &[&str] = &["json", "text"];

/// Suggestions that come from outside the tree, such as template names
pub trait SuggestionSource {
    fn suggestions(&self) -> anyhow::Result<Vec<String>>;
}

/// Computes candidates for a partial command line
pub struct Completer<'a> {
    tree: Option<&'a CommandTree>,
    sources: BTreeMap<&'static str, &'a dyn SuggestionSource>,
}

impl<'a> Completer<'a> {
    pub fn new(tree: &'a CommandTree) -> Self {
        Self {
            tree: Some(tree),
            sources: BTreeMap::new(),
        }
    }

    /// A completer that never suggests anything
    ///
    /// Used when no project could be found; shells call completion
    /// speculatively, so the answer is empty rather than an error.
    pub fn empty() -> Self {
        Self {
            tree: None,
            sources: BTreeMap::new(),
        }
    }

    /// Attaches an external source to a root builtin
    pub fn with_source(mut self, builtin: &'static str, source: &'a dyn SuggestionSource) -> Self {
        self.sources.insert(builtin, source);
        self
    }

    /// Candidates for `words`, whose last element is the word being typed
    pub fn complete(&self, words: &[String]) -> Completion<'a> {
        let (current, prior) = match words.split_last() {
            Some((current, prior)) => (current.as_str(), prior),
            None => ("", &[][..]),
        };

        let Some(tree) = self.tree else {
            return Completion::nothing();
        };
        let Some(prior) = skip_global_options(prior) else {
            return Completion::local(current, owned(FORMATS));
        };

        let mut node = tree.root();
        for (index, token) in prior.iter().enumerate() {
            if index == 0 && ROOT_BUILTINS.contains(&token.as_str()) {
                return self.complete_builtin(token, &prior[1..], current);
            }
            if let Some(command) = node.command(token) {
                return Completion::local(current, flag_candidates(command, &prior[index + 1..], current));
            }
            match node.group(token) {
                Some(group) => node = group,
                None => return Completion::nothing(),
            }
        }

        Completion::local(current, self.level_names(node, prior.is_empty()))
    }

    fn level_names(&self, node: &GroupNode, at_root: bool) -> Vec<String> {
        let mut names: BTreeSet<String> = node.child_names().into_iter().collect();
        if at_root {
            names.extend(ROOT_BUILTINS.iter().map(|name| name.to_string()));
        }
        names.into_iter().collect()
    }

    fn complete_builtin(&self, builtin: &str, rest: &[String], current: &str) -> Completion<'a> {
        match (builtin, rest) {
            ("completion", []) => Completion::local(current, owned(COMPLETION_ACTIONS)),
            ("completion", [action]) if action == "install" || action == "uninstall" => {
                Completion::local(current, owned(SHELLS))
            }
            ("init", []) if !current.starts_with('-') => match self.sources.get("init") {
                Some(source) => Completion::external(current, *source),
                None => Completion::nothing(),
            },
            _ => Completion::nothing(),
        }
    }
}

/// Drops `-v`/`--verbose` and `-f`/`--format <value>` typed ahead of the
/// first path word; `None` when the word under the cursor is the format value
fn skip_global_options(prior: &[String]) -> Option<&[String]> {
    let mut rest = prior;
    loop {
        match rest.first().map(String::as_str) {
            Some("-v" | "--verbose") => rest = &rest[1..],
            Some("-f" | "--format") => rest = rest.get(2..)?,
            Some(word) if word.starts_with("--format=") => rest = &rest[1..],
            Some(word) if word.starts_with("-f") && word.len() > 2 => rest = &rest[1..],
            _ => return Some(rest),
        }
    }
}

/// A lazy, restartable sequence of candidates
///
/// Local names come first in sorted order; external suggestions are fetched
/// on first use, cached, and appended.
pub struct Completion<'a> {
    prefix: String,
    local: Vec<String>,
    external: Option<&'a dyn SuggestionSource>,
    fetched: OnceCell<Vec<String>>,
}

impl<'a> Completion<'a> {
    fn nothing() -> Self {
        Self::local("", Vec::new())
    }

    fn local(prefix: &str, names: Vec<String>) -> Self {
        Self {
            prefix: prefix.to_string(),
            local: names,
            external: None,
            fetched: OnceCell::new(),
        }
    }

    fn external(prefix: &str, source: &'a dyn SuggestionSource) -> Self {
        Self {
            external: Some(source),
            ..Self::local(prefix, Vec::new())
        }
    }

    /// Walks the candidates; calling it again starts over
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        let local = self.local.iter().map(String::as_str);
        let external = std::iter::once(()).flat_map(move |_| self.fetch().iter().map(String::as_str));
        local
            .chain(external)
            .filter(move |name| name.starts_with(self.prefix.as_str()))
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.iter().map(str::to_string).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    fn fetch(&self) -> &Vec<String> {
        self.fetched.get_or_init(|| match self.external {
            Some(source) => {
                let mut names = source.suggestions().unwrap_or_default();
                names.sort();
                names.dedup();
                names
            }
            None => Vec::new(),
        })
    }
}

/// Unused `--long` and `-s` spellings for a resolved command
fn flag_candidates(command: &CommandDescriptor, rest: &[String], current: &str) -> Vec<String> {
    if awaits_value(command, rest) {
        return Vec::new();
    }
    if !current.is_empty() && !current.starts_with('-') {
        return Vec::new();
    }

    let used = used_arguments(command, rest);
    let mut flags = BTreeSet::new();
    for argument in &command.arguments {
        if argument.is_positional() {
            continue;
        }
        if used.contains(argument.name.as_str()) && !argument.is_multi() {
            continue;
        }
        if let Some(long) = argument.long_name() {
            flags.insert(format!("--{}", long));
        }
        if let Some(short) = argument.short {
            flags.insert(format!("-{}", short));
        }
    }
    flags.into_iter().collect()
}

/// True when the last token is an option still waiting for its value
fn awaits_value(command: &CommandDescriptor, rest: &[String]) -> bool {
    let Some(last) = rest.last() else {
        return false;
    };
    let argument = if let Some(long) = last.strip_prefix("--") {
        if long.contains('=') {
            return false;
        }
        command.find_long(long)
    } else {
        let mut chars = last.strip_prefix('-').unwrap_or_default().chars();
        match (chars.next(), chars.next()) {
            (Some(short), None) => command.find_short(short),
            _ => None,
        }
    };
    argument.is_some_and(|arg| !arg.is_flag() && !arg.requires_equals())
}

fn used_arguments<'c>(command: &'c CommandDescriptor, rest: &[String]) -> BTreeSet<&'c str> {
    let mut used = BTreeSet::new();
    for token in rest {
        if token == "--" {
            break;
        }
        if let Some(body) = token.strip_prefix("--") {
            let name = body.split_once('=').map_or(body, |(name, _)| name);
            if let Some(argument) = command.find_long(name) {
                used.insert(argument.name.as_str());
            }
        } else if let Some(cluster) = token.strip_prefix('-') {
            for short in cluster.chars() {
                match command.find_short(short) {
                    Some(argument) => {
                        used.insert(argument.name.as_str());
                        if !argument.is_flag() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
    used
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

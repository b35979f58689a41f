//! Dotted paths through the command tree
//!
//! A [`TreePath`] names a node by the sequence of names leading to it from
//! the root: `group1.group2.flag2`. The empty path is the root itself.

use std::fmt;

use serde::{Serialize, Serializer};

use super::DescriptorError;

/// An ordered sequence of names from the tree root
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreePath(Vec<String>);

impl TreePath {
    /// The root path (no segments)
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Builds a path from already validated segments
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parses a dotted path such as `docker.compose`, validating every segment
    pub fn parse(dotted: &str) -> Result<Self, DescriptorError> {
        let trimmed = dotted.trim();
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('.') {
            validate_name(segment, "group")?;
            segments.push(segment.to_string());
        }
        Ok(Self(segments))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Last segment, or `None` for the root
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// The enclosing path, or `None` for the root
    pub fn parent(&self) -> Option<TreePath> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Returns a new path with `name` appended
    pub fn child(&self, name: impl Into<String>) -> TreePath {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Self(segments)
    }

    /// Appends a segment in place
    pub fn push(&mut self, name: impl Into<String>) {
        self.0.push(name.into());
    }

    /// All proper ancestors from the first segment down, excluding the root
    /// and the path itself: `a.b.c` yields `a`, `a.b`.
    pub fn ancestors(&self) -> impl Iterator<Item = TreePath> + '_ {
        (1..self.0.len()).map(move |n| Self(self.0[..n].to_vec()))
    }

    /// Space separated form, as typed on the command line
    pub fn to_command_line(&self) -> String {
        self.0.join(" ")
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.0.join("."))
        }
    }
}

impl Serialize for TreePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.join("."))
    }
}

/// Checks that a command, group or argument name can live in the tree
///
/// Names are non-empty, contain no `.` (the path separator) or whitespace,
/// and do not start with `-` (which would read as a flag).
pub fn validate_name(name: &str, kind: &'static str) -> Result<(), DescriptorError> {
    if name.is_empty() {
        return Err(DescriptorError::EmptyName(kind));
    }

    let reason = if name.contains('.') {
        Some("must not contain '.'")
    } else if name.chars().any(char::is_whitespace) {
        Some("must not contain whitespace")
    } else if name.starts_with('-') {
        Some("must not start with '-'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(DescriptorError::InvalidName {
            kind,
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_nested_path() {
        let path = TreePath::parse("docker.compose.up").unwrap();
        assert_eq!(path.segments(), &["docker", "compose", "up"]);
        assert_eq!(path.name(), Some("up"));
        assert_eq!(path.to_string(), "docker.compose.up");
    }

    #[test]
    fn parse_empty_is_root() {
        assert!(TreePath::parse("").unwrap().is_root());
        assert!(TreePath::parse("  ").unwrap().is_root());
    }

    #[test]
    fn parse_rejects_empty_segment() {
        assert!(TreePath::parse("a..b").is_err());
        assert!(TreePath::parse("a.").is_err());
    }

    #[test]
    fn ancestors_exclude_self() {
        let path = TreePath::parse("a.b.c").unwrap();
        let ancestors: Vec<_> = path.ancestors().map(|p| p.to_string()).collect();
        assert_eq!(ancestors, vec!["a", "a.b"]);
    }

    #[test]
    fn parent_of_root_is_none() {
        assert!(TreePath::root().parent().is_none());
        assert_eq!(
            TreePath::parse("a.b").unwrap().parent(),
            Some(TreePath::parse("a").unwrap())
        );
    }

    #[test]
    fn ordering_puts_root_first() {
        let mut paths = vec![
            TreePath::parse("b").unwrap(),
            TreePath::root(),
            TreePath::parse("a.z").unwrap(),
            TreePath::parse("a").unwrap(),
        ];
        paths.sort();
        let rendered: Vec<_> = paths.iter().map(|p| p.to_string()).collect();
        assert_eq!(rendered, vec!["<root>", "a", "a.z", "b"]);
    }

    #[test]
    fn validate_name_rules() {
        assert!(validate_name("build", "command").is_ok());
        assert!(validate_name("", "command").is_err());
        assert!(validate_name("a b", "command").is_err());
        assert!(validate_name("-x", "command").is_err());
        assert!(validate_name("a.b", "command").is_err());
    }
}

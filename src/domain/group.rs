//! Group descriptors

use serde::Serialize;

use super::path::{validate_name, TreePath};
use super::DescriptorError;

/// A named namespace that commands and other groups attach to
///
/// The parent is held as a path, never as ownership, so a group can be
/// declared before or after the group that encloses it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupDescriptor {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,

    /// Enclosing group; the root when empty
    #[serde(skip_serializing_if = "TreePath::is_root")]
    pub parent: TreePath,
}

impl GroupDescriptor {
    /// A root-level group
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            about: None,
            parent: TreePath::root(),
        }
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    pub fn under(mut self, parent: TreePath) -> Self {
        self.parent = parent;
        self
    }

    /// Builds the descriptor for the last segment of `path`
    pub fn at_path(path: &TreePath) -> Option<Self> {
        let name = path.name()?;
        Some(Self::new(name).under(path.parent().unwrap_or_default()))
    }

    /// Full path of this group
    pub fn path(&self) -> TreePath {
        self.parent.child(self.name.clone())
    }

    pub fn validate(&self) -> Result<(), DescriptorError> {
        validate_name(&self.name, "group")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_group_path() {
        let group = GroupDescriptor::new("group2").under(TreePath::parse("group1").unwrap());
        assert_eq!(group.path().to_string(), "group1.group2");
    }

    #[test]
    fn at_path_splits_parent() {
        let group = GroupDescriptor::at_path(&TreePath::parse("a.b.c").unwrap()).unwrap();
        assert_eq!(group.name, "c");
        assert_eq!(group.parent.to_string(), "a.b");
        assert!(GroupDescriptor::at_path(&TreePath::root()).is_none());
    }

    #[test]
    fn empty_name_is_rejected() {
        assert_eq!(
            GroupDescriptor::new("").validate(),
            Err(DescriptorError::EmptyName("group"))
        );
    }
}

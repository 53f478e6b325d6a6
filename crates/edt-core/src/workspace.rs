//! Workspace root resolution for tracked documents.

use std::path::{Path, PathBuf};

/// Maps document paths to their owning workspace root.
///
/// The host editor knows which folders are open as workspaces; this resolver
/// answers the same question from a configured root list. A document matches
/// the longest root that is a path prefix, so nested workspaces resolve to
/// the innermost one.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceResolver {
    roots: Vec<PathBuf>,
}

impl WorkspaceResolver {
    /// Creates a resolver over the given workspace roots.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Returns the workspace root owning `path`, or `None` if the path is
    /// outside every known workspace.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> Option<PathBuf> {
        self.roots
            .iter()
            .filter(|root| path.starts_with(root))
            .max_by_key(|root| root.components().count())
            .cloned()
    }
}

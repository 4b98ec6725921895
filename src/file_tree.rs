//! Client-side mirror of the generated files.
//!
//! The tree is keyed by `/`-joined paths. Siblings keep insertion order, and
//! nodes are created lazily the first time a path is seen, either from a
//! replayed write or from the `/api/files` listing.

use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileTreeNode {
    File {
        name: String,
        path: String,
        content: String,
    },
    Folder {
        name: String,
        path: String,
        children: Vec<FileTreeNode>,
    },
}

impl FileTreeNode {
    pub fn name(&self) -> &str {
        match self {
            FileTreeNode::File { name, .. } | FileTreeNode::Folder { name, .. } => name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            FileTreeNode::File { path, .. } | FileTreeNode::Folder { path, .. } => path,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, FileTreeNode::Folder { .. })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FileTreeError {
    #[error("path has no segments")]
    EmptyPath,
    #[error("'{0}' is a file, not a folder")]
    NotAFolder(String),
    #[error("'{0}' is a folder, not a file")]
    NotAFile(String),
}

#[derive(Debug, Clone, Default)]
pub struct VirtualFileTree {
    roots: Vec<FileTreeNode>,
    expanded: HashSet<String>,
}

impl VirtualFileTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roots(&self) -> &[FileTreeNode] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Creates folders for every segment but the last and a file for the
    /// last, or replaces the file's content if it already exists.
    pub fn insert_or_update(&mut self, path: &str, content: &str) -> Result<(), FileTreeError> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((file_name, folders)) = segments.split_last() else {
            return Err(FileTreeError::EmptyPath);
        };

        let mut level = &mut self.roots;
        let mut current = String::new();
        for folder in folders {
            push_segment(&mut current, folder);
            let idx = match level.iter().position(|n| n.name() == *folder) {
                Some(idx) => idx,
                None => {
                    level.push(FileTreeNode::Folder {
                        name: folder.to_string(),
                        path: current.clone(),
                        children: Vec::new(),
                    });
                    level.len() - 1
                }
            };
            level = match &mut level[idx] {
                FileTreeNode::Folder { children, .. } => children,
                FileTreeNode::File { .. } => return Err(FileTreeError::NotAFolder(current)),
            };
        }

        push_segment(&mut current, file_name);
        match level.iter_mut().find(|n| n.name() == *file_name) {
            Some(FileTreeNode::File { content: existing, .. }) => {
                *existing = content.to_string();
                Ok(())
            }
            Some(FileTreeNode::Folder { .. }) => Err(FileTreeError::NotAFile(current)),
            None => {
                level.push(FileTreeNode::File {
                    name: file_name.to_string(),
                    path: current,
                    content: content.to_string(),
                });
                Ok(())
            }
        }
    }

    pub fn toggle_expanded(&mut self, path: &str) {
        if !self.expanded.remove(path) {
            self.expanded.insert(path.to_string());
        }
    }

    pub fn expand(&mut self, path: &str) {
        self.expanded.insert(path.to_string());
    }

    pub fn is_expanded(&self, path: &str) -> bool {
        self.expanded.contains(path)
    }

    pub fn node(&self, path: &str) -> Option<&FileTreeNode> {
        let mut level: &[FileTreeNode] = &self.roots;
        let mut found = None;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let node = level.iter().find(|n| n.name() == segment)?;
            level = match node {
                FileTreeNode::Folder { children, .. } => children,
                FileTreeNode::File { .. } => &[],
            };
            found = Some(node);
        }
        found
    }

    /// Content of the file at `path`.
    ///
    /// `None` means no file exists there; `Some("")` is a genuinely empty file.
    pub fn lookup(&self, path: &str) -> Option<&str> {
        match self.node(path)? {
            FileTreeNode::File { content, .. } => Some(content),
            FileTreeNode::Folder { .. } => None,
        }
    }

    /// All files, depth-first in insertion order.
    pub fn files(&self) -> Vec<&FileTreeNode> {
        fn collect<'a>(nodes: &'a [FileTreeNode], out: &mut Vec<&'a FileTreeNode>) {
            for node in nodes {
                match node {
                    FileTreeNode::File { .. } => out.push(node),
                    FileTreeNode::Folder { children, .. } => collect(children, out),
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.roots, &mut out);
        out
    }

    pub fn file_paths(&self) -> Vec<&str> {
        self.files().into_iter().map(FileTreeNode::path).collect()
    }

    pub fn files_with_extension(&self, extension: &str) -> Vec<&FileTreeNode> {
        self.files()
            .into_iter()
            .filter(|n| n.name().ends_with(extension))
            .collect()
    }
}

fn push_segment(path: &mut String, segment: &str) {
    if !path.is_empty() {
        path.push('/');
    }
    path.push_str(segment);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_folders_and_file() {
        let mut tree = VirtualFileTree::new();
        tree.insert_or_update("server/tea_site/index.html", "<html></html>")
            .unwrap();

        let root = &tree.roots()[0];
        assert_eq!(root.path(), "server");
        let FileTreeNode::Folder { children, .. } = root else {
            panic!("expected folder");
        };
        assert_eq!(children[0].path(), "server/tea_site");
        assert!(children[0].is_folder());
        assert_eq!(
            tree.lookup("server/tea_site/index.html"),
            Some("<html></html>")
        );
    }

    #[test]
    fn siblings_keep_insertion_order_and_last_write_wins() {
        let mut tree = VirtualFileTree::new();
        tree.insert_or_update("site/style.css", "a").unwrap();
        tree.insert_or_update("site/index.html", "b").unwrap();
        tree.insert_or_update("site/app.js", "c").unwrap();
        tree.insert_or_update("site/style.css", "a2").unwrap();

        assert_eq!(
            tree.file_paths(),
            vec!["site/style.css", "site/index.html", "site/app.js"]
        );
        assert_eq!(tree.lookup("site/style.css"), Some("a2"));
    }

    #[test]
    fn repeated_identical_inserts_are_idempotent() {
        let mut once = VirtualFileTree::new();
        once.insert_or_update("a/b.txt", "x").unwrap();
        let mut twice = once.clone();
        twice.insert_or_update("a/b.txt", "x").unwrap();
        assert_eq!(once.roots(), twice.roots());
    }

    #[test]
    fn node_paths_join_ancestor_names() {
        let mut tree = VirtualFileTree::new();
        tree.insert_or_update("/a//b/c.txt", "").unwrap();
        fn check(nodes: &[FileTreeNode], prefix: &str) {
            for node in nodes {
                let expected = if prefix.is_empty() {
                    node.name().to_string()
                } else {
                    format!("{}/{}", prefix, node.name())
                };
                assert_eq!(node.path(), expected);
                if let FileTreeNode::Folder { children, .. } = node {
                    check(children, &expected);
                }
            }
        }
        check(tree.roots(), "");
        assert_eq!(tree.file_paths(), vec!["a/b/c.txt"]);
    }

    #[test]
    fn lookup_distinguishes_missing_from_empty() {
        let mut tree = VirtualFileTree::new();
        tree.insert_or_update("site/empty.txt", "").unwrap();
        assert_eq!(tree.lookup("site/empty.txt"), Some(""));
        assert_eq!(tree.lookup("site/missing.txt"), None);
        assert_eq!(tree.lookup("site"), None);
        assert_eq!(tree.lookup("site/empty.txt/deeper"), None);
    }

    #[test]
    fn conflicting_node_kinds_are_rejected() {
        let mut tree = VirtualFileTree::new();
        tree.insert_or_update("site/index.html", "x").unwrap();
        assert_eq!(
            tree.insert_or_update("site/index.html/inner.css", "y"),
            Err(FileTreeError::NotAFolder("site/index.html".to_string()))
        );
        assert_eq!(
            tree.insert_or_update("site", "y"),
            Err(FileTreeError::NotAFile("site".to_string()))
        );
        assert_eq!(tree.insert_or_update("//", "y"), Err(FileTreeError::EmptyPath));
    }

    #[test]
    fn expansion_is_tracked_separately() {
        let mut tree = VirtualFileTree::new();
        assert!(!tree.is_expanded("site"));
        tree.toggle_expanded("site");
        assert!(tree.is_expanded("site"));
        tree.toggle_expanded("site");
        assert!(!tree.is_expanded("site"));
        tree.expand("site");
        tree.expand("site");
        assert!(tree.is_expanded("site"));
        // Expanding a path that is not in the tree is allowed.
        assert!(tree.is_empty());
    }

    #[test]
    fn serializes_like_the_explorer_expects() {
        let mut tree = VirtualFileTree::new();
        tree.insert_or_update("site/index.html", "<p>").unwrap();
        assert_eq!(
            serde_json::to_value(tree.roots()).unwrap(),
            json!([{
                "type": "folder",
                "name": "site",
                "path": "site",
                "children": [{
                    "type": "file",
                    "name": "index.html",
                    "path": "site/index.html",
                    "content": "<p>"
                }]
            }])
        );
    }
}

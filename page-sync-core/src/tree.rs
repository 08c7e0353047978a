//! Tree builder: walks a local directory into a [`NodeTree`].
//!
//! - One node per subdirectory and per content file with a recognized extension.
//! - The index file of a directory (case-insensitive match on
//!   [`TreeOptions::index_file`]) is absorbed into the directory node, which
//!   then becomes a content node addressable at the directory's own path.
//! - Entries are visited sorted by name, hidden entries are skipped.
//! - Walking into a tree that already has children reuses existing nodes
//!   instead of appending duplicates.
//!
//! Any failure to enumerate a directory aborts the walk: a partial tree would
//! make link resolution silently wrong.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info};

use crate::config::DEFAULT_INDEX_FILE;
use crate::contract::{DirEntry, FileSystem};
use crate::error::SyncError;
use crate::node::{join_relative, Node, NodeId, NodeTree};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeOptions {
    pub index_file: String,
    pub extensions: Vec<String>,
    /// Skip content files last modified before this instant.
    pub modified_after: Option<SystemTime>,
}

impl Default for TreeOptions {
    fn default() -> Self {
        TreeOptions {
            index_file: DEFAULT_INDEX_FILE.to_string(),
            extensions: vec!["md".to_string()],
            modified_after: None,
        }
    }
}

impl TreeOptions {
    fn is_content_file(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    fn is_index_file(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(&self.index_file)
    }

    fn is_stale(&self, entry: &DirEntry) -> bool {
        match (self.modified_after, entry.modified) {
            (Some(cutoff), Some(modified)) => modified < cutoff,
            _ => false,
        }
    }
}

/// Populate `tree` from `root_dir`.
///
/// The tree root is taken as the node for `root_dir`; its title and remote id
/// may already be set from the remote root page.
pub fn build_tree<F>(
    fs: &F,
    root_dir: &Path,
    tree: &mut NodeTree,
    options: &TreeOptions,
) -> Result<(), SyncError>
where
    F: FileSystem + ?Sized,
{
    info!(root = %root_dir.display(), "Building document tree");
    let mut pending: Vec<(NodeId, PathBuf)> = vec![(tree.root(), root_dir.to_path_buf())];

    while let Some((dir_id, dir_path)) = pending.pop() {
        let mut entries = fs
            .read_dir(&dir_path)
            .map_err(|e| SyncError::io(&dir_path, e))?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let parent_path = tree[dir_id].relative_path.clone();
        let mut subdirs = Vec::new();

        for entry in entries {
            if entry.name.starts_with('.') {
                debug!(path = %entry.path.display(), "Skipping hidden entry");
                continue;
            }

            if entry.is_dir {
                let title = title_from_segment(&entry.name);
                let child = match tree.find_child_directory_by_title(dir_id, &title) {
                    Some(existing) => existing,
                    None => {
                        let mut node =
                            Node::directory(join_relative(&parent_path, &entry.name), &entry.path);
                        node.title = title;
                        tree.add_child(dir_id, node)
                    }
                };
                subdirs.push((child, entry.path));
                continue;
            }

            if !options.is_content_file(&entry.name) {
                continue;
            }
            if options.is_stale(&entry) {
                debug!(path = %entry.path.display(), "Skipping file not modified recently");
                continue;
            }

            if options.is_index_file(&entry.name) {
                debug!(
                    dir = %parent_path,
                    file = %entry.path.display(),
                    "Absorbing index file into directory node"
                );
                let dir_node = &mut tree[dir_id];
                dir_node.filesystem_path = entry.path;
                dir_node.is_directory = false;
                continue;
            }

            let relative_path = join_relative(&parent_path, &entry.name);
            if tree.find_child_by_path(dir_id, &relative_path).is_some() {
                continue;
            }
            let mut node = Node::document(relative_path, &entry.path);
            node.title = title_from_file_name(&entry.name);
            tree.add_child(dir_id, node);
        }

        pending.extend(subdirs.into_iter().rev());
    }

    info!(nodes = tree.len(), "Document tree built");
    Ok(())
}

/// Title for a directory segment: `.`, `-` and `_` become spaces, runs of
/// whitespace collapse, and every word gets its first character upper-cased
/// when it is ASCII. Non-ASCII characters are left as they are.
pub fn title_from_segment(segment: &str) -> String {
    segment
        .replace(['.', '-', '_'], " ")
        .split_whitespace()
        .map(capitalize_ascii)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize_ascii(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Fallback title for a content file: its name without the extension.
pub fn title_from_file_name(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{LocalFileSystem, MockFileSystem};
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn paths(tree: &NodeTree) -> Vec<String> {
        tree.walk()
            .into_iter()
            .map(|id| tree[id].relative_path.clone())
            .collect()
    }

    #[test]
    fn title_from_segment_normalizes_separators() {
        assert_eq!(title_from_segment("getting-started"), "Getting Started");
        assert_eq!(title_from_segment("api_v2.notes"), "Api V2 Notes");
        assert_eq!(title_from_segment("--odd__name--"), "Odd Name");
        assert_eq!(title_from_segment("élan-vital"), "élan Vital");
    }

    #[test]
    fn index_file_is_absorbed_into_directory() {
        let tmp = tempdir().unwrap();
        write(&tmp.path().join("docs/guide/README.md"), "# Guide");
        write(&tmp.path().join("docs/guide/intro.md"), "# Intro");

        let mut tree = NodeTree::new(tmp.path());
        build_tree(&LocalFileSystem, tmp.path(), &mut tree, &TreeOptions::default()).unwrap();

        assert_eq!(paths(&tree), vec!["", "docs", "docs/guide", "docs/guide/intro.md"]);
        let guide = tree.walk()[2];
        assert!(!tree[guide].is_directory);
        assert!(tree[guide].filesystem_path.ends_with("README.md"));
        assert_eq!(tree[guide].title, "Guide");
        assert_eq!(tree[guide].children().len(), 1);
    }

    #[test]
    fn file_and_directory_with_same_title_stay_separate() {
        let tmp = tempdir().unwrap();
        write(&tmp.path().join("Guide.md"), "file body");
        write(&tmp.path().join("guide/readme.md"), "index body");
        write(&tmp.path().join("guide/intro.md"), "intro body");

        let mut tree = NodeTree::new(tmp.path());
        build_tree(&LocalFileSystem, tmp.path(), &mut tree, &TreeOptions::default()).unwrap();

        assert_eq!(paths(&tree), vec!["", "Guide.md", "guide", "guide/intro.md"]);
        let ids = tree.walk();
        assert!(tree[ids[1]].filesystem_path.ends_with("Guide.md"));
        assert!(tree[ids[1]].children().is_empty());
        assert!(tree[ids[2]].filesystem_path.ends_with("guide/readme.md"));
        assert_eq!(tree[ids[2]].title, "Guide");
    }

    #[test]
    fn skips_hidden_entries_and_unknown_extensions() {
        let tmp = tempdir().unwrap();
        write(&tmp.path().join(".git/HEAD.md"), "ref");
        write(&tmp.path().join("notes.txt"), "plain");
        write(&tmp.path().join("page.MD"), "# Page");

        let mut tree = NodeTree::new(tmp.path());
        build_tree(&LocalFileSystem, tmp.path(), &mut tree, &TreeOptions::default()).unwrap();

        assert_eq!(paths(&tree), vec!["", "page.MD"]);
        assert_eq!(tree[tree.walk()[1]].title, "page");
    }

    #[test]
    fn rebuilding_does_not_duplicate_children() {
        let tmp = tempdir().unwrap();
        write(&tmp.path().join("ops/runbook.md"), "# Runbook");

        let mut tree = NodeTree::new(tmp.path());
        let options = TreeOptions::default();
        build_tree(&LocalFileSystem, tmp.path(), &mut tree, &options).unwrap();
        let ops = tree.walk()[1];
        tree.assign_remote_id(ops, "77");

        build_tree(&LocalFileSystem, tmp.path(), &mut tree, &options).unwrap();

        assert_eq!(paths(&tree), vec!["", "ops", "ops/runbook.md"]);
        assert_eq!(tree[ops].remote_id(), Some("77"));
    }

    #[test]
    fn stale_files_are_skipped_when_cutoff_set() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(10_000);
        let mut mock = MockFileSystem::new();
        mock.expect_read_dir().returning(move |_| {
            Ok(vec![
                DirEntry {
                    name: "fresh.md".into(),
                    path: PathBuf::from("root/fresh.md"),
                    is_dir: false,
                    modified: Some(now),
                },
                DirEntry {
                    name: "old.md".into(),
                    path: PathBuf::from("root/old.md"),
                    is_dir: false,
                    modified: Some(SystemTime::UNIX_EPOCH),
                },
            ])
        });

        let options = TreeOptions {
            modified_after: Some(now - Duration::from_secs(60)),
            ..TreeOptions::default()
        };
        let mut tree = NodeTree::new("root");
        build_tree(&mock, Path::new("root"), &mut tree, &options).unwrap();

        assert_eq!(paths(&tree), vec!["", "fresh.md"]);
    }

    #[test]
    fn unreadable_directory_is_fatal() {
        let mut mock = MockFileSystem::new();
        mock.expect_read_dir().returning(|path| {
            if path == Path::new("root") {
                Ok(vec![DirEntry {
                    name: "locked".into(),
                    path: PathBuf::from("root/locked"),
                    is_dir: true,
                    modified: None,
                }])
            } else {
                Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "denied",
                ))
            }
        });

        let mut tree = NodeTree::new("root");
        let err = build_tree(&mock, Path::new("root"), &mut tree, &TreeOptions::default())
            .unwrap_err();
        match err {
            SyncError::Io { path, .. } => assert_eq!(path, PathBuf::from("root/locked")),
            other => panic!("unexpected error {other:?}"),
        }
    }
}

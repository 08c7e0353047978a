//! In-memory hierarchy of local documents mapped onto remote page slots.
//!
//! Nodes live in an arena owned by [`NodeTree`]. Parents own their child id
//! lists; children hold a non-owning parent id for upward traversal. Removing
//! a node detaches it from its parent, after which no traversal reaches it.

use std::ffi::OsStr;
use std::ops::{Index, IndexMut};
use std::path::PathBuf;

use serde::Serialize;
use tracing::warn;

/// Stable handle to a node inside a [`NodeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

/// One filesystem entry mapped onto one remote document slot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Node {
    /// Path relative to the sync root, `/` separated. Empty for the root.
    pub relative_path: String,
    /// Backing file, or the directory itself for structural nodes.
    pub filesystem_path: PathBuf,
    pub title: String,
    pub space: String,
    pub layout: Option<String>,
    pub attachments: Vec<String>,
    /// Structural grouping without its own content.
    pub is_directory: bool,
    remote_id: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn directory(relative_path: impl Into<String>, filesystem_path: impl Into<PathBuf>) -> Self {
        Node {
            relative_path: relative_path.into(),
            filesystem_path: filesystem_path.into(),
            is_directory: true,
            ..Node::default()
        }
    }

    pub fn document(relative_path: impl Into<String>, filesystem_path: impl Into<PathBuf>) -> Self {
        Node {
            relative_path: relative_path.into(),
            filesystem_path: filesystem_path.into(),
            is_directory: false,
            ..Node::default()
        }
    }

    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_content(&self) -> bool {
        !self.is_directory
    }

    /// True for a plain document file, false for a directory node whether or
    /// not it absorbed an index file.
    pub fn is_backed_by_own_file(&self) -> bool {
        let last_segment = self.relative_path.rsplit('/').next().unwrap_or_default();
        !self.is_directory
            && !last_segment.is_empty()
            && self.filesystem_path.file_name() == Some(OsStr::new(last_segment))
    }
}

/// Arena-backed single-rooted tree of [`Node`]s.
#[derive(Debug, Clone, Serialize)]
pub struct NodeTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl NodeTree {
    /// Create a tree holding only a structural root for `root_dir`.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        NodeTree {
            nodes: vec![Node::directory("", root_dir)],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Append `node` as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Record the remote id for `id`. Returns `false` and leaves the node
    /// untouched when an id is already present.
    pub fn assign_remote_id(&mut self, id: NodeId, remote_id: impl Into<String>) -> bool {
        let remote_id = remote_id.into();
        let node = &mut self.nodes[id.0];
        match &node.remote_id {
            Some(existing) => {
                if *existing != remote_id {
                    warn!(
                        path = %node.relative_path,
                        existing = %existing,
                        rejected = %remote_id,
                        "Refusing to reassign remote id"
                    );
                }
                false
            }
            None => {
                node.remote_id = Some(remote_id);
                true
            }
        }
    }

    /// Unlink `id` (and therefore its subtree) from its parent. The root
    /// cannot be detached.
    pub fn detach(&mut self, id: NodeId) {
        if id == self.root {
            return;
        }
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != id);
        }
    }

    /// Pre-order ids of every node reachable from the root.
    pub fn walk(&self) -> Vec<NodeId> {
        self.walk_from(self.root)
    }

    /// Pre-order ids of `start` and its descendants, children in insertion
    /// order.
    pub fn walk_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        order
    }

    /// Parent chain of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.nodes[id.0].parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.nodes[parent.0].parent;
        }
        chain
    }

    /// Directory child of `parent` titled `title`. Plain document nodes never
    /// match, even when a file stem yields the same title.
    pub fn find_child_directory_by_title(&self, parent: NodeId, title: &str) -> Option<NodeId> {
        self.nodes[parent.0]
            .children
            .iter()
            .copied()
            .find(|child| {
                let node = &self.nodes[child.0];
                node.title == title && !node.is_backed_by_own_file()
            })
    }

    pub fn find_child_by_path(&self, parent: NodeId, relative_path: &str) -> Option<NodeId> {
        self.nodes[parent.0]
            .children
            .iter()
            .copied()
            .find(|child| self.nodes[child.0].relative_path == relative_path)
    }

    /// Reachable content nodes in pre-order.
    pub fn content_nodes(&self) -> Vec<NodeId> {
        self.walk()
            .into_iter()
            .filter(|id| self.get(*id).is_content())
            .collect()
    }

    /// Number of nodes reachable from the root.
    pub fn len(&self) -> usize {
        self.walk().len()
    }

    /// True when the root has no children.
    pub fn is_empty(&self) -> bool {
        self.get(self.root).children.is_empty()
    }
}

impl Index<NodeId> for NodeTree {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        self.get(id)
    }
}

impl IndexMut<NodeId> for NodeTree {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        self.get_mut(id)
    }
}

/// Join a parent relative path and an entry name with `/`.
pub fn join_relative(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

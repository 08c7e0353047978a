use tracing::{debug, info};

use crate::node::NodeTree;

/// Drop structural nodes without any content descendant.
///
/// Nodes are visited in reverse pre-order, so every child is decided before
/// its parent and a directory whose children were all removed is removed in
/// turn. The root always survives. Returns the number of removed nodes.
pub fn prune_tree(tree: &mut NodeTree) -> usize {
    let root = tree.root();
    let mut removed = 0;

    for id in tree.walk().into_iter().rev() {
        if id == root {
            continue;
        }
        let node = &tree[id];
        if node.is_directory && node.children().is_empty() {
            debug!(path = %node.relative_path, "Pruning empty directory node");
            tree.detach(id);
            removed += 1;
        }
    }

    info!(removed, remaining = tree.len(), "Pruned document tree");
    removed
}

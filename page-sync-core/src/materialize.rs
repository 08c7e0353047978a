//! Page materializer: creates placeholder remote pages for unmatched nodes.
//!
//! # Collision handling
//! Remote titles must be unique among siblings. When the store reports a
//! collision, the candidate title grows by ` > <ancestor title>` one ancestor
//! at a time, nearest first. Once the ancestors run out each further attempt
//! uses `<title> > <random suffix>`. At most [`MAX_ATTEMPTS`] requests are
//! made per node. Only the title sent to the store changes; the node keeps
//! its own title.
//!
//! # Failure scope
//! [`materialize_tree`] walks top-down. A node that cannot be created has its
//! whole subtree skipped, since descendants would have no parent page to live
//! under, while sibling subtrees carry on.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::contract::{DocumentStore, NewDocument, StoreError};
use crate::error::SyncError;
use crate::node::{NodeId, NodeTree};

pub const MAX_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedPage {
    pub relative_path: String,
    pub remote_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedPage {
    pub relative_path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaterializeReport {
    pub created: Vec<CreatedPage>,
    pub failed: Vec<FailedPage>,
    /// Descendants of failed nodes that were not attempted.
    pub skipped: Vec<String>,
}

/// Create the remote page for `id` unless it already has a remote id.
///
/// The parent's remote id is used as the remote parent; a parent without one
/// (normally the unmatched root) places the page at the remote root.
/// `default_space` applies when the node has no space of its own.
pub async fn materialize_node<S>(
    store: &S,
    tree: &mut NodeTree,
    id: NodeId,
    default_space: &str,
) -> Result<String, SyncError>
where
    S: DocumentStore + ?Sized,
{
    if let Some(existing) = tree[id].remote_id() {
        return Ok(existing.to_string());
    }

    let parent_id = tree[id]
        .parent()
        .and_then(|parent| tree[parent].remote_id().map(str::to_string));
    let node = &tree[id];
    let relative_path = node.relative_path.clone();
    let title = node.title.clone();
    let space_key = if node.space.is_empty() {
        default_space.to_string()
    } else {
        node.space.clone()
    };
    let ancestor_titles: Vec<String> = tree
        .ancestors(id)
        .into_iter()
        .map(|ancestor| tree[ancestor].title.clone())
        .filter(|t| !t.is_empty())
        .collect();
    let mut ancestors = ancestor_titles.iter();

    let mut candidate = title.clone();
    for attempt in 1..=MAX_ATTEMPTS {
        let req = NewDocument {
            parent_id: parent_id.as_deref(),
            title: &candidate,
            body: "",
            source_path: &relative_path,
            space_key: &space_key,
        };
        match store.create_document(req).await {
            Ok(remote_id) => {
                info!(
                    path = %relative_path,
                    title = %candidate,
                    remote_id = %remote_id,
                    attempt,
                    "Created placeholder page"
                );
                tree.assign_remote_id(id, remote_id.clone());
                return Ok(remote_id);
            }
            Err(StoreError::TitleCollision { .. }) => {
                debug!(path = %relative_path, title = %candidate, attempt, "Title already taken");
                candidate = match ancestors.next() {
                    Some(ancestor) => format!("{candidate} > {ancestor}"),
                    None => format!("{title} > {}", Uuid::new_v4().simple()),
                };
            }
            Err(e) => {
                error!(path = %relative_path, error = %e, "Failed to create placeholder page");
                return Err(e.into());
            }
        }
    }

    Err(SyncError::MaterializationExhausted {
        relative_path,
        attempts: MAX_ATTEMPTS,
    })
}

/// Materialize every node below the root that still lacks a remote id.
pub async fn materialize_tree<S>(
    store: &S,
    tree: &mut NodeTree,
    default_space: &str,
) -> MaterializeReport
where
    S: DocumentStore + ?Sized,
{
    let mut report = MaterializeReport::default();
    let root = tree.root();
    let mut queue: VecDeque<NodeId> = tree[root].children().iter().copied().collect();

    while let Some(id) = queue.pop_front() {
        if tree[id].remote_id().is_none() {
            match materialize_node(store, tree, id, default_space).await {
                Ok(remote_id) => report.created.push(CreatedPage {
                    relative_path: tree[id].relative_path.clone(),
                    remote_id,
                }),
                Err(e) => {
                    let skipped: Vec<String> = tree
                        .walk_from(id)
                        .into_iter()
                        .skip(1)
                        .map(|child| tree[child].relative_path.clone())
                        .collect();
                    error!(
                        path = %tree[id].relative_path,
                        error = %e,
                        skipped = skipped.len(),
                        "Skipping subtree after failed materialization"
                    );
                    report.failed.push(FailedPage {
                        relative_path: tree[id].relative_path.clone(),
                        reason: e.to_string(),
                    });
                    report.skipped.extend(skipped);
                    continue;
                }
            }
        }
        queue.extend(tree[id].children().iter().copied());
    }

    info!(
        created = report.created.len(),
        failed = report.failed.len(),
        skipped = report.skipped.len(),
        "Materialization finished"
    );
    report
}

//! High-level pipeline: reconciles a local markdown tree with a Confluence
//! page hierarchy and prepares every document for publishing.
//!
//! Steps, in order:
//!   - Load the root page and every page below it from the [`DocumentStore`]
//!   - Build the local tree ([`crate::tree`]), match it against the remote
//!     pages ([`crate::matcher`]) and prune empty directories ([`crate::prune`])
//!   - Read each document and apply its metadata ([`crate::meta`])
//!   - Create placeholder pages for unmatched nodes ([`crate::materialize`])
//!   - Rewrite relative links in each document ([`crate::links`])
//!
//! Placeholder pages are all created before any link is resolved, so links to
//! pages first seen in this run already resolve. With
//! [`SyncConfig::dry_run`] set nothing is created: the nodes that would get a
//! page are listed in [`SynchroniseReport::planned`] and links to them are
//! reported as not yet materialized.
//!
//! A document whose metadata is invalid gets no page. If it is a directory
//! index with children, the directory keeps a structural page for them.
//!
//! # Error Handling
//! Config errors, failure to load the root page or listing, and local I/O
//! errors abort the run. A document with invalid metadata, or a subtree whose
//! page cannot be created, is recorded in the report and the run continues.
//!
//! # Navigation
//! - Main entrypoint: [`synchronise`]
//! - Output types: [`SynchroniseReport`], [`PreparedDocument`]

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::contract::{DocumentStore, FileSystem};
use crate::error::SyncError;
use crate::links::{LinkDiagnostic, LinkResolver};
use crate::matcher::{match_tree, AmbiguousMatch};
use crate::materialize::{materialize_tree, FailedPage, MaterializeReport};
use crate::meta::apply_metadata;
use crate::node::{NodeId, NodeTree};
use crate::prune::prune_tree;
use crate::tree::build_tree;

/// A document ready to hand to a renderer/publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparedDocument {
    pub relative_path: String,
    pub filesystem_path: PathBuf,
    pub remote_id: String,
    pub title: String,
    pub space: String,
    pub layout: Option<String>,
    pub attachments: Vec<String>,
    /// Markdown with headers stripped and links rewritten.
    pub body: String,
    pub diagnostics: Vec<LinkDiagnostic>,
}

#[derive(Debug, Default, Serialize)]
pub struct SynchroniseReport {
    pub documents: Vec<PreparedDocument>,
    pub matched: usize,
    pub ambiguous: Vec<AmbiguousMatch>,
    pub pruned: usize,
    pub materialize: MaterializeReport,
    /// Documents whose metadata could not be resolved.
    pub invalid: Vec<FailedPage>,
    /// Dry run only: nodes that would get a new page.
    pub planned: Vec<String>,
}

impl SynchroniseReport {
    pub fn link_diagnostics(&self) -> impl Iterator<Item = &LinkDiagnostic> {
        self.documents.iter().flat_map(|doc| doc.diagnostics.iter())
    }
}

pub async fn synchronise<S, F>(
    config: &SyncConfig,
    store: &S,
    fs: &F,
) -> Result<SynchroniseReport, SyncError>
where
    S: DocumentStore + ?Sized,
    F: FileSystem + ?Sized,
{
    info!("[SYNC] Starting synchronisation");
    config.validate()?;

    let root_page = store.get_document_by_id(&config.root_page_id).await.map_err(|e| {
        error!(root_page_id = %config.root_page_id, error = %e, "[SYNC][ERROR] Failed to load root page");
        e
    })?;
    info!(root_page_id = %root_page.id, title = %root_page.title, space = %root_page.space_key, "[SYNC] Loaded root page");

    let mut tree = NodeTree::new(&config.root_dir);
    let root = tree.root();
    tree[root].title = root_page.title.clone();
    tree[root].space = root_page.space_key.clone();
    tree.assign_remote_id(root, root_page.id.clone());

    let existing = store.list_child_documents(&root_page.id).await.map_err(|e| {
        error!(root_page_id = %root_page.id, error = %e, "[SYNC][ERROR] Failed to list existing pages");
        e
    })?;
    info!(existing = existing.len(), "[SYNC] Listed existing pages");

    build_tree(fs, &config.root_dir, &mut tree, &config.tree_options(SystemTime::now()))?;
    let match_report = match_tree(&mut tree, &existing);
    let pruned = prune_tree(&mut tree);

    let mut report = SynchroniseReport {
        matched: match_report.matched,
        ambiguous: match_report.ambiguous,
        pruned,
        ..SynchroniseReport::default()
    };

    let content_nodes = tree.content_nodes();
    if content_nodes.is_empty() {
        info!("[SYNC] No documents to synchronise");
        return Ok(report);
    }

    let mut bodies: HashMap<NodeId, String> = HashMap::new();
    let mut invalid = Vec::new();
    for id in &content_nodes {
        match read_and_apply(fs, &mut tree, *id, &root_page.space_key) {
            Ok(body) => {
                bodies.insert(*id, body);
            }
            Err(SyncError::Meta(e)) => {
                warn!(path = %tree[*id].relative_path, error = %e, "[SYNC] Skipping document with invalid metadata");
                report.invalid.push(FailedPage {
                    relative_path: tree[*id].relative_path.clone(),
                    reason: e.to_string(),
                });
                invalid.push(*id);
            }
            Err(e) => return Err(e),
        }
    }
    if !invalid.is_empty() {
        report.pruned += drop_invalid(&mut tree, &invalid);
    }

    if config.dry_run {
        report.planned = tree
            .walk()
            .into_iter()
            .filter(|id| tree[*id].remote_id().is_none())
            .map(|id| tree[id].relative_path.clone())
            .collect();
        info!(planned = report.planned.len(), "[SYNC] Dry run, not creating pages");
    } else {
        report.materialize = materialize_tree(store, &mut tree, &root_page.space_key).await;
    }

    let resolver = LinkResolver::new(&config.base_url, &config.index_file);
    for id in content_nodes {
        let Some(body) = bodies.remove(&id) else {
            continue;
        };
        let node = &tree[id];
        let Some(remote_id) = node.remote_id() else {
            debug!(path = %node.relative_path, "[SYNC] No page for document, not preparing it");
            continue;
        };
        let rewrite = resolver.rewrite(&tree, id, &body);
        debug!(
            path = %node.relative_path,
            rewritten = rewrite.rewritten,
            unresolved = rewrite.diagnostics.len(),
            "[SYNC] Resolved links"
        );
        report.documents.push(PreparedDocument {
            relative_path: node.relative_path.clone(),
            filesystem_path: node.filesystem_path.clone(),
            remote_id: remote_id.to_string(),
            title: node.title.clone(),
            space: node.space.clone(),
            layout: node.layout.clone(),
            attachments: node.attachments.clone(),
            body: rewrite.content,
            diagnostics: rewrite.diagnostics,
        });
    }

    info!(
        documents = report.documents.len(),
        created = report.materialize.created.len(),
        failed = report.materialize.failed.len(),
        invalid = report.invalid.len(),
        planned = report.planned.len(),
        "[SYNC] Synchronisation complete"
    );
    Ok(report)
}

/// Remove invalid documents from the tree. An invalid index node with
/// children, or the root, stays as a structural directory. Returns the number
/// of directories pruned because they were left empty.
fn drop_invalid(tree: &mut NodeTree, invalid: &[NodeId]) -> usize {
    let root = tree.root();
    for id in invalid {
        if *id != root && tree[*id].children().is_empty() {
            debug!(path = %tree[*id].relative_path, "[SYNC] Dropping invalid document from tree");
            tree.detach(*id);
        } else {
            tree[*id].is_directory = true;
        }
    }
    prune_tree(tree)
}

fn read_and_apply<F>(
    fs: &F,
    tree: &mut NodeTree,
    id: NodeId,
    default_space: &str,
) -> Result<String, SyncError>
where
    F: FileSystem + ?Sized,
{
    let path = tree[id].filesystem_path.clone();
    let bytes = fs.read(&path).map_err(|e| SyncError::io(&path, e))?;
    let markdown = String::from_utf8_lossy(&bytes);
    Ok(apply_metadata(tree, id, &markdown, default_space)?)
}

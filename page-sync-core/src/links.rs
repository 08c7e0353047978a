//! Link resolver: rewrites relative markdown links into absolute page URLs.
//!
//! Only inline links `[label](target)` whose target is relative are touched.
//! Images, absolute URLs (anything with a `:`), targets with a query string and
//! fragment-only anchors are left alone. A resolved link becomes
//! `<base>/spaces/<space>/pages/<id>/<title>` with the title form-encoded; the label, the fragment and any
//! link title after the target are kept as written.
//!
//! Links that cannot be resolved are left byte-for-byte unchanged and reported
//! as [`LinkDiagnostic`]s. A link to a page that simply has not been created
//! yet resolves on the next run.

use std::fmt;
use std::sync::LazyLock;

use regex::bytes::{Captures, Regex};
use serde::Serialize;
use tracing::{debug, warn};

use crate::node::{join_relative, Node, NodeId, NodeTree};

// 1: optional `!` (image marker), 2: `[label]`, 3: target, 4: `#fragment` or
// ` "title"` tail.
static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(!?)(\[[^\[\]]+\])\(([^\s:?#)]+)([#\s][^)]*)?\)"#).expect("link pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LinkDiagnostic {
    /// No synchronized node corresponds to the link target.
    NotInTree { source: String, target: String },
    /// The target node exists but has no remote page yet.
    NotYetMaterialized { source: String, target: String },
}

impl fmt::Display for LinkDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkDiagnostic::NotInTree { source, target } => {
                write!(f, "link in {source} to {target} is not part of the synchronized tree")
            }
            LinkDiagnostic::NotYetMaterialized { source, target } => write!(
                f,
                "link in {source} to {target} points at a page that does not exist yet; it will be fixed on the next run"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkRewrite<T> {
    pub content: T,
    /// Number of links replaced.
    pub rewritten: usize,
    pub diagnostics: Vec<LinkDiagnostic>,
}

#[derive(Debug, Clone)]
pub struct LinkResolver {
    base_url: String,
    index_file: String,
}

impl LinkResolver {
    pub fn new(base_url: impl Into<String>, index_file: impl Into<String>) -> Self {
        LinkResolver {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            index_file: index_file.into(),
        }
    }

    /// Rewrite links in `markdown`, owned by node `owner` of `tree`.
    pub fn rewrite(&self, tree: &NodeTree, owner: NodeId, markdown: &str) -> LinkRewrite<String> {
        let result = self.rewrite_bytes(tree, owner, markdown.as_bytes());
        // Replacements are UTF-8 and only ever substitute whole UTF-8 targets.
        let content = match String::from_utf8(result.content) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        LinkRewrite {
            content,
            rewritten: result.rewritten,
            diagnostics: result.diagnostics,
        }
    }

    /// Byte-level variant of [`LinkResolver::rewrite`]; bytes outside replaced
    /// targets are copied unchanged, whatever their encoding.
    pub fn rewrite_bytes(&self, tree: &NodeTree, owner: NodeId, markdown: &[u8]) -> LinkRewrite<Vec<u8>> {
        let owner_node = &tree[owner];
        let base_dir = base_dir(owner_node);
        let mut diagnostics = Vec::new();
        let mut rewritten = 0;

        let content = LINK_PATTERN
            .replace_all(markdown, |caps: &Captures<'_>| {
                let original = caps[0].to_vec();
                if !caps[1].is_empty() {
                    return original;
                }
                let Ok(target) = std::str::from_utf8(&caps[3]) else {
                    return original;
                };

                let full_path = join_link(base_dir, target);
                let Some(linked) = self.find_target(tree, &full_path) else {
                    warn!(
                        source = %owner_node.relative_path,
                        target = %target,
                        "Link to page that is not being synchronized"
                    );
                    diagnostics.push(LinkDiagnostic::NotInTree {
                        source: owner_node.relative_path.clone(),
                        target: target.to_string(),
                    });
                    return original;
                };
                let linked_node = &tree[linked];
                let Some(remote_id) = linked_node.remote_id() else {
                    warn!(
                        source = %owner_node.relative_path,
                        target = %target,
                        "Link to page that has not been created yet; will be fixed on the next run"
                    );
                    diagnostics.push(LinkDiagnostic::NotYetMaterialized {
                        source: owner_node.relative_path.clone(),
                        target: target.to_string(),
                    });
                    return original;
                };

                let space = if linked_node.space.is_empty() {
                    &owner_node.space
                } else {
                    &linked_node.space
                };
                let href = format!(
                    "{}/spaces/{}/pages/{}/{}",
                    self.base_url,
                    space,
                    remote_id,
                    encode_title(&linked_node.title)
                );
                debug!(
                    source = %owner_node.relative_path,
                    target = %target,
                    href = %href,
                    "Link replaced"
                );
                rewritten += 1;

                let tail = caps.get(4).map(|m| m.as_bytes()).unwrap_or_default();
                let mut replacement = Vec::with_capacity(original.len() + href.len());
                replacement.extend_from_slice(&caps[2]);
                replacement.push(b'(');
                replacement.extend_from_slice(href.as_bytes());
                replacement.extend_from_slice(tail);
                replacement.push(b')');
                replacement
            })
            .into_owned();

        LinkRewrite {
            content,
            rewritten,
            diagnostics,
        }
    }

    /// Node whose path, or whose path plus the index file, equals `path`
    /// ignoring case. The last match in walk order wins.
    fn find_target(&self, tree: &NodeTree, path: &str) -> Option<NodeId> {
        let wanted = path.to_lowercase();
        tree.walk().into_iter().rev().find(|id| {
            let relative = &tree[*id].relative_path;
            relative.to_lowercase() == wanted
                || join_relative(relative, &self.index_file).to_lowercase() == wanted
        })
    }
}

/// Directory that relative links in `node` are resolved against: the parent
/// directory for a plain document, the node's own path for a directory that
/// absorbed its index file.
fn base_dir(node: &Node) -> &str {
    if node.is_backed_by_own_file() {
        node.relative_path
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or_default()
    } else {
        &node.relative_path
    }
}

/// Form-encode a title for the last URL segment: spaces become `+`, and
/// characters such as `#`, `?` and `)` are percent-encoded.
fn encode_title(title: &str) -> String {
    url::form_urlencoded::byte_serialize(title.as_bytes()).collect()
}

/// Lexically join a link target onto `base`. `.` is dropped, `..` pops a
/// segment but never climbs above the root, and a leading `/` starts from the
/// sync root.
pub fn join_link(base: &str, target: &str) -> String {
    let mut segments: Vec<&str> = if target.starts_with('/') {
        Vec::new()
    } else {
        base.split('/').filter(|s| !s.is_empty()).collect()
    };
    for part in target.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

//! Metadata extractor: page title, space, layout and attachments for a node.
//!
//! A document may open with header lines:
//!
//! ```text
//! <!-- Space: DOCS -->
//! <!-- Title: Getting Started -->
//! <!-- Layout: plain -->
//! <!-- Attachment: diagrams/flow.png -->
//! ```
//!
//! The legacy form `[]: # (Key: value)` is still accepted. The header block
//! ends at the first line that is neither and is stripped from the body.
//!
//! Title precedence: `Title` header, then the first `# heading` within
//! [`TITLE_SCAN_LINES`] lines of the body, then the title the tree builder
//! derived from the path. Space precedence: `Space` header, then the node's
//! existing space, then the sync root's space.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::node::{NodeId, NodeTree};

pub const TITLE_SCAN_LINES: usize = 10;

static HEADER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<!--\s*([^:]+):\s*(.*)\s*-->\s*$").expect("header pattern compiles"));
static LEGACY_HEADER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[\]:\s*#\s*\(([^:]+):\s*(.*)\)\s*$").expect("legacy header pattern compiles")
});
static TITLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\s(.*)$").expect("title pattern compiles"));
static ATTACHMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!\[([^\[\]]+)\]\(([^\s)]+)(\s+"[^"]+")?\)"#).expect("attachment pattern compiles")
});

/// Values declared in a document's header block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Meta {
    /// `Parent` headers. The tree already defines parents, so these are kept
    /// for callers only.
    pub parents: Vec<String>,
    pub space: Option<String>,
    pub title: Option<String>,
    pub layout: Option<String>,
    pub attachments: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetaError {
    #[error("target space is not set for {0} (Space header or root space missing)")]
    MissingSpace(String),
    #[error("page title is not set for {0} (Title header missing and none could be inferred)")]
    MissingTitle(String),
}

/// Split `markdown` into its header metadata and the remaining body.
pub fn parse_headers(markdown: &str) -> (Meta, &str) {
    let mut meta = Meta::default();
    let mut offset = 0;

    for line in markdown.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\n', '\r']);
        let caps = match HEADER_PATTERN.captures(trimmed) {
            Some(caps) => caps,
            None => match LEGACY_HEADER_PATTERN.captures(trimmed) {
                Some(caps) => {
                    warn!(
                        line = %trimmed,
                        "Legacy header usage found, please use <!-- {}: {} --> instead",
                        caps[1].trim(),
                        caps[2].trim()
                    );
                    caps
                }
                None => break,
            },
        };
        offset += line.len();

        let key = caps[1].trim().to_ascii_lowercase();
        let value = caps[2].trim().to_string();
        match key.as_str() {
            "parent" => meta.parents.push(value),
            "space" => meta.space = Some(value),
            "title" => meta.title = Some(value),
            "layout" => meta.layout = Some(value),
            "attachment" => push_unique(&mut meta.attachments, value),
            _ => warn!(header = %caps[1].trim(), line = %trimmed, "Encountered unknown header"),
        }
    }

    (meta, &markdown[offset..])
}

/// First `# heading` within the first `limit` lines of `body`.
pub fn title_from_body(body: &str, limit: usize) -> Option<String> {
    body.lines()
        .take(limit)
        .find_map(|line| TITLE_PATTERN.captures(line).map(|caps| caps[1].trim().to_string()))
        .filter(|title| !title.is_empty())
}

/// Image targets referenced in `body`, in order of first appearance.
pub fn attachments_from_body(body: &str) -> Vec<String> {
    let mut found = Vec::new();
    for caps in ATTACHMENT_PATTERN.captures_iter(body) {
        push_unique(&mut found, caps[2].to_string());
    }
    found
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Extract metadata from `markdown`, store it on node `id` and return the
/// body with the header block removed.
pub fn apply_metadata(
    tree: &mut NodeTree,
    id: NodeId,
    markdown: &str,
    default_space: &str,
) -> Result<String, MetaError> {
    let (meta, body) = parse_headers(markdown);
    let node = &mut tree[id];

    let title = meta
        .title
        .clone()
        .filter(|t| !t.is_empty())
        .or_else(|| title_from_body(body, TITLE_SCAN_LINES))
        .unwrap_or_else(|| node.title.clone());
    if title.trim().is_empty() {
        return Err(MetaError::MissingTitle(node.relative_path.clone()));
    }

    let space = meta
        .space
        .clone()
        .filter(|s| !s.is_empty())
        .or_else(|| Some(node.space.clone()).filter(|s| !s.is_empty()))
        .unwrap_or_else(|| default_space.to_string());
    if space.trim().is_empty() {
        return Err(MetaError::MissingSpace(node.relative_path.clone()));
    }

    let mut attachments = meta.attachments.clone();
    for found in attachments_from_body(body) {
        push_unique(&mut attachments, found);
    }

    if !meta.parents.is_empty() {
        debug!(path = %node.relative_path, parents = ?meta.parents, "Parent headers are ignored in tree mode");
    }

    node.title = title;
    node.space = space;
    node.layout = meta.layout;
    node.attachments = attachments;
    debug!(path = %node.relative_path, title = %node.title, space = %node.space, "Applied metadata");

    Ok(body.to_string())
}

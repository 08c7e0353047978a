//! Tree matcher: assigns existing remote ids to nodes by source-path marker.
//!
//! Remote entries are considered lowest-id-first so that, when two entries
//! carry the same marker, the winner does not depend on listing order. Losing
//! entries are reported and left alone on the remote side.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::contract::RemoteDocumentSummary;
use crate::node::NodeTree;

/// A marker claimed by more than one remote document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmbiguousMatch {
    pub source_path: String,
    pub chosen_id: String,
    pub orphaned_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchReport {
    pub matched: usize,
    pub ambiguous: Vec<AmbiguousMatch>,
}

/// Order remote ids numerically when both parse, lexicographically otherwise.
pub fn compare_remote_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

pub fn match_tree(tree: &mut NodeTree, remote: &[RemoteDocumentSummary]) -> MatchReport {
    let mut ordered: Vec<&RemoteDocumentSummary> = remote
        .iter()
        .filter(|doc| doc.source_path.is_some())
        .collect();
    ordered.sort_by(|a, b| compare_remote_ids(&a.id, &b.id));

    // marker -> ids claiming it, lowest first
    let mut by_marker: HashMap<&str, Vec<&str>> = HashMap::new();
    for doc in &ordered {
        if let Some(marker) = doc.source_path.as_deref() {
            by_marker.entry(marker).or_default().push(doc.id.as_str());
        }
    }

    let mut report = MatchReport::default();
    let mut claimed: HashSet<String> = tree
        .walk()
        .into_iter()
        .filter_map(|id| tree[id].remote_id().map(str::to_string))
        .collect();

    for id in tree.walk() {
        if tree[id].remote_id().is_some() {
            continue;
        }
        let path = tree[id].relative_path.clone();
        let Some(candidates) = by_marker.get(path.as_str()) else {
            continue;
        };
        let Some(chosen) = candidates.iter().copied().find(|c| !claimed.contains(*c)) else {
            continue;
        };
        claimed.insert(chosen.to_string());
        tree.assign_remote_id(id, chosen);
        report.matched += 1;
        debug!(path = %path, remote_id = %chosen, "Matched node to existing page");

        if candidates.len() > 1 {
            let orphaned_ids: Vec<String> = candidates
                .iter()
                .filter(|c| **c != chosen)
                .map(|c| c.to_string())
                .collect();
            warn!(
                path = %path,
                chosen = %chosen,
                orphaned = ?orphaned_ids,
                "Several remote pages carry the same source path; keeping the lowest id"
            );
            report.ambiguous.push(AmbiguousMatch {
                source_path: path,
                chosen_id: chosen.to_string(),
                orphaned_ids,
            });
        }
    }

    info!(
        matched = report.matched,
        ambiguous = report.ambiguous.len(),
        remote = remote.len(),
        "Matched local tree against remote pages"
    );
    report
}

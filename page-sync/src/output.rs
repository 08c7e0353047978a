//! Writes prepared documents to the output directory, mirroring the source
//! layout. A directory that absorbed its index file is written back as
//! `<dir>/<index_file>`.

use anyhow::{Context, Result};
use page_sync_core::synchronise::PreparedDocument;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Output location of `doc` relative to the output directory.
pub fn output_path(doc: &PreparedDocument, index_file: &str) -> PathBuf {
    let last_segment = doc.relative_path.rsplit('/').next().unwrap_or_default();
    let own_file = !last_segment.is_empty()
        && doc
            .filesystem_path
            .file_name()
            .is_some_and(|name| name == last_segment);
    if own_file {
        PathBuf::from(&doc.relative_path)
    } else {
        Path::new(&doc.relative_path).join(index_file)
    }
}

/// Write every document body below `output_dir`. Returns the written paths.
pub fn write_documents(
    output_dir: &Path,
    index_file: &str,
    documents: &[PreparedDocument],
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(documents.len());
    for doc in documents {
        let path = output_dir.join(output_path(doc, index_file));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(&path, &doc.body)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(path = %path.display(), remote_id = %doc.remote_id, "Wrote document");
        written.push(path);
    }
    info!(count = written.len(), output_dir = %output_dir.display(), "Wrote prepared documents");
    Ok(written)
}

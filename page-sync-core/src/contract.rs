//! # contract: interfaces the reconciliation core consumes
//!
//! This module defines the two seams between the core and the outside world:
//!
//! - [`DocumentStore`]: the remote hierarchical document store (Confluence in
//!   production, see [`crate::confluence::ConfluenceClient`]).
//! - [`FileSystem`]: directory enumeration and file reads for the local tree
//!   (see [`LocalFileSystem`]).
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall`, so tests can script remote
//!   responses (including title collisions) deterministically.
//!
//! ## Source-path marker
//! Every document created by the core carries the node's relative path as an
//! opaque marker. Implementors must store and return it byte-for-byte; the
//! matcher relies on exact equality.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use mockall::automock;
use serde::Serialize;
use thiserror::Error;

/// Request to create a new, empty remote document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument<'a> {
    /// Parent document id; `None` places the document at the remote root.
    pub parent_id: Option<&'a str>,
    /// Candidate title. Must be unique among siblings in the remote store.
    pub title: &'a str,
    /// Initial body. The materializer always sends an empty body.
    pub body: &'a str,
    /// Source-path marker persisted on the document.
    pub source_path: &'a str,
    /// Space the document lives in.
    pub space_key: &'a str,
}

/// A single document fetched by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteDocument {
    pub id: String,
    pub title: String,
    pub space_key: String,
    /// Web links reported by the store (e.g. `webui`, `tinyui`).
    pub links: Vec<(String, String)>,
}

/// Listing entry for an existing document below the sync root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteDocumentSummary {
    pub id: String,
    pub title: String,
    /// Marker written at creation time; `None` for documents created by hand.
    pub source_path: Option<String>,
}

/// Errors surfaced by a [`DocumentStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// A sibling with the same title already exists. Recoverable by retrying
    /// with another title.
    #[error("a document titled {title:?} already exists under this parent")]
    TitleCollision { title: String },

    #[error("document {0} not found")]
    NotFound(String),

    /// The store answered, but not with something we can use.
    #[error("remote store returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("remote store transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Remote hierarchical document store.
///
/// All methods are awaited sequentially by the core; implementors do not need
/// to handle concurrent calls from a single run.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document and return its id, or [`StoreError::TitleCollision`].
    async fn create_document<'a>(&self, req: NewDocument<'a>) -> Result<String, StoreError>;

    /// Fetch one document by id.
    async fn get_document_by_id(&self, id: &str) -> Result<RemoteDocument, StoreError>;

    /// List every document below `parent_id` (all depths) with its marker.
    async fn list_child_documents(
        &self,
        parent_id: &str,
    ) -> Result<Vec<RemoteDocumentSummary>, StoreError>;
}

/// One entry returned by [`FileSystem::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub modified: Option<SystemTime>,
}

/// Local filesystem access used by the tree builder and the pipeline.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait FileSystem: Send + Sync {
    /// List the entries of `path`. Order is not significant; callers sort.
    fn read_dir(&self, path: &Path) -> std::io::Result<Vec<DirEntry>>;

    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>>;
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn read_dir(&self, path: &Path) -> std::io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry_res in std::fs::read_dir(path)? {
            let entry = entry_res?;
            let metadata = entry.metadata()?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
                is_dir: metadata.is_dir(),
                modified: metadata.modified().ok(),
            });
        }
        Ok(entries)
    }

    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

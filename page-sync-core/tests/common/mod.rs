#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use page_sync_core::contract::{
    DocumentStore, NewDocument, RemoteDocument, RemoteDocumentSummary, StoreError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPage {
    pub id: String,
    pub parent_id: Option<String>,
    pub title: String,
    pub space_key: String,
    pub source_path: Option<String>,
}

#[derive(Default)]
struct State {
    next_id: u64,
    pages: Vec<StoredPage>,
    created: usize,
    attempted_titles: Vec<String>,
    rejected_paths: Vec<String>,
}

/// Remote store double that enforces unique titles among siblings.
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    /// Store holding a single root page with id "1".
    pub fn with_root(title: &str, space_key: &str) -> Self {
        let store = InMemoryStore {
            state: Mutex::new(State {
                next_id: 1,
                ..State::default()
            }),
        };
        store.insert_page(None, title, space_key, None);
        store
    }

    /// Add a page as if it already existed before the run.
    pub fn insert_page(
        &self,
        parent_id: Option<&str>,
        title: &str,
        space_key: &str,
        source_path: Option<&str>,
    ) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id.to_string();
        state.next_id += 1;
        state.pages.push(StoredPage {
            id: id.clone(),
            parent_id: parent_id.map(str::to_string),
            title: title.to_string(),
            space_key: space_key.to_string(),
            source_path: source_path.map(str::to_string),
        });
        id
    }

    /// Make every create request for `source_path` fail with a 403.
    pub fn reject_path(&self, source_path: &str) {
        self.state
            .lock()
            .unwrap()
            .rejected_paths
            .push(source_path.to_string());
    }

    pub fn created(&self) -> usize {
        self.state.lock().unwrap().created
    }

    pub fn attempted_titles(&self) -> Vec<String> {
        self.state.lock().unwrap().attempted_titles.clone()
    }

    pub fn pages(&self) -> Vec<StoredPage> {
        self.state.lock().unwrap().pages.clone()
    }

    pub fn page(&self, id: &str) -> Option<StoredPage> {
        self.pages().into_iter().find(|p| p.id == id)
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create_document<'a>(&self, req: NewDocument<'a>) -> Result<String, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.attempted_titles.push(req.title.to_string());
        if state.rejected_paths.iter().any(|p| p == req.source_path) {
            return Err(StoreError::Api {
                status: 403,
                message: format!("not allowed to create {}", req.source_path),
            });
        }
        let parent = req.parent_id.map(str::to_string);
        if state
            .pages
            .iter()
            .any(|p| p.parent_id == parent && p.title == req.title)
        {
            return Err(StoreError::TitleCollision {
                title: req.title.to_string(),
            });
        }
        let id = state.next_id.to_string();
        state.next_id += 1;
        state.created += 1;
        state.pages.push(StoredPage {
            id: id.clone(),
            parent_id: parent,
            title: req.title.to_string(),
            space_key: req.space_key.to_string(),
            source_path: Some(req.source_path.to_string()),
        });
        Ok(id)
    }

    async fn get_document_by_id(&self, id: &str) -> Result<RemoteDocument, StoreError> {
        let state = self.state.lock().unwrap();
        state
            .pages
            .iter()
            .find(|p| p.id == id)
            .map(|p| RemoteDocument {
                id: p.id.clone(),
                title: p.title.clone(),
                space_key: p.space_key.clone(),
                links: vec![("webui".to_string(), format!("/pages/{}", p.id))],
            })
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list_child_documents(
        &self,
        parent_id: &str,
    ) -> Result<Vec<RemoteDocumentSummary>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut frontier = vec![parent_id.to_string()];
        let mut found = Vec::new();
        while let Some(current) = frontier.pop() {
            for page in state
                .pages
                .iter()
                .filter(|p| p.parent_id.as_deref() == Some(current.as_str()))
            {
                frontier.push(page.id.clone());
                found.push(RemoteDocumentSummary {
                    id: page.id.clone(),
                    title: page.title.clone(),
                    source_path: page.source_path.clone(),
                });
            }
        }
        Ok(found)
    }
}

pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

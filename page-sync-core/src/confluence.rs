//! # confluence: `DocumentStore` backed by the Confluence REST API
//!
//! Talks to `{base_url}/rest/api/content` with basic auth (account email plus
//! API token). The source-path marker is stored as the `source-path` content
//! property, set on creation and read back through
//! `expand=metadata.properties.source-path` when listing.
//!
//! Listing walks every descendant page of the root in batches of
//! [`API_BATCH_LIMIT`], following `start` offsets until a short batch comes
//! back.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::contract::{
    DocumentStore, NewDocument, RemoteDocument, RemoteDocumentSummary, StoreError,
};

pub const SOURCE_PATH_PROPERTY: &str = "source-path";
pub const API_BATCH_LIMIT: usize = 100;

static PAGE_PATH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/pages/(\d+)(?:/|$)").expect("page path pattern compiles"));
static EDIT_PATH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/pages/edit[^/]*/(\d+)$").expect("edit path pattern compiles"));

pub struct ConfluenceClient {
    client: Client,
    base_url: String,
    email: String,
    token: String,
}

impl ConfluenceClient {
    pub fn new(base_url: impl Into<String>, email: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!(base_url = %base_url, "Initialized ConfluenceClient");
        ConfluenceClient {
            client: Client::new(),
            base_url,
            email: email.into(),
            token: token.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.basic_auth(&self.email, Some(&self.token))
    }

    async fn send(&self, req: RequestBuilder, url: &str) -> Result<(StatusCode, String), StoreError> {
        let resp = self.authed(req).send().await.map_err(|e| {
            error!(error = ?e, url = %url, "Failed to reach Confluence");
            StoreError::Transport(Box::new(e))
        })?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| StoreError::Transport(Box::new(e)))?;
        Ok((status, text))
    }

    async fn get_json(&self, url: &str) -> Result<Value, StoreError> {
        let (status, text) = self.send(self.client.get(url), url).await?;
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            error!(status = %status, url = %url, "Confluence API returned error. Response body: {text}");
            return Err(api_error(status, text));
        }
        parse_json(&text)
    }
}

#[async_trait]
impl DocumentStore for ConfluenceClient {
    async fn create_document<'a>(&self, req: NewDocument<'a>) -> Result<String, StoreError> {
        let url = format!("{}/rest/api/content", self.base_url);
        let payload = create_payload(&req);
        debug!(url = %url, title = req.title, source_path = req.source_path, "Creating Confluence page");

        let (status, text) = self.send(self.client.post(&url).json(&payload), &url).await?;
        if is_title_collision(status, &text) {
            return Err(StoreError::TitleCollision {
                title: req.title.to_string(),
            });
        }
        if !status.is_success() {
            error!(status = %status, url = %url, title = req.title, "Confluence refused page creation. Response body: {text}");
            return Err(api_error(status, text));
        }
        let created = parse_document(&parse_json(&text)?)?;
        info!(id = %created.id, title = %created.title, "Created Confluence page");
        Ok(created.id)
    }

    async fn get_document_by_id(&self, id: &str) -> Result<RemoteDocument, StoreError> {
        let url = format!("{}/rest/api/content/{}?expand=space", self.base_url, id);
        info!(url = %url, "Fetching Confluence page");
        let value = self.get_json(&url).await.map_err(|e| match e {
            StoreError::NotFound(_) => StoreError::NotFound(id.to_string()),
            other => other,
        })?;
        parse_document(&value)
    }

    async fn list_child_documents(
        &self,
        parent_id: &str,
    ) -> Result<Vec<RemoteDocumentSummary>, StoreError> {
        let mut start = 0;
        let mut pages = Vec::new();
        loop {
            let url = format!(
                "{}/rest/api/content/{}/descendant/page?expand=metadata.properties.{}&limit={}&start={}",
                self.base_url, parent_id, SOURCE_PATH_PROPERTY, API_BATCH_LIMIT, start
            );
            let value = self.get_json(&url).await?;
            let batch = parse_summaries(&value);
            let size = value
                .get("results")
                .and_then(|v| v.as_array())
                .map(|results| results.len())
                .unwrap_or(0);
            pages.extend(batch);

            if size < API_BATCH_LIMIT {
                break;
            }
            start += API_BATCH_LIMIT;
        }
        info!(parent_id, count = pages.len(), "Listed Confluence descendant pages");
        Ok(pages)
    }
}

fn api_error(status: StatusCode, message: String) -> StoreError {
    StoreError::Api {
        status: status.as_u16(),
        message,
    }
}

fn parse_json(text: &str) -> Result<Value, StoreError> {
    serde_json::from_str(text).map_err(|e| StoreError::Transport(Box::new(e)))
}

/// JSON body for `POST /rest/api/content`.
pub fn create_payload(req: &NewDocument<'_>) -> Value {
    let mut payload = json!({
        "type": "page",
        "title": req.title,
        "space": { "key": req.space_key },
        "body": {
            "storage": { "value": req.body, "representation": "storage" }
        },
        "metadata": {
            "properties": {
                SOURCE_PATH_PROPERTY: { "key": SOURCE_PATH_PROPERTY, "value": req.source_path }
            }
        }
    });
    if let Some(parent_id) = req.parent_id {
        payload["ancestors"] = json!([{ "id": parent_id }]);
    }
    payload
}

/// Confluence answers a duplicate sibling title with 400 and a message
/// containing "already exists".
pub fn is_title_collision(status: StatusCode, body: &str) -> bool {
    status == StatusCode::BAD_REQUEST && body.to_ascii_lowercase().contains("already exists")
}

pub fn parse_document(value: &Value) -> Result<RemoteDocument, StoreError> {
    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| StoreError::Api {
            status: 200,
            message: "page response without id".to_string(),
        })?
        .to_string();
    let title = value
        .get("title")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let space_key = value
        .get("space")
        .and_then(|s| s.get("key"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let links = value
        .get("_links")
        .and_then(|v| v.as_object())
        .map(|links| {
            links
                .iter()
                .filter_map(|(name, href)| href.as_str().map(|h| (name.clone(), h.to_string())))
                .collect()
        })
        .unwrap_or_default();
    Ok(RemoteDocument {
        id,
        title,
        space_key,
        links,
    })
}

/// Entries of a `results` array; entries without an id are dropped.
pub fn parse_summaries(value: &Value) -> Vec<RemoteDocumentSummary> {
    value
        .get("results")
        .and_then(|v| v.as_array())
        .map(|results| {
            results
                .iter()
                .filter_map(|page| {
                    let id = page.get("id").and_then(|v| v.as_str())?.to_string();
                    let title = page
                        .get("title")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string();
                    let source_path = page
                        .get("metadata")
                        .and_then(|m| m.get("properties"))
                        .and_then(|p| p.get(SOURCE_PATH_PROPERTY))
                        .and_then(|prop| prop.get("value"))
                        .map(|v| match v.as_str() {
                            Some(s) => s.to_string(),
                            None => v.to_string(),
                        });
                    Some(RemoteDocumentSummary {
                        id,
                        title,
                        source_path,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Page id from a Confluence page URL (`?pageId=`, `/pages/<id>/...` or
/// `/pages/edit.../<id>`), or the input itself when it is a bare id.
pub fn page_id_from_url(input: &str) -> Option<String> {
    let input = input.trim();
    if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
        return Some(input.to_string());
    }
    let parsed = url::Url::parse(input).ok()?;
    if let Some((_, id)) = parsed.query_pairs().find(|(key, _)| key == "pageId") {
        if !id.is_empty() {
            return Some(id.into_owned());
        }
    }
    let path = parsed.path();
    PAGE_PATH_PATTERN
        .captures(path)
        .or_else(|| EDIT_PATH_PATTERN.captures(path))
        .map(|caps| caps[1].to_string())
}

/// `scheme://host[:port]` of a page URL, used when no base URL is configured.
pub fn base_url_from_page_url(input: &str) -> Option<String> {
    let parsed = url::Url::parse(input).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    })
}

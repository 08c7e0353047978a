use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, info};

use crate::tree::TreeOptions;

/// Reserved filename that represents its directory's own content.
pub const DEFAULT_INDEX_FILE: &str = "readme.md";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Confluence base URL, e.g. `https://example.atlassian.net/wiki`.
    pub base_url: String,
    /// Page under which the local tree is mirrored.
    pub root_page_id: String,
    pub root_dir: PathBuf,
    #[serde(default = "default_index_file")]
    pub index_file: String,
    /// Recognized content extensions, without the dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Only content files modified within this many minutes are synced.
    #[serde(default)]
    pub since_minutes: Option<u64>,
    /// Resolve and prepare without creating any remote page.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_index_file() -> String {
    DEFAULT_INDEX_FILE.to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["md".to_string()]
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Missing(&'static str),
}

impl SyncConfig {
    pub fn new(
        base_url: impl Into<String>,
        root_page_id: impl Into<String>,
        root_dir: impl Into<PathBuf>,
    ) -> Self {
        SyncConfig {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            root_page_id: root_page_id.into(),
            root_dir: root_dir.into(),
            index_file: default_index_file(),
            extensions: default_extensions(),
            since_minutes: None,
            dry_run: false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Missing("base_url"));
        }
        if self.root_page_id.trim().is_empty() {
            return Err(ConfigError::Missing("root_page_id"));
        }
        if self.index_file.trim().is_empty() {
            return Err(ConfigError::Missing("index_file"));
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::Missing("extensions"));
        }
        Ok(())
    }

    /// Builder options for a run starting at `now`.
    pub fn tree_options(&self, now: SystemTime) -> TreeOptions {
        TreeOptions {
            index_file: self.index_file.clone(),
            extensions: self.extensions.clone(),
            modified_after: self
                .since_minutes
                .and_then(|minutes| now.checked_sub(Duration::from_secs(minutes.saturating_mul(60)))),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            base_url = %self.base_url,
            root_page_id = %self.root_page_id,
            root_dir = %self.root_dir.display(),
            dry_run = self.dry_run,
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_trailing_slash_and_applies_defaults() {
        let config = SyncConfig::new("https://wiki.example.com/", "42", "docs");
        assert_eq!(config.base_url, "https://wiki.example.com");
        assert_eq!(config.index_file, "readme.md");
        assert_eq!(config.extensions, vec!["md".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_root_page() {
        let config = SyncConfig::new("https://wiki.example.com", " ", "docs");
        assert_eq!(
            config.validate(),
            Err(ConfigError::Missing("root_page_id"))
        );
    }

    #[test]
    fn since_minutes_becomes_cutoff() {
        let mut config = SyncConfig::new("https://wiki.example.com", "1", "docs");
        config.since_minutes = Some(10);
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(3600);
        let options = config.tree_options(now);
        assert_eq!(
            options.modified_after,
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(3000))
        );
    }

    #[test]
    fn huge_since_minutes_means_no_cutoff() {
        let mut config = SyncConfig::new("https://wiki.example.com", "1", "docs");
        config.since_minutes = Some(u64::MAX);
        let options = config.tree_options(SystemTime::UNIX_EPOCH + Duration::from_secs(3600));
        assert_eq!(options.modified_after, None);
    }
}

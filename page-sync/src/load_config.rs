/// `load_config` module: reads the static YAML config and the Confluence
/// credentials from the environment, and turns both into the core
/// [`SyncConfig`] plus the CLI-only settings.
///
/// The YAML file never holds secrets. `CONFLUENCE_API_EMAIL` and
/// `CONFLUENCE_API_TOKEN` are read from the environment (a `.env` file is
/// loaded by `main`).
///
/// `confluence.root_page` may be a bare page id or any page URL Confluence
/// hands out. When `confluence.base_url` is omitted it is derived from that URL.
use anyhow::{anyhow, Context, Result};
use page_sync_core::config::{SyncConfig, DEFAULT_INDEX_FILE};
use page_sync_core::confluence::{base_url_from_page_url, page_id_from_url};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const EMAIL_ENV: &str = "CONFLUENCE_API_EMAIL";
pub const TOKEN_ENV: &str = "CONFLUENCE_API_TOKEN";

#[derive(Debug, Deserialize)]
pub struct ConfluenceSection {
    #[serde(default)]
    pub base_url: Option<String>,
    pub root_page: String,
}

#[derive(Debug, Deserialize)]
pub struct SourceSection {
    pub root_dir: PathBuf,
    #[serde(default)]
    pub index_file: Option<String>,
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
    #[serde(default)]
    pub since_minutes: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    confluence: ConfluenceSection,
    source: SourceSection,
    output_dir: PathBuf,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug)]
pub struct CliConfig {
    pub sync: SyncConfig,
    pub output_dir: PathBuf,
    pub credentials: Credentials,
}

/// Loads a static YAML config file and injects the credentials from env vars.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    let raw: RawConfig = serde_yaml::from_str(&config_content).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
        anyhow!("Failed to parse config YAML: {e}")
    })?;
    info!(config_path = ?path_ref, "Parsed config YAML successfully");

    let sync = sync_config(raw.confluence, raw.source)?;
    let credentials = credentials_from_env()?;
    sync.trace_loaded();

    Ok(CliConfig {
        sync,
        output_dir: raw.output_dir,
        credentials,
    })
}

fn sync_config(confluence: ConfluenceSection, source: SourceSection) -> Result<SyncConfig> {
    let root_page_id = page_id_from_url(&confluence.root_page).ok_or_else(|| {
        anyhow!(
            "confluence.root_page {:?} is neither a page id nor a page URL",
            confluence.root_page
        )
    })?;
    let base_url = match confluence.base_url {
        Some(url) => url,
        None => base_url_from_page_url(&confluence.root_page).ok_or_else(|| {
            anyhow!("confluence.base_url is required when root_page is a bare id")
        })?,
    };

    let mut sync = SyncConfig::new(base_url, root_page_id, source.root_dir);
    sync.index_file = source
        .index_file
        .unwrap_or_else(|| DEFAULT_INDEX_FILE.to_string());
    if let Some(extensions) = source.extensions {
        sync.extensions = extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_string())
            .collect();
    }
    sync.since_minutes = source.since_minutes;
    sync.validate().context("Invalid sync configuration")?;
    Ok(sync)
}

fn credentials_from_env() -> Result<Credentials> {
    match (env::var(EMAIL_ENV), env::var(TOKEN_ENV)) {
        (Ok(email), Ok(token)) if !email.is_empty() && !token.is_empty() => {
            Ok(Credentials { email, token })
        }
        _ => {
            error!(email_var = EMAIL_ENV, token_var = TOKEN_ENV, "Missing Confluence credentials in environment");
            Err(anyhow!("{EMAIL_ENV} and {TOKEN_ENV} must be set"))
        }
    }
}

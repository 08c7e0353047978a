use std::path::PathBuf;

use thiserror::Error;

use crate::contract::StoreError;

/// Errors raised by the reconciliation core.
///
/// `Io` and `Store` raised while building the tree or loading the remote root
/// abort the run. `MaterializationExhausted` and per-node `Store` failures
/// during materialization are collected into
/// [`crate::materialize::MaterializeReport`] instead.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("could not create a page for {relative_path} after {attempts} attempts")]
    MaterializationExhausted {
        relative_path: String,
        attempts: usize,
    },

    #[error(transparent)]
    Meta(#[from] crate::meta::MetaError),

    #[error("invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }
}

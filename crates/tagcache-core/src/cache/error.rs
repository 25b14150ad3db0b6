use std::path::PathBuf;

use thiserror::Error;

use crate::api::ApiError;
use crate::models::{ScopeId, Tag, TagError};

/// Durable-storage failure. Always surfaced to the caller.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Unsupported state version {version} in {}", path.display())]
    UnsupportedVersion { path: PathBuf, version: u32 },

    #[error("Invalid state in {}: {reason}", path.display())]
    InvalidDocument { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    InvalidKey(#[from] TagError),

    #[error("#{tag} is already registered in {scope}")]
    AlreadyRegistered { scope: ScopeId, tag: Tag },

    #[error("#{tag} is not registered in {scope}")]
    NotRegistered { scope: ScopeId, tag: String },

    #[error("Unable to load #{tag} from API and no cached data exists: {source}")]
    Unavailable {
        tag: Tag,
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}

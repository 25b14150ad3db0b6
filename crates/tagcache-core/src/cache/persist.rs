//! File layout and atomic writes for persisted store state.
//!
//! ```text
//! <data_dir>/scopes/<scope>.json   one document per scope
//! <data_dir>/unscoped.json         snapshots of tags no scope registers
//! ```

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::document::ScopeDocument;
use super::error::PersistenceError;
use crate::models::ScopeId;

const SCOPES_DIR: &str = "scopes";
const UNSCOPED_FILE: &str = "unscoped.json";
const TMP_EXTENSION: &str = "json.tmp";

/// Everything the store keeps on disk.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PersistedState {
    pub scopes: BTreeMap<ScopeId, ScopeDocument>,
    pub unscoped: ScopeDocument,
}

#[derive(Debug, Clone)]
pub struct StateFiles {
    data_dir: PathBuf,
}

impl StateFiles {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn scope_path(&self, scope: ScopeId) -> PathBuf {
        self.data_dir.join(SCOPES_DIR).join(format!("{}.json", scope))
    }

    pub fn unscoped_path(&self) -> PathBuf {
        self.data_dir.join(UNSCOPED_FILE)
    }

    /// Load every persisted document. A missing directory or file is empty state.
    pub async fn load_all(&self) -> Result<PersistedState, PersistenceError> {
        let mut state = PersistedState::default();

        let unscoped_path = self.unscoped_path();
        if let Some(doc) = read_document(&unscoped_path).await? {
            doc.validate_unscoped(&unscoped_path)?;
            state.unscoped = doc;
        }

        let scopes_dir = self.data_dir.join(SCOPES_DIR);
        let mut entries = match tokio::fs::read_dir(&scopes_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(state),
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: scopes_dir,
                    source,
                })
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    return Err(PersistenceError::Read {
                        path: scopes_dir,
                        source,
                    })
                }
            };
            let path = entry.path();
            let Some(scope) = scope_from_path(&path) else {
                debug!(path = %path.display(), "Skipping non-scope file");
                continue;
            };
            if let Some(doc) = read_document(&path).await? {
                doc.validate_scope(&path)?;
                state.scopes.insert(scope, doc);
            }
        }

        debug!(scopes = state.scopes.len(), "Loaded persisted state");
        Ok(state)
    }

    pub async fn save_scope(&self, scope: ScopeId, doc: &ScopeDocument) -> Result<(), PersistenceError> {
        write_atomic(&self.scope_path(scope), doc).await
    }

    pub async fn save_unscoped(&self, doc: &ScopeDocument) -> Result<(), PersistenceError> {
        write_atomic(&self.unscoped_path(), doc).await
    }

    pub async fn remove_scope(&self, scope: ScopeId) -> Result<(), PersistenceError> {
        let path = self.scope_path(scope);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PersistenceError::Write { path, source }),
        }
    }
}

fn scope_from_path(path: &Path) -> Option<ScopeId> {
    if path.extension()? != "json" {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

async fn read_document(path: &Path) -> Result<Option<ScopeDocument>, PersistenceError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistenceError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| PersistenceError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Write `doc` to a sibling temporary file, then rename it over `path`.
async fn write_atomic(path: &Path, doc: &ScopeDocument) -> Result<(), PersistenceError> {
    let contents = serde_json::to_string_pretty(doc)?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| PersistenceError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let tmp_path = path.with_extension(TMP_EXTENSION);
    if let Err(source) = tokio::fs::write(&tmp_path, contents).await {
        return Err(PersistenceError::Write {
            path: tmp_path,
            source,
        });
    }

    if let Err(source) = tokio::fs::rename(&tmp_path, path).await {
        if let Err(e) = tokio::fs::remove_file(&tmp_path).await {
            warn!(path = %tmp_path.display(), error = %e, "Failed to clean up temporary state file");
        }
        return Err(PersistenceError::Write {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

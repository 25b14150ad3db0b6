//! On-disk schema for one scope's registrations and snapshots.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::PersistenceError;
use super::snapshot::Snapshot;
use crate::models::{MemberId, Tag};

/// Current document schema version.
pub const STATE_VERSION: u32 = 1;

fn current_version() -> u32 {
    STATE_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeDocument {
    #[serde(default = "current_version")]
    pub version: u32,
    /// Tracked tags, in registration order.
    #[serde(default)]
    pub registered_keys: Vec<Tag>,
    #[serde(default)]
    pub snapshots: BTreeMap<Tag, Snapshot>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub members: BTreeMap<MemberId, Tag>,
}

impl Default for ScopeDocument {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            registered_keys: Vec::new(),
            snapshots: BTreeMap::new(),
            members: BTreeMap::new(),
        }
    }
}

impl ScopeDocument {
    pub fn is_registered(&self, tag: &Tag) -> bool {
        self.registered_keys.contains(tag)
    }

    /// Store `snapshot` unless the current one for `tag` was captured later.
    /// Returns whether the document changed.
    pub fn put_snapshot(&mut self, tag: &Tag, snapshot: &Snapshot) -> bool {
        match self.snapshots.get(tag) {
            Some(existing) if existing.is_newer_than(snapshot) => false,
            _ => {
                self.snapshots.insert(tag.clone(), snapshot.clone());
                true
            }
        }
    }

    /// Member linked to `tag`, if any.
    pub fn member_for(&self, tag: &Tag) -> Option<MemberId> {
        self.members
            .iter()
            .find(|(_, linked)| *linked == tag)
            .map(|(member, _)| *member)
    }

    pub fn is_empty(&self) -> bool {
        self.registered_keys.is_empty() && self.snapshots.is_empty() && self.members.is_empty()
    }

    /// Check a scope document loaded from `path`.
    ///
    /// Rejects unknown versions, duplicate registrations and snapshots for
    /// tags the scope does not track.
    pub fn validate_scope(&self, path: &Path) -> Result<(), PersistenceError> {
        self.check_version(path)?;

        let mut seen = HashSet::new();
        for tag in &self.registered_keys {
            if !seen.insert(tag) {
                return Err(PersistenceError::InvalidDocument {
                    path: path.to_path_buf(),
                    reason: format!("#{} is registered more than once", tag),
                });
            }
        }

        if let Some(orphan) = self.snapshots.keys().find(|tag| !seen.contains(tag)) {
            return Err(PersistenceError::InvalidDocument {
                path: path.to_path_buf(),
                reason: format!("snapshot for unregistered #{}", orphan),
            });
        }
        Ok(())
    }

    /// Check the unscoped document, which holds snapshots only.
    pub fn validate_unscoped(&self, path: &Path) -> Result<(), PersistenceError> {
        self.check_version(path)?;
        if !self.registered_keys.is_empty() || !self.members.is_empty() {
            return Err(PersistenceError::InvalidDocument {
                path: path.to_path_buf(),
                reason: "unscoped state cannot hold registrations or member links".to_string(),
            });
        }
        Ok(())
    }

    fn check_version(&self, path: &Path) -> Result<(), PersistenceError> {
        if self.version != STATE_VERSION {
            return Err(PersistenceError::UnsupportedVersion {
                path: path.to_path_buf(),
                version: self.version,
            });
        }
        Ok(())
    }
}

//! tagcache core library.
//!
//! Tracks game-entity tags (players, clans, bands) per chat server, fetches
//! their profiles from a statistics API and keeps the last good snapshot on
//! disk so it can be shown when the API is down.
//!
//! - [`models`]: tags, scopes and profile schemas
//! - [`api`]: HTTP client and the [`api::Fetcher`] seam
//! - [`cache`]: the snapshot store and its persistence
//! - [`refresh`]: background refresh scheduler
//! - [`config`]: configuration file handling

pub mod api;
pub mod cache;
pub mod config;
pub mod models;
pub mod refresh;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiError, Fetcher};
pub use cache::{EntityStore, FetchOutcome, PersistenceError, RefreshSummary, Snapshot, StateFiles, StoreError};
pub use config::{Config, ProfileKind};
pub use models::{ScopeId, Tag, TagError};
pub use refresh::RefreshScheduler;

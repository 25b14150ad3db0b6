//! Local caching module for offline data access.
//!
//! This module provides the `EntityStore`, which tracks tags per scope and
//! keeps the last fetched JSON snapshot of each one on disk so it can be
//! served when the API is unreachable.
//!
//! State is stored as one JSON document per scope:
//! - `registered_keys`: tracked tags in registration order
//! - `snapshots`: last fetched data per tag, with capture time
//! - `members`: member-to-tag links

pub mod document;
pub mod error;
pub mod persist;
pub mod snapshot;
pub mod store;

pub use document::{ScopeDocument, STATE_VERSION};
pub use error::{PersistenceError, StoreError};
pub use persist::{PersistedState, StateFiles};
pub use snapshot::{CachedData, Snapshot};
pub use store::{EntityStore, FetchOutcome, RefreshSummary, MAX_CONCURRENT_FETCHES};

//! Cached remote entity store.
//!
//! Maps tags to the latest known JSON snapshot, preferring a live fetch and
//! falling back to the last persisted snapshot when the API is unreachable.
//! Registrations and snapshots are persisted per scope after every change;
//! the in-memory copy is only a cache of what is on disk.

use std::collections::BTreeSet;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::document::ScopeDocument;
use super::error::{PersistenceError, StoreError};
use super::persist::{PersistedState, StateFiles};
use super::snapshot::Snapshot;
use crate::api::{ApiClient, ApiError, Fetcher};
use crate::models::{tag::normalize, MemberId, ScopeId, Tag};

/// Maximum number of fetches in flight during a batch refresh.
pub const MAX_CONCURRENT_FETCHES: usize = 5;

/// Result of a fetch that produced data.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Data just fetched from the API.
    Fresh(Snapshot),
    /// The live fetch failed; this is the last persisted snapshot.
    Stale { snapshot: Snapshot, error: ApiError },
}

impl FetchOutcome {
    pub fn snapshot(&self) -> &Snapshot {
        match self {
            FetchOutcome::Fresh(snapshot) | FetchOutcome::Stale { snapshot, .. } => snapshot,
        }
    }

    pub fn into_snapshot(self) -> Snapshot {
        match self {
            FetchOutcome::Fresh(snapshot) | FetchOutcome::Stale { snapshot, .. } => snapshot,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, FetchOutcome::Stale { .. })
    }
}

/// Per-key results of a batch refresh.
#[derive(Debug, Default)]
pub struct RefreshSummary {
    /// Keys updated with fresh data.
    pub refreshed: usize,
    pub stale: Vec<Tag>,
    pub unavailable: Vec<Tag>,
    /// Keys whose fresh data could not be persisted.
    pub failed: Vec<Tag>,
}

impl RefreshSummary {
    pub fn attempted(&self) -> usize {
        self.refreshed + self.stale.len() + self.unavailable.len() + self.failed.len()
    }

    fn record(&mut self, tag: &Tag, result: Result<FetchOutcome, StoreError>) {
        match result {
            Ok(FetchOutcome::Fresh(_)) => self.refreshed += 1,
            Ok(FetchOutcome::Stale { .. }) => self.stale.push(tag.clone()),
            Err(StoreError::Unavailable { .. }) => self.unavailable.push(tag.clone()),
            Err(e) => {
                error!(tag = %tag, error = %e, "Failed to store refreshed data");
                self.failed.push(tag.clone());
            }
        }
    }
}

/// One persisted document.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Scope(ScopeId),
    Unscoped,
}

pub struct EntityStore<F = ApiClient> {
    fetcher: F,
    files: StateFiles,
    request_timeout: Duration,
    state: Mutex<PersistedState>,
}

impl<F: Fetcher> EntityStore<F> {
    /// Open the store, rehydrating registrations and snapshots from disk.
    pub async fn open(
        fetcher: F,
        files: StateFiles,
        request_timeout: Duration,
    ) -> Result<Self, PersistenceError> {
        let state = files.load_all().await?;
        info!(
            scopes = state.scopes.len(),
            data_dir = %files.data_dir().display(),
            "Opened entity store"
        );
        Ok(Self {
            fetcher,
            files,
            request_timeout,
            state: Mutex::new(state),
        })
    }

    /// Timeout used by batch refreshes.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn files(&self) -> &StateFiles {
        &self.files
    }

    // ===== Registration =====

    /// Start tracking `key` in `scope`. Returns the normalized tag.
    pub async fn register(&self, scope: ScopeId, key: &str) -> Result<Tag, StoreError> {
        let tag = Tag::parse(key)?;

        let mut state = self.state.lock().await;
        let current = state.scopes.get(&scope);
        if current.is_some_and(|doc| doc.is_registered(&tag)) {
            return Err(StoreError::AlreadyRegistered { scope, tag });
        }

        let mut doc = current.cloned().unwrap_or_default();
        doc.registered_keys.push(tag.clone());

        // The scope takes over a snapshot fetched before registration.
        let mut unscoped = None;
        if let Some(snapshot) = state.unscoped.snapshots.get(&tag) {
            doc.put_snapshot(&tag, snapshot);
            let mut remaining = state.unscoped.clone();
            remaining.snapshots.remove(&tag);
            unscoped = Some(remaining);
        }

        let mut changes = vec![(Slot::Scope(scope), doc)];
        changes.extend(unscoped.map(|doc| (Slot::Unscoped, doc)));
        self.commit(&mut state, changes).await?;

        info!(scope = %scope, tag = %tag, "Registered tag");
        Ok(tag)
    }

    /// Stop tracking `key` in `scope` and discard its snapshot there.
    pub async fn unregister(&self, scope: ScopeId, key: &str) -> Result<(), StoreError> {
        let not_registered = || StoreError::NotRegistered {
            scope,
            tag: normalize(key),
        };
        let Ok(tag) = Tag::parse(key) else {
            return Err(not_registered());
        };

        let mut state = self.state.lock().await;
        let Some(current) = state.scopes.get(&scope).filter(|doc| doc.is_registered(&tag)) else {
            return Err(not_registered());
        };

        let mut doc = current.clone();
        doc.registered_keys.retain(|registered| registered != &tag);
        doc.snapshots.remove(&tag);

        let mut changes = vec![(Slot::Scope(scope), doc)];
        if state.unscoped.snapshots.contains_key(&tag) {
            let mut unscoped = state.unscoped.clone();
            unscoped.snapshots.remove(&tag);
            changes.push((Slot::Unscoped, unscoped));
        }
        self.commit(&mut state, changes).await?;

        info!(scope = %scope, tag = %tag, "Unregistered tag");
        Ok(())
    }

    /// Tags tracked in `scope`, in registration order.
    pub async fn registered(&self, scope: ScopeId) -> Vec<Tag> {
        let state = self.state.lock().await;
        state
            .scopes
            .get(&scope)
            .map(|doc| doc.registered_keys.clone())
            .unwrap_or_default()
    }

    /// Scopes that have persisted state.
    pub async fn scopes(&self) -> Vec<ScopeId> {
        self.state.lock().await.scopes.keys().copied().collect()
    }

    /// Wipe every registration, snapshot and member link of `scope`.
    pub async fn reset_scope(&self, scope: ScopeId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        self.files.remove_scope(scope).await?;
        state.scopes.remove(&scope);
        info!(scope = %scope, "Reset scope");
        Ok(())
    }

    // ===== Fetching =====

    /// Fetch `tag` from the API, falling back to the last stored snapshot.
    ///
    /// Fresh data is persisted before it is returned. Network and parse
    /// failures never escape: they become [`FetchOutcome::Stale`] when a
    /// snapshot exists and [`StoreError::Unavailable`] when none does.
    pub async fn fetch(&self, tag: &Tag, timeout: Duration) -> Result<FetchOutcome, StoreError> {
        match self.fetcher.fetch(tag, timeout).await {
            Ok(data) => {
                let snapshot = Snapshot::new(data);
                self.record(tag, &snapshot).await?;
                debug!(tag = %tag, "Fetched fresh data");
                Ok(FetchOutcome::Fresh(snapshot))
            }
            Err(error) => match self.snapshot(tag).await {
                Some(snapshot) => {
                    warn!(
                        tag = %tag,
                        error = %error,
                        age_secs = snapshot.age().num_seconds(),
                        "Fetch failed, serving cached data"
                    );
                    Ok(FetchOutcome::Stale { snapshot, error })
                }
                None => {
                    warn!(tag = %tag, error = %error, "Fetch failed and no cached data exists");
                    Err(StoreError::Unavailable {
                        tag: tag.clone(),
                        source: error,
                    })
                }
            },
        }
    }

    /// Refresh a single tag, only if `scope` tracks it.
    pub async fn refresh_key(&self, scope: ScopeId, key: &str) -> Result<FetchOutcome, StoreError> {
        let tag = Tag::parse(key)?;
        if !self.registered(scope).await.contains(&tag) {
            return Err(StoreError::NotRegistered {
                scope,
                tag: tag.to_string(),
            });
        }
        self.fetch(&tag, self.request_timeout).await
    }

    /// Fetch every tag registered in `scope`.
    pub async fn refresh_all(&self, scope: ScopeId) -> RefreshSummary {
        let tags = self.registered(scope).await;
        self.refresh_tags(&tags).await
    }

    /// Fetch every tag registered in any scope, each one once.
    pub async fn refresh_every_scope(&self) -> RefreshSummary {
        let tags: Vec<Tag> = {
            let state = self.state.lock().await;
            let unique: BTreeSet<&Tag> = state
                .scopes
                .values()
                .flat_map(|doc| doc.registered_keys.iter())
                .collect();
            unique.into_iter().cloned().collect()
        };
        self.refresh_tags(&tags).await
    }

    async fn refresh_tags(&self, tags: &[Tag]) -> RefreshSummary {
        let mut summary = RefreshSummary::default();

        for chunk in tags.chunks(MAX_CONCURRENT_FETCHES) {
            let mut fetches = Vec::with_capacity(chunk.len());
            for tag in chunk {
                fetches.push(self.fetch(tag, self.request_timeout));
            }
            let results = join_all(fetches).await;
            for (tag, result) in chunk.iter().zip(results) {
                summary.record(tag, result);
            }
        }

        info!(
            refreshed = summary.refreshed,
            stale = summary.stale.len(),
            unavailable = summary.unavailable.len(),
            failed = summary.failed.len(),
            "Refresh complete"
        );
        summary
    }

    /// Persist `snapshot` into every scope tracking `tag`, or into the
    /// unscoped document when none does. All or nothing.
    async fn record(&self, tag: &Tag, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        let mut state = self.state.lock().await;

        let mut owned = false;
        let mut changes = Vec::new();
        for (scope, doc) in state.scopes.iter().filter(|(_, doc)| doc.is_registered(tag)) {
            owned = true;
            let mut doc = doc.clone();
            if doc.put_snapshot(tag, snapshot) {
                changes.push((Slot::Scope(*scope), doc));
            }
        }

        if !owned {
            let mut doc = state.unscoped.clone();
            if doc.put_snapshot(tag, snapshot) {
                changes.push((Slot::Unscoped, doc));
            }
        }

        self.commit(&mut state, changes).await
    }

    /// Write every changed document, then swap them into `state`.
    ///
    /// If a write fails, documents already written are restored from
    /// `state` and the in-memory state is left as it was.
    async fn commit(
        &self,
        state: &mut PersistedState,
        changes: Vec<(Slot, ScopeDocument)>,
    ) -> Result<(), PersistenceError> {
        for (i, (slot, doc)) in changes.iter().enumerate() {
            if let Err(e) = self.save(*slot, doc).await {
                for (written, _) in &changes[..i] {
                    self.restore(state, *written).await;
                }
                return Err(e);
            }
        }

        for (slot, doc) in changes {
            match slot {
                Slot::Scope(scope) => {
                    state.scopes.insert(scope, doc);
                }
                Slot::Unscoped => state.unscoped = doc,
            }
        }
        Ok(())
    }

    async fn save(&self, slot: Slot, doc: &ScopeDocument) -> Result<(), PersistenceError> {
        match slot {
            Slot::Scope(scope) => self.files.save_scope(scope, doc).await,
            Slot::Unscoped => self.files.save_unscoped(doc).await,
        }
    }

    /// Put the on-disk copy of `slot` back to what `state` holds.
    async fn restore(&self, state: &PersistedState, slot: Slot) {
        let result = match slot {
            Slot::Scope(scope) => match state.scopes.get(&scope) {
                Some(previous) => self.files.save_scope(scope, previous).await,
                None => self.files.remove_scope(scope).await,
            },
            Slot::Unscoped => self.files.save_unscoped(&state.unscoped).await,
        };
        if let Err(e) = result {
            error!(slot = ?slot, error = %e, "Failed to restore state file after a failed write");
        }
    }

    // ===== Cached reads =====

    /// Newest stored snapshot for `tag`, without touching the network.
    pub async fn snapshot(&self, tag: &Tag) -> Option<Snapshot> {
        let state = self.state.lock().await;
        newest_snapshot(&state, tag).cloned()
    }

    /// Time since the newest stored snapshot was captured.
    pub async fn cache_age(&self, tag: &Tag) -> Option<chrono::Duration> {
        let state = self.state.lock().await;
        newest_snapshot(&state, tag).map(Snapshot::age)
    }

    // ===== Member links =====

    /// Associate `member` with their own tag, replacing any earlier link.
    pub async fn link_member(&self, scope: ScopeId, member: MemberId, key: &str) -> Result<Tag, StoreError> {
        let tag = Tag::parse(key)?;

        let mut state = self.state.lock().await;
        let mut doc = state.scopes.get(&scope).cloned().unwrap_or_default();
        doc.members.insert(member, tag.clone());
        self.commit(&mut state, vec![(Slot::Scope(scope), doc)]).await?;

        debug!(scope = %scope, member, tag = %tag, "Linked member");
        Ok(tag)
    }

    /// Remove the link of `member`. Returns the tag that was linked.
    pub async fn unlink_member(&self, scope: ScopeId, member: MemberId) -> Result<Option<Tag>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(current) = state.scopes.get(&scope).filter(|doc| doc.members.contains_key(&member)) else {
            return Ok(None);
        };

        let mut doc = current.clone();
        let removed = doc.members.remove(&member);
        self.commit(&mut state, vec![(Slot::Scope(scope), doc)]).await?;
        Ok(removed)
    }

    pub async fn member_tag(&self, scope: ScopeId, member: MemberId) -> Option<Tag> {
        let state = self.state.lock().await;
        state.scopes.get(&scope)?.members.get(&member).cloned()
    }

    pub async fn tag_member(&self, scope: ScopeId, tag: &Tag) -> Option<MemberId> {
        let state = self.state.lock().await;
        state.scopes.get(&scope)?.member_for(tag)
    }
}

fn newest_snapshot<'a>(state: &'a PersistedState, tag: &Tag) -> Option<&'a Snapshot> {
    state
        .scopes
        .values()
        .chain(std::iter::once(&state.unscoped))
        .filter_map(|doc| doc.snapshots.get(tag))
        .max_by_key(|snapshot| snapshot.captured_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{temp_data_dir, MockFetcher};
    use serde_json::json;
    use std::path::PathBuf;

    const TIMEOUT: Duration = Duration::from_secs(5);
    const GUILD: ScopeId = ScopeId(1);

    async fn open_store(dir: &PathBuf, fetcher: MockFetcher) -> EntityStore<MockFetcher> {
        EntityStore::open(fetcher, StateFiles::new(dir), TIMEOUT)
            .await
            .expect("store should open")
    }

    fn tag(raw: &str) -> Tag {
        Tag::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_register_twice_is_rejected() {
        let dir = temp_data_dir("register");
        let store = open_store(&dir, MockFetcher::default()).await;

        let registered = store.register(GUILD, "#o82rq").await.unwrap();
        assert_eq!(registered.as_str(), "082RQ");

        let err = store.register(GUILD, "082RQ").await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyRegistered { .. }));

        // Other scopes are independent.
        store.register(ScopeId(2), "082RQ").await.unwrap();

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_register_invalid_key_never_fetches() {
        let dir = temp_data_dir("invalid");
        let fetcher = MockFetcher::default();
        let store = open_store(&dir, fetcher.clone()).await;

        let err = store.register(GUILD, "#HELLO").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
        assert!(store.registered(GUILD).await.is_empty());
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_unregister_unknown_key() {
        let dir = temp_data_dir("unregister");
        let store = open_store(&dir, MockFetcher::default()).await;

        let err = store.unregister(GUILD, "2PP").await.unwrap_err();
        assert!(matches!(err, StoreError::NotRegistered { ref tag, .. } if tag == "2PP"));

        let err = store.unregister(GUILD, "not a tag").await.unwrap_err();
        assert!(matches!(err, StoreError::NotRegistered { .. }));
    }

    #[tokio::test]
    async fn test_unregister_discards_snapshot() {
        let dir = temp_data_dir("discard");
        let fetcher = MockFetcher::default();
        fetcher.respond("2PP", json!({"name": "Alpha"}));
        let store = open_store(&dir, fetcher).await;

        store.register(GUILD, "2PP").await.unwrap();
        store.fetch(&tag("2PP"), TIMEOUT).await.unwrap();
        assert!(store.snapshot(&tag("2PP")).await.is_some());

        store.unregister(GUILD, "#2pp").await.unwrap();
        assert!(store.registered(GUILD).await.is_empty());
        assert!(store.snapshot(&tag("2PP")).await.is_none());
        assert!(store.cache_age(&tag("2PP")).await.is_none());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_fetch_falls_back_to_stale_snapshot() {
        let dir = temp_data_dir("stale");
        let fetcher = MockFetcher::default();
        let store = open_store(&dir, fetcher.clone()).await;
        let key = tag("2PP");
        store.register(GUILD, "2PP").await.unwrap();

        // Nothing cached yet.
        let err = store.fetch(&key, TIMEOUT).await.unwrap_err();
        assert!(err.is_unavailable());

        fetcher.respond("2PP", json!({"name": "Alpha", "trophies": 4000}));
        let fresh = store.fetch(&key, TIMEOUT).await.unwrap();
        assert!(!fresh.is_stale());
        let fresh = fresh.into_snapshot();

        fetcher.fail("2PP");
        match store.fetch(&key, TIMEOUT).await.unwrap() {
            FetchOutcome::Stale { snapshot, error } => {
                assert_eq!(snapshot, fresh);
                assert!(matches!(error, ApiError::Timeout));
            }
            other => panic!("expected stale data, got {:?}", other),
        }

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_cache_age_grows_after_fetch() {
        let dir = temp_data_dir("age");
        let fetcher = MockFetcher::default();
        fetcher.respond("LQQ", json!({}));
        let store = open_store(&dir, fetcher).await;
        let key = tag("LQQ");

        assert!(store.cache_age(&key).await.is_none());
        store.fetch(&key, TIMEOUT).await.unwrap();

        let first = store.cache_age(&key).await.unwrap();
        assert!(first < chrono::Duration::seconds(1));

        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = store.cache_age(&key).await.unwrap();
        assert!(second >= first);
        assert!(second >= chrono::Duration::milliseconds(20));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_refresh_all_counts_only_fresh_results() {
        let dir = temp_data_dir("refresh");
        let fetcher = MockFetcher::default();
        let store = open_store(&dir, fetcher.clone()).await;

        for key in ["2PP", "LQQ", "98VLYJ"] {
            store.register(GUILD, key).await.unwrap();
        }

        // Give LQQ a snapshot so its failure degrades to stale.
        fetcher.respond("LQQ", json!({"name": "Old"}));
        store.fetch(&tag("LQQ"), TIMEOUT).await.unwrap();
        fetcher.fail("LQQ");

        fetcher.respond("2PP", json!({"name": "Alpha"}));
        let summary = store.refresh_all(GUILD).await;

        assert_eq!(summary.refreshed, 1);
        assert_eq!(summary.stale, vec![tag("LQQ")]);
        assert_eq!(summary.unavailable, vec![tag("98VLYJ")]);
        assert!(summary.failed.is_empty());
        assert_eq!(summary.attempted(), 3);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_refresh_every_scope_fetches_shared_tags_once() {
        let dir = temp_data_dir("every");
        let fetcher = MockFetcher::default();
        fetcher.respond("2PP", json!({"name": "Shared"}));
        let store = open_store(&dir, fetcher.clone()).await;

        store.register(ScopeId(1), "2PP").await.unwrap();
        store.register(ScopeId(2), "2PP").await.unwrap();
        store.register(ScopeId(2), "LQQ").await.unwrap();

        let summary = store.refresh_every_scope().await;
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(summary.refreshed, 1);
        assert_eq!(summary.unavailable, vec![tag("LQQ")]);

        // The shared snapshot landed in both scopes.
        let reopened = open_store(&dir, MockFetcher::default()).await;
        let state = reopened.state.lock().await;
        for scope in [ScopeId(1), ScopeId(2)] {
            assert_eq!(state.scopes[&scope].snapshots[&tag("2PP")].data["name"], "Shared");
        }
        drop(state);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_refresh_key_requires_registration() {
        let dir = temp_data_dir("refresh-key");
        let fetcher = MockFetcher::default();
        fetcher.respond("2PP", json!({}));
        let store = open_store(&dir, fetcher.clone()).await;

        let err = store.refresh_key(GUILD, "2PP").await.unwrap_err();
        assert!(matches!(err, StoreError::NotRegistered { .. }));
        assert_eq!(fetcher.calls(), 0);

        store.register(GUILD, "2PP").await.unwrap();
        assert!(!store.refresh_key(GUILD, "2PP").await.unwrap().is_stale());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_unregistered_fetch_is_cached_unscoped() {
        let dir = temp_data_dir("unscoped");
        let fetcher = MockFetcher::default();
        fetcher.respond("C0G20PR2", json!({"name": "Loner"}));
        let store = open_store(&dir, fetcher.clone()).await;
        let key = tag("C0G20PR2");

        store.fetch(&key, TIMEOUT).await.unwrap();
        fetcher.fail("C0G20PR2");

        let reopened = open_store(&dir, fetcher).await;
        let outcome = reopened.fetch(&key, TIMEOUT).await.unwrap();
        assert!(outcome.is_stale());
        assert_eq!(outcome.snapshot().data["name"], "Loner");
        assert!(reopened.scopes().await.is_empty());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_reopen_restores_registrations_and_snapshots() {
        let dir = temp_data_dir("restart");
        let fetcher = MockFetcher::default();
        fetcher.respond("2PP", json!({"name": "Alpha"}));
        let store = open_store(&dir, fetcher.clone()).await;

        store.register(GUILD, "2PP").await.unwrap();
        store.register(GUILD, "LQQ").await.unwrap();
        store.link_member(GUILD, 42, "LQQ").await.unwrap();
        let fetched = store.fetch(&tag("2PP"), TIMEOUT).await.unwrap().into_snapshot();
        let before = store.state.lock().await.clone();
        drop(store);

        let reopened = open_store(&dir, fetcher).await;
        assert_eq!(reopened.registered(GUILD).await, vec![tag("2PP"), tag("LQQ")]);
        assert_eq!(reopened.snapshot(&tag("2PP")).await, Some(fetched));
        assert_eq!(reopened.member_tag(GUILD, 42).await, Some(tag("LQQ")));
        assert_eq!(*reopened.state.lock().await, before);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_persistence_failure_leaves_state_unchanged() {
        let dir = temp_data_dir("readonly");
        let store = open_store(&dir, MockFetcher::default()).await;

        // A plain file where the scopes directory should be.
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("scopes"), "").unwrap();

        let err = store.register(GUILD, "2PP").await.unwrap_err();
        assert!(matches!(err, StoreError::Persistence(PersistenceError::Write { .. })));
        assert!(store.registered(GUILD).await.is_empty());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_fresh_data_persistence_failure_is_reported() {
        let dir = temp_data_dir("fetch-write");
        let fetcher = MockFetcher::default();
        fetcher.respond("2PP", json!({}));
        let store = open_store(&dir, fetcher).await;

        // The unscoped document cannot be written over a directory.
        std::fs::create_dir_all(dir.join("unscoped.json")).unwrap();

        let err = store.fetch(&tag("2PP"), TIMEOUT).await.unwrap_err();
        assert!(matches!(err, StoreError::Persistence(_)));
        assert!(store.snapshot(&tag("2PP")).await.is_none());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_unregister_forgets_snapshot_fetched_before_registration() {
        let dir = temp_data_dir("adopt");
        let fetcher = MockFetcher::default();
        fetcher.respond("2PP", json!({"name": "Old"}));
        let store = open_store(&dir, fetcher.clone()).await;
        let key = tag("2PP");

        store.fetch(&key, TIMEOUT).await.unwrap();
        store.register(GUILD, "2PP").await.unwrap();
        {
            let state = store.state.lock().await;
            assert!(state.unscoped.snapshots.is_empty());
            assert_eq!(state.scopes[&GUILD].snapshots[&key].data["name"], "Old");
        }

        fetcher.respond("2PP", json!({"name": "New"}));
        store.fetch(&key, TIMEOUT).await.unwrap();
        store.unregister(GUILD, "2PP").await.unwrap();

        fetcher.fail("2PP");
        assert!(store.snapshot(&key).await.is_none());
        assert!(store.cache_age(&key).await.is_none());
        assert!(store.fetch(&key, TIMEOUT).await.unwrap_err().is_unavailable());

        let reopened = open_store(&dir, fetcher).await;
        assert!(reopened.snapshot(&key).await.is_none());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_failed_write_to_one_scope_rolls_back_the_others() {
        let dir = temp_data_dir("rollback");
        let fetcher = MockFetcher::default();
        fetcher.respond("2PP", json!({"name": "Alpha"}));
        let store = open_store(&dir, fetcher).await;
        store.register(ScopeId(1), "2PP").await.unwrap();
        store.register(ScopeId(2), "2PP").await.unwrap();

        // A directory in place of scope 2's document makes its write fail.
        let blocked = store.files().scope_path(ScopeId(2));
        std::fs::remove_file(&blocked).unwrap();
        std::fs::create_dir(&blocked).unwrap();

        let err = store.fetch(&tag("2PP"), TIMEOUT).await.unwrap_err();
        assert!(matches!(err, StoreError::Persistence(PersistenceError::Write { .. })));
        assert!(store.snapshot(&tag("2PP")).await.is_none());

        let on_disk = std::fs::read_to_string(store.files().scope_path(ScopeId(1))).unwrap();
        let doc: ScopeDocument = serde_json::from_str(&on_disk).unwrap();
        assert_eq!(doc.registered_keys, vec![tag("2PP")]);
        assert!(doc.snapshots.is_empty());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_member_links() {
        let dir = temp_data_dir("members");
        let store = open_store(&dir, MockFetcher::default()).await;

        assert!(store.member_tag(GUILD, 7).await.is_none());
        store.link_member(GUILD, 7, "#c0g20pr2").await.unwrap();
        store.link_member(GUILD, 7, "2PP").await.unwrap();
        assert_eq!(store.member_tag(GUILD, 7).await, Some(tag("2PP")));
        assert_eq!(store.tag_member(GUILD, &tag("2PP")).await, Some(7));
        assert!(store.tag_member(GUILD, &tag("C0G20PR2")).await.is_none());

        assert_eq!(store.unlink_member(GUILD, 7).await.unwrap(), Some(tag("2PP")));
        assert_eq!(store.unlink_member(GUILD, 7).await.unwrap(), None);

        assert!(matches!(
            store.link_member(GUILD, 7, "nope").await,
            Err(StoreError::InvalidKey(_))
        ));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_reset_scope() {
        let dir = temp_data_dir("reset");
        let store = open_store(&dir, MockFetcher::default()).await;

        store.register(GUILD, "2PP").await.unwrap();
        store.reset_scope(GUILD).await.unwrap();
        assert!(store.scopes().await.is_empty());

        let reopened = open_store(&dir, MockFetcher::default()).await;
        assert!(reopened.registered(GUILD).await.is_empty());

        let _ = std::fs::remove_dir_all(dir);
    }
}

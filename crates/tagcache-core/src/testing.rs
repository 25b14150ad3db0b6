//! Test doubles shared by the store and scheduler tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use crate::api::{ApiError, Fetcher};
use crate::models::Tag;

/// In-memory stand-in for the profile API.
///
/// Tags with a configured response succeed; every other tag fails with
/// [`ApiError::Timeout`]. Clones share their responses and call counter.
#[derive(Clone, Default)]
pub(crate) struct MockFetcher {
    responses: Arc<Mutex<HashMap<String, Value>>>,
    calls: Arc<AtomicUsize>,
}

impl MockFetcher {
    pub(crate) fn respond(&self, tag: &str, value: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(tag.to_string(), value);
    }

    pub(crate) fn fail(&self, tag: &str) {
        self.responses.lock().unwrap().remove(tag);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, tag: &Tag, _timeout: Duration) -> Result<Value, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.responses.lock().unwrap().get(tag.as_str()).cloned();
        response.ok_or(ApiError::Timeout)
    }
}

/// A fresh directory under the system temp dir.
pub(crate) fn temp_data_dir(label: &str) -> PathBuf {
    let suffix: u64 = rand::random();
    std::env::temp_dir().join(format!("tagcache-{}-{:016x}", label, suffix))
}

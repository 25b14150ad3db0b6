//! Background refresh of every registered tag.
//!
//! After a readiness signal the scheduler runs one full refresh, waits the
//! configured interval, and repeats. The interval is counted from the end
//! of a cycle, so cycles never overlap. Stopping is possible at any point:
//! a cycle already running finishes, no further cycle starts.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::Fetcher;
use crate::cache::EntityStore;

/// Default pause between refresh cycles.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct RefreshScheduler {
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    /// Spawn the refresh loop on the current Tokio runtime.
    pub fn start<F, R>(store: Arc<EntityStore<F>>, interval: Duration, ready: R) -> Self
    where
        F: Fetcher,
        R: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run(store, interval, ready, stop_rx));
        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Cancel the pending reschedule. Idempotent.
    pub fn stop(&self) {
        // send_replace never fails, even with the loop already gone
        self.stop_tx.send_replace(true);
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop and wait for the loop, including any in-flight cycle, to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                debug!(error = %e, "Refresh loop ended abnormally");
            }
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run<F, R>(store: Arc<EntityStore<F>>, interval: Duration, ready: R, mut stop_rx: watch::Receiver<bool>)
where
    F: Fetcher,
    R: Future<Output = ()> + Send + 'static,
{
    tokio::select! {
        _ = ready => {}
        _ = stopped(&mut stop_rx) => {
            debug!("Refresh loop stopped before first cycle");
            return;
        }
    }

    info!(interval_secs = interval.as_secs(), "Background refresh started");
    let mut cycle: u64 = 0;
    loop {
        if *stop_rx.borrow() {
            break;
        }

        cycle += 1;
        let summary = store.refresh_every_scope().await;
        debug!(cycle, refreshed = summary.refreshed, "Refresh cycle finished");

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = stopped(&mut stop_rx) => break,
        }
    }
    info!(cycles = cycle, "Background refresh stopped");
}

/// Resolves once a stop was requested or the scheduler was dropped.
async fn stopped(stop_rx: &mut watch::Receiver<bool>) {
    while !*stop_rx.borrow_and_update() {
        if stop_rx.changed().await.is_err() {
            return;
        }
    }
}

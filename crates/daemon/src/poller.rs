//! Per-resource refresh loops.
//!
//! Each resource gets its own task: fetch immediately, then once per interval. A failed
//! tick is logged and otherwise ignored; the cached value stays until a later tick succeeds.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{error, info, warn};
use weather_relay_core::{CacheStore, ResourceName, ResourceSpec};

use crate::upstream::{FetchError, Upstream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Stored { bytes: usize },
    Failed,
}

/// Runs a single tick for `spec`.
pub async fn poll_once(
    spec: &ResourceSpec,
    upstream: &dyn Upstream,
    store: &Arc<dyn CacheStore>,
    fetch_timeout: Duration,
) -> PollOutcome {
    let name = spec.name;
    let fetched = match timeout(fetch_timeout, upstream.fetch(&spec.endpoint)).await {
        Ok(res) => res,
        Err(_) => Err(FetchError::Timeout(fetch_timeout)),
    };

    let body = match fetched {
        Ok(body) => body,
        Err(e) => {
            warn!(resource = %name, error = %e, "fetch failed, keeping cached value");
            return PollOutcome::Failed;
        }
    };

    let bytes = body.len();
    let store = Arc::clone(store);
    // put() fsyncs; keep it off the async workers.
    match tokio::task::spawn_blocking(move || store.put(name.as_str(), body)).await {
        Ok(Ok(_)) => {
            info!(resource = %name, bytes, "{name}.json saved");
            PollOutcome::Stored { bytes }
        }
        Ok(Err(e)) => {
            error!(resource = %name, error = %e, "cache write failed");
            PollOutcome::Failed
        }
        Err(e) => {
            error!(resource = %name, error = %e, "cache write task aborted");
            PollOutcome::Failed
        }
    }
}

/// Handle to a running poller. Dropping it also stops the task.
pub struct PollerHandle {
    name: ResourceName,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn name(&self) -> ResourceName {
        self.name
    }

    /// Signals the task to stop; an in-flight fetch is abandoned.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Cancels and waits for the task to exit.
    pub async fn shutdown(self) {
        self.cancel();
        if let Err(e) = self.task.await {
            warn!(resource = %self.name, error = %e, "poller task ended abnormally");
        }
    }
}

/// Runs `spec` on its own interval until cancelled. The first tick fires immediately.
///
/// Missed ticks are delayed, not replayed: if the clock jumps past several deadlines
/// at once (a suspended host, or a single large `tokio::time::advance` in tests) the
/// resource refreshes once and its period restarts from that refresh.
pub fn spawn_poller(
    spec: ResourceSpec,
    upstream: Arc<dyn Upstream>,
    store: Arc<dyn CacheStore>,
    fetch_timeout: Duration,
) -> PollerHandle {
    let (cancel, mut cancelled) = watch::channel(false);
    let name = spec.name;
    let period = spec.interval.max(Duration::from_millis(1));

    let task = tokio::spawn(async move {
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(resource = %name, period_secs = period.as_secs(), "poller started");

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = cancelled.changed() => break,
            }
            tokio::select! {
                _ = poll_once(&spec, upstream.as_ref(), &store, fetch_timeout) => {}
                _ = cancelled.changed() => break,
            }
        }

        info!(resource = %name, "poller stopped");
    });

    PollerHandle { name, cancel, task }
}

/// Starts one independent poller per resource.
pub fn spawn_all(
    specs: Vec<ResourceSpec>,
    upstream: Arc<dyn Upstream>,
    store: Arc<dyn CacheStore>,
    fetch_timeout: Duration,
) -> Vec<PollerHandle> {
    specs
        .into_iter()
        .map(|spec| spawn_poller(spec, Arc::clone(&upstream), Arc::clone(&store), fetch_timeout))
        .collect()
}

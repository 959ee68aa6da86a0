//! The sliding-sync engine: long-poll loop and lifecycle surface.
//!
//! One engine instance runs at most one loop, with at most one request
//! in flight and at most one reconciliation pass executing at any time.
//! The loop suspends at exactly two points, awaiting the response and
//! awaiting a delay, and cancellation is observed at those points
//! rather than delivered as an interrupt. External callers get the start/stop/status
//! surface and read-only snapshots; nothing outside the loop mutates the
//! index map.

use crate::handoff::deliver_batch;
use crate::store::{RoomStore, StoreError};
use crate::transport::{SlidingSyncTransport, TransportError};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sync_core::{reconcile, Backoff, IndexMap, RangeTracker, SyncStatus, REQUEST_SPACING};
use sync_types::{IndexRange, ListRequest, Pos, RoomId, SessionId, SyncRequest};
use thiserror::Error;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

/// Errors observed by the loop and recorded for external inspection.
///
/// These never cross the loop boundary; the loop absorbs every failure
/// and retries. The last one is kept in a slot readable via
/// [`SlidingSyncEngine::last_error`].
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The transport failed a request.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The room store failed a batch.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Configuration for a sliding-sync engine.
///
/// The sticky fields (`sort`, `timeline_limit`, `required_state`,
/// `room_subscriptions`) are sent on the first request of each loop
/// invocation only; the server remembers them for the session.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// The index windows to track initially.
    pub ranges: Vec<IndexRange>,
    /// Sticky: sort order for the list.
    pub sort: Option<Vec<String>>,
    /// Sticky: maximum timeline events per room.
    pub timeline_limit: Option<u64>,
    /// Sticky: state event filters per room.
    pub required_state: Option<Vec<(String, String)>>,
    /// Sticky: explicit per-room subscriptions outside any window.
    pub room_subscriptions: Option<BTreeMap<RoomId, serde_json::Value>>,
}

impl EngineConfig {
    /// Create a configuration tracking the given windows.
    pub fn new(ranges: Vec<IndexRange>) -> Self {
        Self {
            ranges,
            sort: None,
            timeline_limit: None,
            required_state: None,
            room_subscriptions: None,
        }
    }

    /// Set the sticky sort order.
    pub fn with_sort(mut self, sort: Vec<String>) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Set the sticky timeline limit.
    pub fn with_timeline_limit(mut self, limit: u64) -> Self {
        self.timeline_limit = Some(limit);
        self
    }

    /// Set the sticky required-state filters.
    pub fn with_required_state(mut self, filters: Vec<(String, String)>) -> Self {
        self.required_state = Some(filters);
        self
    }

    /// Add a sticky room subscription.
    pub fn with_room_subscription(mut self, room_id: RoomId, params: serde_json::Value) -> Self {
        self.room_subscriptions
            .get_or_insert_with(BTreeMap::new)
            .insert(room_id, params);
        self
    }
}

/// Viewport and projection, mutated only inside a reconciliation pass.
#[derive(Debug)]
struct ViewState {
    tracker: RangeTracker,
    map: IndexMap,
    /// Server-side total size of each requested list, from the latest
    /// applied response.
    counts: Vec<u64>,
}

struct EngineInner<T, S> {
    transport: T,
    store: S,
    config: EngineConfig,
    view: Mutex<ViewState>,
    status_tx: watch::Sender<SyncStatus>,
    last_error: Mutex<Option<EngineError>>,
    /// Fired by `set_ranges` to abort an in-flight request.
    range_changed: Notify,
}

impl<T, S> EngineInner<T, S> {
    fn build_request(&self, session_id: &SessionId, first: bool) -> SyncRequest {
        let ranges = {
            let view = self.view.lock().expect("view lock poisoned");
            view.tracker.ranges().to_vec()
        };
        let list = if first {
            ListRequest {
                rooms: ranges,
                sort: self.config.sort.clone(),
                timeline_limit: self.config.timeline_limit,
                required_state: self.config.required_state.clone(),
            }
        } else {
            ListRequest::ranges_only(ranges)
        };
        SyncRequest {
            session_id: session_id.clone(),
            lists: vec![list],
            room_subscriptions: if first {
                self.config.room_subscriptions.clone()
            } else {
                None
            },
        }
    }

    fn record_error(&self, error: EngineError) {
        *self.last_error.lock().expect("error lock poisoned") = Some(error);
    }
}

/// A sliding-sync protocol engine.
///
/// Owns the loop task, the tracked ranges and the index→room projection.
/// Dropping the engine stops the loop.
pub struct SlidingSyncEngine<T, S> {
    inner: Arc<EngineInner<T, S>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<T, S> SlidingSyncEngine<T, S>
where
    T: SlidingSyncTransport + 'static,
    S: RoomStore + 'static,
{
    /// Create a new engine. The loop does not run until [`start`] is
    /// called.
    ///
    /// [`start`]: SlidingSyncEngine::start
    pub fn new(config: EngineConfig, transport: T, store: S) -> Self {
        let (status_tx, _) = watch::channel(SyncStatus::Stopped);
        let tracker = RangeTracker::with_ranges(config.ranges.clone());
        Self {
            inner: Arc::new(EngineInner {
                transport,
                store,
                config,
                view: Mutex::new(ViewState {
                    tracker,
                    map: IndexMap::new(),
                    counts: Vec::new(),
                }),
                status_tx,
                last_error: Mutex::new(None),
                range_changed: Notify::new(),
            }),
            task: Mutex::new(None),
        }
    }

    /// Launch the sync loop. No-op unless currently stopped.
    ///
    /// Clears the last-error slot, moves status to `InitialSync` and
    /// spawns the loop task. Must be called within a tokio runtime.
    pub fn start(&self) {
        let mut task = self.task.lock().expect("task lock poisoned");
        if self.status().is_running() {
            return;
        }
        *self.inner.last_error.lock().expect("error lock poisoned") = None;
        // send_replace updates the channel even when no receiver is
        // currently subscribed; plain send would not.
        self.inner.status_tx.send_replace(SyncStatus::InitialSync);

        let inner = Arc::clone(&self.inner);
        let status_rx = self.inner.status_tx.subscribe();
        *task = Some(tokio::spawn(run_loop(inner, status_rx)));
    }

    /// Stop the sync loop. No-op if already stopped.
    ///
    /// Moves status to `Stopped` and aborts the loop task, cancelling
    /// any in-flight request or backoff sleep at its suspension point.
    pub fn stop(&self) {
        let mut task = self.task.lock().expect("task lock poisoned");
        if self.status().is_stopped() {
            return;
        }
        self.inner.status_tx.send_replace(SyncStatus::Stopped);
        // Aborting (not just signalling) guarantees the old loop is gone
        // before a subsequent start() can spawn a new one.
        if let Some(handle) = task.take() {
            handle.abort();
        }
    }

    /// Replace the tracked index windows.
    ///
    /// Any in-flight request is aborted and immediately re-issued with
    /// the same position cursor; a range change is not a failure and
    /// never grows the backoff counter.
    pub fn set_ranges(&self, ranges: Vec<IndexRange>) {
        {
            let mut view = self.inner.view.lock().expect("view lock poisoned");
            view.tracker.set_ranges(ranges);
        }
        // notify_one stores a permit if no request has registered yet,
        // so a change landing between iterations is not lost; at worst
        // the next request is aborted and re-issued once with the
        // already-current ranges.
        self.inner.range_changed.notify_one();
    }

    /// The current lifecycle status.
    pub fn status(&self) -> SyncStatus {
        *self.inner.status_tx.borrow()
    }

    /// Subscribe to status changes. Safe from any concurrency context.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status_tx.subscribe()
    }

    /// The last failure the loop observed, if any. Cleared on `start()`.
    pub fn last_error(&self) -> Option<EngineError> {
        self.inner
            .last_error
            .lock()
            .expect("error lock poisoned")
            .clone()
    }

    /// A snapshot of the current index → room-id projection.
    pub fn index_map(&self) -> IndexMap {
        self.inner
            .view
            .lock()
            .expect("view lock poisoned")
            .map
            .clone()
    }

    /// Server-side total size of each requested list, from the latest
    /// applied response. Empty until the first success.
    pub fn list_counts(&self) -> Vec<u64> {
        self.inner
            .view
            .lock()
            .expect("view lock poisoned")
            .counts
            .clone()
    }

    /// The currently tracked index windows.
    pub fn ranges(&self) -> Vec<IndexRange> {
        self.inner
            .view
            .lock()
            .expect("view lock poisoned")
            .tracker
            .ranges()
            .to_vec()
    }
}

impl<T, S> Drop for SlidingSyncEngine<T, S> {
    fn drop(&mut self) {
        // The loop task holds its own Arc to the inner state; take it
        // down rather than leaving it polling forever.
        self.inner.status_tx.send_replace(SyncStatus::Stopped);
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}

/// One loop invocation: owns `pos`, the session id and the backoff
/// counter for its whole lifetime.
async fn run_loop<T, S>(inner: Arc<EngineInner<T, S>>, mut status_rx: watch::Receiver<SyncStatus>)
where
    T: SlidingSyncTransport + 'static,
    S: RoomStore + 'static,
{
    let session_id = SessionId::generate();
    let mut pos: Option<Pos> = None;
    let mut backoff = Backoff::new();
    let mut first_request = true;

    tracing::info!(session_id = %session_id, "sync loop started");

    loop {
        // Fixed spacing before every request, bounding the rate under
        // pathological fast-fail loops.
        if sleep_or_stop(REQUEST_SPACING, &mut status_rx).await {
            break;
        }

        let body = inner.build_request(&session_id, first_request);
        first_request = false;

        let outcome = tokio::select! {
            result = inner.transport.request(&body, pos) => result,
            _ = inner.range_changed.notified() => Err(TransportError::Cancelled),
            _ = until_stopped(&mut status_rx) => Err(TransportError::Cancelled),
        };

        match outcome {
            Ok(response) => {
                backoff.reset();
                let op_count = response.ops.len();

                // Reconcile against the last committed snapshot, but do
                // not install the result yet: an uncommitted batch is
                // redelivered, and its ops must replay against the old
                // view, not a half-acknowledged one.
                let (new_map, mut updates) = {
                    let view = inner.view.lock().expect("view lock poisoned");
                    let pass = reconcile(&view.map, &view.tracker, &response.ops);
                    (pass.map, pass.updates)
                };
                updates.extend(response.room_subscriptions.into_values());

                match deliver_batch(&inner.store, &updates).await {
                    Ok(()) => {
                        {
                            let mut view =
                                inner.view.lock().expect("view lock poisoned");
                            view.map = new_map;
                            view.counts = response.counts;
                        }
                        tracing::debug!(
                            pos = %response.pos,
                            ops = op_count,
                            updates = updates.len(),
                            "response applied"
                        );
                        // Only now is the position safely advanced: the
                        // batch is durably staged downstream.
                        pos = Some(response.pos);
                        // Single atomic read-modify-write; a concurrent
                        // stop() must never see its Stopped overwritten.
                        let became_syncing =
                            inner.status_tx.send_if_modified(|status| {
                                if *status == SyncStatus::InitialSync {
                                    *status = SyncStatus::Syncing;
                                    true
                                } else {
                                    false
                                }
                            });
                        if became_syncing {
                            tracing::info!("initial sync complete");
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "handoff failed, holding position");
                        inner.record_error(EngineError::Store(err));
                        backoff.record_failure();
                        if sleep_or_stop(backoff.delay(), &mut status_rx).await {
                            break;
                        }
                    }
                }
            }
            Err(err) if err.is_cancellation() => {
                if status_rx.borrow().is_stopped() {
                    break;
                }
                // Ranges changed mid-flight: re-issue immediately with
                // the same pos. Not a failure, no backoff accounting.
                tracing::debug!("request aborted, re-issuing");
            }
            Err(err) => {
                // Authorization failures currently take this generic
                // path too; a terminal variant would divert here.
                inner.record_error(EngineError::Transport(err.clone()));
                backoff.record_failure();
                tracing::warn!(
                    error = %err,
                    failures = backoff.failures(),
                    delay_secs = backoff.delay().as_secs(),
                    "request failed, backing off"
                );
                if sleep_or_stop(backoff.delay(), &mut status_rx).await {
                    break;
                }
            }
        }
    }

    tracing::info!("sync loop stopped");
}

/// Sleep for `delay`, returning early with `true` if the engine stops.
async fn sleep_or_stop(delay: Duration, status_rx: &mut watch::Receiver<SyncStatus>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = until_stopped(status_rx) => true,
    }
}

/// Resolve once the observable status reads `Stopped` (a dropped sender
/// counts as stopped).
async fn until_stopped(status_rx: &mut watch::Receiver<SyncStatus>) {
    let _ = status_rx.wait_for(|status| status.is_stopped()).await;
}

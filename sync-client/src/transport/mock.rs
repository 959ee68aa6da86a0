//! Mock transport for testing.
//!
//! Records every issued request and replays scripted outcomes. When no
//! outcome is queued a request parks, like a real long poll waiting for
//! the server, until one is queued or the caller drops the future.

use super::{SlidingSyncTransport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use sync_types::{Pos, SyncRequest, SyncResponse};
use tokio::sync::Notify;

/// Mock transport for testing.
///
/// Clones share state, so a test can keep one handle for scripting and
/// hand another to the engine.
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    queued: Arc<Notify>,
}

#[derive(Debug, Default)]
struct MockState {
    requests: Vec<(SyncRequest, Option<Pos>)>,
    outcomes: VecDeque<Result<SyncResponse, TransportError>>,
}

impl MockTransport {
    /// Create a new mock transport with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response for a future request.
    pub fn queue_response(&self, response: SyncResponse) {
        let mut state = self.state.lock().unwrap();
        state.outcomes.push_back(Ok(response));
        self.queued.notify_one();
    }

    /// Queue a failed outcome for a future request.
    pub fn queue_error(&self, error: TransportError) {
        let mut state = self.state.lock().unwrap();
        state.outcomes.push_back(Err(error));
        self.queued.notify_one();
    }

    /// Every request issued so far, with the `pos` each carried.
    pub fn requests(&self) -> Vec<(SyncRequest, Option<Pos>)> {
        let state = self.state.lock().unwrap();
        state.requests.clone()
    }

    /// Number of requests issued so far.
    pub fn request_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.requests.len()
    }

    /// The most recently issued request.
    pub fn last_request(&self) -> Option<(SyncRequest, Option<Pos>)> {
        let state = self.state.lock().unwrap();
        state.requests.last().cloned()
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            queued: Arc::clone(&self.queued),
        }
    }
}

#[async_trait]
impl SlidingSyncTransport for MockTransport {
    async fn request(
        &self,
        body: &SyncRequest,
        pos: Option<Pos>,
    ) -> Result<SyncResponse, TransportError> {
        {
            let mut state = self.state.lock().unwrap();
            state.requests.push((body.clone(), pos));
        }

        loop {
            // Register for the wakeup before checking the queue so a
            // concurrent queue_* call cannot slip between the two.
            let queued = self.queued.notified();
            {
                let mut state = self.state.lock().unwrap();
                if let Some(outcome) = state.outcomes.pop_front() {
                    return outcome;
                }
            }
            queued.await;
        }
    }
}

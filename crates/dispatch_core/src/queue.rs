//! Backlog of pending ride requests.
//!
//! A dispatch cycle follows the [`HeadOfLinePolicy`]: requests are tried from the
//! head, and the first one that fails to match goes back to the tail and ends the
//! cycle. Requests further back are not tried in that cycle even if they could
//! have matched. An unmatched request waits for the next cycle, which only runs
//! on the next submission or an explicit trigger.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::model::{ClientId, RideRequest};

/// Requeue-and-stop dispatch policy. Kept as a named type so call sites say which
/// policy they rely on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadOfLinePolicy;

/// Result of one dispatch cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Requests that matched and were removed from the queue.
    pub matched: usize,
    /// Whether the cycle stopped because a request did not match (and was requeued).
    pub stalled: bool,
}

#[derive(Debug, Default)]
pub struct RequestQueue {
    pending: Mutex<VecDeque<RideRequest>>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail. Never blocks on anything but the queue lock and never fails.
    pub fn submit(&self, request: RideRequest) {
        self.pending.lock().push_back(request);
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    pub fn contains_client(&self, client_id: ClientId) -> bool {
        self.pending
            .lock()
            .iter()
            .any(|request| request.client_id == client_id)
    }

    /// Copy of the backlog in queue order.
    pub fn snapshot(&self) -> Vec<RideRequest> {
        self.pending.lock().iter().copied().collect()
    }

    /// Run one dispatch cycle under [`HeadOfLinePolicy`].
    ///
    /// The queue lock is released while `match_fn` runs, so `match_fn` may take the
    /// fleet and ledger locks. Each request present when the cycle starts is tried
    /// at most once.
    pub fn drain_once<F>(&self, _policy: HeadOfLinePolicy, mut match_fn: F) -> DrainOutcome
    where
        F: FnMut(&RideRequest) -> bool,
    {
        let mut outcome = DrainOutcome::default();
        let budget = self.len();
        for _ in 0..budget {
            let Some(request) = self.pending.lock().pop_front() else {
                break;
            };
            if match_fn(&request) {
                outcome.matched += 1;
            } else {
                self.pending.lock().push_back(request);
                outcome.stalled = true;
                tracing::debug!(client = %request.client_id, "no driver available, request requeued");
                break;
            }
        }
        outcome
    }
}

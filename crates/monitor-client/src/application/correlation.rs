//! Request/response correlation for the data channel.
//!
//! Every `cmd`/`get` registers a one-shot responder under its request id.
//! When a frame carrying that id comes back, the newest matching entry is
//! removed and resolved.  Entries are also removed when their deadline
//! passes, when their [`PendingResponse`] is dropped, or when the channel
//! closes, so a request never resolves twice and never lingers.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use monitor_core::{is_empty_payload, RequestId};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::application::errors::RequestError;

type Outcome = Result<Value, RequestError>;

/// When a request gives up, fixed at registration.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    after: Duration,
}

struct Entry {
    request_id: RequestId,
    /// Distinguishes two registrations of the same id after wraparound.
    ticket: u64,
    deadline: Option<Deadline>,
    responder: oneshot::Sender<Outcome>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| d.at <= now)
    }
}

/// Ordered table of requests awaiting a response.
#[derive(Default)]
pub struct PendingRequests {
    entries: Vec<Entry>,
    next_ticket: u64,
}

impl PendingRequests {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, request_id: RequestId) -> bool {
        self.entries.iter().any(|e| e.request_id == request_id)
    }

    fn register(
        &mut self,
        request_id: RequestId,
        deadline: Option<Deadline>,
    ) -> (u64, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.wrapping_add(1);
        self.entries.push(Entry {
            request_id,
            ticket,
            deadline,
            responder: tx,
        });
        (ticket, rx)
    }

    /// Remove the newest entry for `request_id` and resolve it with `outcome`.
    ///
    /// Returns `false` when nothing was waiting on that id.
    pub fn complete(&mut self, request_id: RequestId, outcome: Outcome) -> bool {
        let Some(index) = self
            .entries
            .iter()
            .rposition(|e| e.request_id == request_id)
        else {
            return false;
        };
        let entry = self.entries.remove(index);
        // The caller may have dropped its future; that is not an error.
        let _ = entry.responder.send(outcome);
        true
    }

    fn expire(&mut self, request_id: RequestId, ticket: u64) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.request_id == request_id && e.ticket == ticket));
        before != self.entries.len()
    }

    /// Reject every entry whose deadline is at or before `now` with
    /// [`RequestError::TimedOut`].  Returns how many were removed.
    fn expire_overdue(&mut self, now: Instant) -> usize {
        if !self.entries.iter().any(|e| e.is_expired(now)) {
            return 0;
        }
        let (overdue, live): (Vec<Entry>, Vec<Entry>) =
            self.entries.drain(..).partition(|e| e.is_expired(now));
        self.entries = live;
        let expired = overdue.len();
        for entry in overdue {
            let after = entry.deadline.map(|d| d.after).unwrap_or_default();
            let _ = entry.responder.send(Err(RequestError::TimedOut {
                request_id: entry.request_id,
                after,
            }));
        }
        expired
    }

    /// Reject and remove every entry.  Returns how many were rejected.
    pub fn reject_all(&mut self, reason: impl Fn() -> RequestError) -> usize {
        let rejected = self.entries.len();
        for entry in self.entries.drain(..) {
            let _ = entry.responder.send(Err(reason()));
        }
        rejected
    }
}

/// Shared handle to one session's [`PendingRequests`].
///
/// The session owns the strong reference; outstanding [`PendingResponse`]s
/// hold weak ones so an abandoned or timed-out request can remove its own
/// entry.
#[derive(Clone, Default)]
pub struct PendingTable {
    inner: Arc<Mutex<PendingRequests>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PendingRequests> {
        self.inner.lock().expect("lock poisoned")
    }

    /// Number of requests still within their deadline.
    pub fn len(&self) -> usize {
        let mut pending = self.lock();
        pending.expire_overdue(Instant::now());
        pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a responder for `request_id`.
    ///
    /// # Errors
    ///
    /// Same as [`register_next`](Self::register_next).
    pub fn register(
        &self,
        request_id: RequestId,
        limit: usize,
        timeout: Option<Duration>,
    ) -> Result<PendingResponse, RequestError> {
        self.register_next(|| request_id, limit, timeout)
    }

    /// Register a responder under an id drawn from `next_id`.
    ///
    /// Overdue entries are timed out first, and `next_id` is only called once
    /// there is room, so a call rejected for capacity uses up no id.  The
    /// request's deadline starts now, whether or not the response is ever
    /// awaited.
    ///
    /// # Errors
    ///
    /// - [`RequestError::TooManyPending`] when `limit` entries are in flight.
    /// - [`RequestError::RequestIdInUse`] when the drawn id is still awaiting
    ///   a reply.  That id stays consumed, so the next call moves past it.
    pub fn register_next(
        &self,
        next_id: impl FnOnce() -> RequestId,
        limit: usize,
        timeout: Option<Duration>,
    ) -> Result<PendingResponse, RequestError> {
        let now = Instant::now();
        let mut pending = self.lock();
        pending.expire_overdue(now);
        if pending.len() >= limit {
            return Err(RequestError::TooManyPending { limit });
        }
        let request_id = next_id();
        if pending.contains(request_id) {
            return Err(RequestError::RequestIdInUse { request_id });
        }
        let deadline = timeout.map(|after| Deadline {
            at: now + after,
            after,
        });
        let (ticket, rx) = pending.register(request_id, deadline);
        Ok(PendingResponse {
            request_id,
            ticket,
            rx,
            deadline,
            table: Arc::downgrade(&self.inner),
        })
    }

    /// Resolve the newest request for `request_id` with a device payload.
    ///
    /// An empty object rejects with [`RequestError::EmptyPayload`].
    pub fn resolve(&self, request_id: RequestId, payload: Value) -> bool {
        let outcome = if is_empty_payload(&payload) {
            Err(RequestError::EmptyPayload { request_id })
        } else {
            Ok(payload)
        };
        self.lock().complete(request_id, outcome)
    }

    pub fn reject(&self, request_id: RequestId, err: RequestError) -> bool {
        self.lock().complete(request_id, Err(err))
    }

    pub fn reject_all(&self, reason: impl Fn() -> RequestError) -> usize {
        self.lock().reject_all(reason)
    }
}

/// The eventual result of a `cmd` or `get`.
///
/// Await it directly (`client.get("status")?.await`) or call
/// [`wait`](Self::wait).  Dropping it abandons the request and frees its
/// slot in the pending table; a late response is then reported as unmatched.
#[must_use = "dropping a PendingResponse abandons the request"]
pub struct PendingResponse {
    request_id: RequestId,
    ticket: u64,
    rx: oneshot::Receiver<Outcome>,
    deadline: Option<Deadline>,
    table: Weak<Mutex<PendingRequests>>,
}

impl PendingResponse {
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub async fn wait(mut self) -> Result<Value, RequestError> {
        let received = match self.deadline {
            None => (&mut self.rx).await,
            Some(deadline) => match tokio::time::timeout_at(deadline.at, &mut self.rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.forget();
                    // A response may have landed between the deadline and the removal.
                    return match self.rx.try_recv() {
                        Ok(outcome) => outcome,
                        Err(_) => Err(RequestError::TimedOut {
                            request_id: self.request_id,
                            after: deadline.after,
                        }),
                    };
                }
            },
        };
        // Responder dropped without an answer: the session went away.
        received.unwrap_or(Err(RequestError::ConnectionClosed))
    }

    /// Remove this request's own entry if it is still in the table.
    fn forget(&self) {
        if let Some(table) = self.table.upgrade() {
            table
                .lock()
                .expect("lock poisoned")
                .expire(self.request_id, self.ticket);
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        self.forget();
    }
}

impl IntoFuture for PendingResponse {
    type Output = Result<Value, RequestError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

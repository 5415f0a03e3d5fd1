//! Request identifier counter for data-channel correlation.
//!
//! Every `cmd` and `get` frame carries a `request_id`.  The device echoes it
//! back in its response so the client can hand the payload to the caller that
//! asked for it.  Identifiers only need to be unique among the requests that
//! are in flight at the same time, so the counter is bounded and wraps.
//!
//! # Numbering
//!
//! The counter is *pre-incremented*: a fresh counter hands out `1` first.
//! After [`MAX_REQUEST_ID`] the next identifier is `0`.
//!
//! ```text
//! new() → 1, 2, 3, ... , 99_999_999, 0, 1, ...
//! ```

/// The identifier type carried in the `request_id` field.
pub type RequestId = u32;

/// Largest identifier handed out before wrapping back to 0.
pub const MAX_REQUEST_ID: RequestId = 99_999_999;

/// Bounded, wrapping counter in `[0, MAX_REQUEST_ID]`.
///
/// The counter is owned by exactly one session and mutated under that
/// session's lock, so it does not need to be atomic.
///
/// # Examples
///
/// ```rust
/// use monitor_core::protocol::RequestIdCounter;
///
/// let mut ids = RequestIdCounter::new();
/// assert_eq!(ids.next_id(), 1);
/// assert_eq!(ids.next_id(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestIdCounter {
    last: RequestId,
}

impl RequestIdCounter {
    /// Creates a counter whose first identifier will be `1`.
    pub fn new() -> Self {
        Self { last: 0 }
    }

    /// Creates a counter positioned at `last`; the next identifier is the
    /// one after it.
    ///
    /// Values above [`MAX_REQUEST_ID`] are clamped so the counter stays in
    /// range.
    pub fn starting_after(last: RequestId) -> Self {
        Self {
            last: last.min(MAX_REQUEST_ID),
        }
    }

    /// Advances the counter and returns the new identifier.
    pub fn next_id(&mut self) -> RequestId {
        self.last = if self.last >= MAX_REQUEST_ID {
            0
        } else {
            self.last + 1
        };
        self.last
    }

    /// Returns the most recently issued identifier without advancing.
    pub fn last(&self) -> RequestId {
        self.last
    }
}

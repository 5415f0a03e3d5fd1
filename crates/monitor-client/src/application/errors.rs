//! Error types for the monitor client.
//!
//! Each failure class has its own enum so callers can tell a rejected request
//! apart from a failed negotiation:
//!
//! | Type               | Raised by                                  | Surfaced as                      |
//! |--------------------|--------------------------------------------|----------------------------------|
//! | [`RequestError`]   | `cmd` / `get` / `notify`                   | the call's `Result`              |
//! | [`TransportError`] | the peer transport                         | inside [`NegotiationError`]      |
//! | [`SignalingError`] | the `POST /offer` exchange                 | inside [`NegotiationError`]      |
//! | [`ClientError`]    | asynchronous session work                  | `MonitorEvent::Error`            |

use std::time::Duration;

use monitor_core::{FrameError, RequestId};
use thiserror::Error;

/// Failure of a single correlated request.
///
/// Only the request that raised it is affected; the session carries on.
#[derive(Debug, Error)]
pub enum RequestError {
    /// No open data channel; nothing was sent or registered.
    #[error("data channel is closed")]
    ChannelClosed,

    /// The device answered with `{}`, which it uses for "no data".
    #[error("payload was empty for request {request_id}")]
    EmptyPayload { request_id: RequestId },

    /// The response carried no usable payload.
    #[error("response to request {request_id} has no payload")]
    MalformedResponse { request_id: RequestId },

    /// The channel or session closed before the response arrived.
    #[error("connection closed before a response arrived")]
    ConnectionClosed,

    /// No response within the configured request timeout.
    #[error("request {request_id} timed out after {after:?}")]
    TimedOut {
        request_id: RequestId,
        after: Duration,
    },

    /// The pending-request table is full.
    #[error("too many requests in flight (limit {limit})")]
    TooManyPending { limit: usize },

    /// The counter wrapped onto an identifier that is still awaiting a reply.
    #[error("request id {request_id} is still in flight")]
    RequestIdInUse { request_id: RequestId },

    /// The data channel refused the frame.
    #[error("failed to send request {request_id}: {reason}")]
    SendFailed {
        request_id: RequestId,
        reason: String,
    },

    /// The frame could not be serialised.
    #[error(transparent)]
    Encode(FrameError),
}

/// Failure reported by a peer transport implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The underlying WebRTC stack rejected an operation.
    #[error("{operation} failed: {message}")]
    Peer {
        operation: &'static str,
        message: String,
    },

    /// A send was attempted before the data channel was created.
    #[error("no data channel has been created")]
    NoDataChannel,

    /// The transport has been closed.
    #[error("transport is closed")]
    Closed,

    /// A session description could not be converted for the WebRTC stack.
    #[error("invalid session description: {0}")]
    InvalidDescription(String),
}

impl TransportError {
    pub fn peer(operation: &'static str, err: impl std::fmt::Display) -> Self {
        TransportError::Peer {
            operation,
            message: err.to_string(),
        }
    }
}

/// Failure of the HTTP offer/answer exchange.
#[derive(Debug, Error)]
pub enum SignalingError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request could not be sent or the body could not be read.
    #[error("signaling request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered with a non-success status.
    #[error("signaling endpoint {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The body is not a `{sdp, type}` document.
    #[error("signaling answer is not a valid session description: {0}")]
    InvalidAnswer(#[source] serde_json::Error),
}

/// Failure of the negotiation sequence.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Signaling(#[from] SignalingError),

    /// The transport reported no local description after it was applied.
    #[error("local description is missing after it was applied")]
    MissingLocalDescription,

    /// The session was disconnected or replaced while negotiating.
    #[error("session was replaced while negotiating")]
    Superseded,
}

/// Errors delivered asynchronously on the event stream.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Negotiation failed; the session has been torn down.
    #[error("negotiation failed: {0}")]
    Negotiation(#[from] NegotiationError),

    /// A response arrived for an identifier nobody is waiting on.
    #[error("response with id {request_id} does not match any pending request: {frame}")]
    UnmatchedResponse { request_id: RequestId, frame: String },

    /// An inbound frame could not be decoded.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] FrameError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_payload_message_names_request() {
        let err = RequestError::EmptyPayload { request_id: 12 };
        assert_eq!(err.to_string(), "payload was empty for request 12");
    }

    #[test]
    fn test_transport_peer_helper_records_operation() {
        let err = TransportError::peer("create_offer", "boom");
        assert_eq!(err.to_string(), "create_offer failed: boom");
    }

    #[test]
    fn test_negotiation_error_wraps_transport_error_transparently() {
        let err: NegotiationError = TransportError::Closed.into();
        assert_eq!(err.to_string(), "transport is closed");
    }

    #[test]
    fn test_client_error_from_negotiation() {
        let err: ClientError = NegotiationError::MissingLocalDescription.into();
        assert!(matches!(err, ClientError::Negotiation(_)));
    }
}

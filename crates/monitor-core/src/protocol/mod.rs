//! Data-channel wire protocol and SDP handling.
//!
//! - [`messages`] – JSON frame envelopes and the tagged decode of inbound frames.
//! - [`request_id`] – the bounded, wrapping request identifier counter.
//! - [`sdp`] – the codec-preference rewrite applied to local offers.

pub mod messages;
pub mod request_id;
pub mod sdp;

pub use messages::{is_empty_payload, FrameError, InboundFrame, OutboundFrame};
pub use request_id::{RequestId, RequestIdCounter, MAX_REQUEST_ID};
pub use sdp::prefer_codec;

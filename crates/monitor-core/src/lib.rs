//! # monitor-core
//!
//! Shared library for the ground-station monitor client containing the
//! data-channel wire protocol, the connection-status model and the SDP
//! codec-preference rewrite.
//!
//! It has zero dependencies on async runtimes, sockets or WebRTC stacks, so
//! everything here can be unit tested with plain `#[test]` functions.
//!
//! # Architecture overview
//!
//! The monitor client talks to the satellite's monitor device over a WebRTC
//! peer connection.  Video arrives as a media track; commands, queries and
//! telemetry travel as JSON text frames on a data channel.
//!
//! - **`domain`** – Connection status, the low-level signaling/ICE states it
//!   is derived from, and the session descriptions exchanged with the
//!   signaling endpoint.
//!
//! - **`protocol`** – How frames travel over the data channel: the outbound
//!   `cmd`/`get` envelopes, the inbound response/unsolicited decoding, the
//!   request-id counter, and the SDP text transform applied to local offers.

pub mod domain;
pub mod protocol;

pub use domain::description::{SdpType, SdpTypeError, SessionDescription};
pub use domain::status::{
    project_status, ConnectionStatus, IceConnectionState, IceGatheringState, NotifyPolicy,
    SignalSnapshot, SignalingState, StatusProjector, StatusRule,
};
pub use protocol::messages::{is_empty_payload, FrameError, InboundFrame, OutboundFrame};
pub use protocol::request_id::{RequestId, RequestIdCounter, MAX_REQUEST_ID};
pub use protocol::sdp::prefer_codec;

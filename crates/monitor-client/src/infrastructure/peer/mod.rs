//! Peer transport implementations.
//!
//! - [`webrtc`] – the production transport over webrtc-rs.
//! - [`mock`]   – a scripted in-memory transport for tests and demos.

pub mod mock;
pub mod webrtc;

pub use self::mock::{MockPeerTransport, MockScript, MockTransportFactory};
pub use self::webrtc::{WebRtcTransport, WebRtcTransportFactory};

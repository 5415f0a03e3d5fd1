//! Domain types for the monitor client.
//!
//! The domain layer contains pure types with no dependencies on I/O,
//! networking or the WebRTC implementation in use.
//!
//! - [`status`] – the coarse [`status::ConnectionStatus`] and the projector
//!   that derives it from signaling and ICE states.
//! - [`description`] – the SDP offer/answer documents exchanged with the
//!   signaling endpoint.

pub mod description;
pub mod status;

//! Application layer: orchestrates one monitor session.
//!
//! # Sub-modules
//!
//! - **`client`**      – [`MonitorClient`]: connect/disconnect, the event
//!   pump and the data-channel writer.
//! - **`negotiation`** – The offerer-side SDP exchange.
//! - **`correlation`** – Matches data-channel responses to pending requests.
//! - **`ports`**       – Traits the infrastructure layer implements.
//! - **`events`**, **`errors`** – What the client reports back.

pub mod client;
pub mod correlation;
pub mod errors;
pub mod events;
pub mod negotiation;
pub mod ports;

pub use client::MonitorClient;
pub use correlation::{PendingResponse, PendingTable};
pub use errors::{ClientError, NegotiationError, RequestError, SignalingError, TransportError};
pub use events::{MonitorEvent, RemoteStream};
pub use ports::{
    MediaHandle, PeerEvent, PeerEventSender, PeerTransport, PeerTransportFactory, RemoteTrack,
    SignalingClient, TrackKind,
};

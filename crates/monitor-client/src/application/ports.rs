//! Seams between the client logic and the outside world.
//!
//! The client never talks to a WebRTC stack or an HTTP client directly.  It
//! drives a [`PeerTransport`] and a [`SignalingClient`], and it consumes the
//! transport's state changes as [`PeerEvent`]s on a channel.  Production code
//! plugs in webrtc-rs and reqwest; tests plug in scripted doubles.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use monitor_core::{IceConnectionState, IceGatheringState, SessionDescription, SignalingState};
use tokio::sync::mpsc;

use crate::application::errors::{SignalingError, TransportError};
use crate::domain::{ClientConfig, SignalingEndpoint};

/// Opaque media object attached to a received track.
///
/// The webrtc-rs transport stores its `Arc<TrackRemote>` here so callers can
/// downcast and read RTP without this crate depending on the media type.
pub type MediaHandle = Arc<dyn Any + Send + Sync>;

/// Sender half the transport pushes its events into.
pub type PeerEventSender = mpsc::UnboundedSender<PeerEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// A remote track announced by the transport.
#[derive(Debug, Clone)]
pub struct RemoteTrack {
    pub kind: TrackKind,
    pub stream_id: String,
    pub track_id: String,
    pub media: Option<MediaHandle>,
}

/// Everything a transport can report about itself.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    IceGatheringStateChanged(IceGatheringState),
    IceConnectionStateChanged(IceConnectionState),
    SignalingStateChanged(SignalingState),
    TrackReceived(RemoteTrack),
    DataChannelOpen,
    DataChannelClose,
    /// A text frame arrived on the data channel.
    DataChannelMessage(String),
}

/// One offerer-side peer connection with a single data channel.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Add a receive-only video transceiver.
    async fn add_video_receiver(&self) -> Result<(), TransportError>;

    /// Create the (single) data channel with the given label.
    async fn create_data_channel(&self, label: &str) -> Result<(), TransportError>;

    async fn create_offer(&self) -> Result<SessionDescription, TransportError>;

    async fn set_local_description(&self, desc: SessionDescription)
        -> Result<(), TransportError>;

    /// The local description as it currently stands, candidates included.
    async fn local_description(&self) -> Option<SessionDescription>;

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), TransportError>;

    fn ice_gathering_state(&self) -> IceGatheringState;

    /// Send one text frame on the data channel.
    async fn send_text(&self, text: String) -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}

/// Builds a fresh transport for every session.
#[async_trait]
pub trait PeerTransportFactory: Send + Sync {
    /// Create a transport that reports its state changes through `events`.
    async fn create(
        &self,
        config: &ClientConfig,
        events: PeerEventSender,
    ) -> Result<Arc<dyn PeerTransport>, TransportError>;
}

/// Exchanges the local offer for the device's answer.
#[async_trait]
pub trait SignalingClient: Send + Sync {
    async fn exchange(
        &self,
        endpoint: &SignalingEndpoint,
        offer: &SessionDescription,
    ) -> Result<SessionDescription, SignalingError>;
}

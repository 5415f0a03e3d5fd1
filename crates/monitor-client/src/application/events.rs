//! Notifications delivered to the embedding application.

use std::any::Any;
use std::sync::Arc;

use monitor_core::ConnectionStatus;
use serde_json::Value;

use crate::application::errors::ClientError;
use crate::application::ports::MediaHandle;

/// A remote video stream, announced once per stream id per session.
#[derive(Debug, Clone)]
pub struct RemoteStream {
    pub stream_id: String,
    pub track_id: String,
    pub media: Option<MediaHandle>,
}

impl RemoteStream {
    /// Recover the transport's concrete media object.
    ///
    /// With the webrtc-rs transport `T` is `webrtc::track::track_remote::TrackRemote`.
    pub fn media<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.media.clone()?.downcast::<T>().ok()
    }
}

/// Everything the client reports asynchronously.
#[derive(Debug)]
pub enum MonitorEvent {
    /// The UI-facing connection status changed (or was re-announced).
    StatusChanged(ConnectionStatus),
    VideoReceived(RemoteStream),
    /// An inbound frame that is not a response to a pending request.
    MessageReceived(Value),
    DataChannelOpen,
    DataChannelClose,
    Error(ClientError),
}

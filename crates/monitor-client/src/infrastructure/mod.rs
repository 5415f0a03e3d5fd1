//! Infrastructure layer: concrete implementations of the application ports.

pub mod config_file;
pub mod peer;
pub mod signaling;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::application::{MonitorClient, MonitorEvent, SignalingError};
use crate::domain::ClientConfig;

pub use peer::WebRtcTransportFactory;
pub use signaling::HttpSignalingClient;

/// Build a client wired to webrtc-rs and HTTP signaling.
///
/// # Errors
///
/// Returns [`SignalingError::Client`] if the HTTP client cannot be built.
pub fn webrtc_client(
    config: ClientConfig,
) -> Result<(MonitorClient, mpsc::UnboundedReceiver<MonitorEvent>), SignalingError> {
    let signaling = HttpSignalingClient::new(config.signaling_timeout)?;
    Ok(MonitorClient::new(
        config,
        Arc::new(WebRtcTransportFactory),
        Arc::new(signaling),
    ))
}

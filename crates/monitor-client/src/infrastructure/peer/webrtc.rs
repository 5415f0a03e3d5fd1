//! [`PeerTransport`] over the native webrtc-rs stack.
//!
//! Each transport owns one `RTCPeerConnection` with the default codecs and
//! interceptors registered.  State-change callbacks are translated into
//! [`PeerEvent`]s and pushed onto the session's event channel; they never
//! block and never touch client state directly.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use monitor_core::{
    IceConnectionState, IceGatheringState, SdpType, SessionDescription, SignalingState,
};
use tracing::{debug, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_gathering_state::RTCIceGatheringState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit};
use webrtc::track::track_remote::TrackRemote;

use crate::application::{
    MediaHandle, PeerEvent, PeerEventSender, PeerTransport, PeerTransportFactory, RemoteTrack,
    TrackKind, TransportError,
};
use crate::domain::ClientConfig;

/// Creates one [`WebRtcTransport`] per session.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebRtcTransportFactory;

#[async_trait]
impl PeerTransportFactory for WebRtcTransportFactory {
    async fn create(
        &self,
        config: &ClientConfig,
        events: PeerEventSender,
    ) -> Result<Arc<dyn PeerTransport>, TransportError> {
        let transport = WebRtcTransport::new(config, events).await?;
        Ok(Arc::new(transport))
    }
}

pub struct WebRtcTransport {
    pc: Arc<RTCPeerConnection>,
    data_channel: Mutex<Option<Arc<RTCDataChannel>>>,
    events: PeerEventSender,
}

impl WebRtcTransport {
    /// Build a peer connection and wire its callbacks to `events`.
    pub async fn new(config: &ClientConfig, events: PeerEventSender) -> Result<Self, TransportError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| TransportError::peer("register_default_codecs", e))?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| TransportError::peer("register_default_interceptors", e))?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers(&config.ice_servers),
            ..Default::default()
        };
        let pc = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .map_err(|e| TransportError::peer("new_peer_connection", e))?,
        );

        install_state_handlers(&pc, &events);
        Ok(Self {
            pc,
            data_channel: Mutex::new(None),
            events,
        })
    }

    fn install_channel_handlers(&self, dc: &Arc<RTCDataChannel>) {
        let tx = self.events.clone();
        dc.on_open(Box::new(move || {
            let _ = tx.send(PeerEvent::DataChannelOpen);
            Box::pin(async {})
        }));

        let tx = self.events.clone();
        dc.on_close(Box::new(move || {
            let _ = tx.send(PeerEvent::DataChannelClose);
            Box::pin(async {})
        }));

        let tx = self.events.clone();
        dc.on_message(Box::new(move |msg: DataChannelMessage| {
            match String::from_utf8(msg.data.to_vec()) {
                Ok(text) => {
                    let _ = tx.send(PeerEvent::DataChannelMessage(text));
                }
                Err(e) => warn!("dropping non-UTF-8 data channel frame: {e}"),
            }
            Box::pin(async {})
        }));
    }
}

fn ice_servers(urls: &[String]) -> Vec<RTCIceServer> {
    if urls.is_empty() {
        return Vec::new();
    }
    vec![RTCIceServer {
        urls: urls.to_vec(),
        ..Default::default()
    }]
}

fn install_state_handlers(pc: &RTCPeerConnection, events: &PeerEventSender) {
    let tx = events.clone();
    pc.on_ice_gathering_state_change(Box::new(move |state: RTCIceGathererState| {
        if let Some(state) = map_gatherer_state(state) {
            let _ = tx.send(PeerEvent::IceGatheringStateChanged(state));
        }
        Box::pin(async {})
    }));

    let tx = events.clone();
    pc.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
        if let Some(state) = map_ice_connection_state(state) {
            let _ = tx.send(PeerEvent::IceConnectionStateChanged(state));
        }
        Box::pin(async {})
    }));

    let tx = events.clone();
    pc.on_signaling_state_change(Box::new(move |state: RTCSignalingState| {
        if let Some(state) = map_signaling_state(state) {
            let _ = tx.send(PeerEvent::SignalingStateChanged(state));
        }
        Box::pin(async {})
    }));

    let tx = events.clone();
    pc.on_track(Box::new(
        move |track: Arc<TrackRemote>, _: Arc<RTCRtpReceiver>, _: Arc<RTCRtpTransceiver>| {
            let kind = match track.kind() {
                RTPCodecType::Video => Some(TrackKind::Video),
                RTPCodecType::Audio => Some(TrackKind::Audio),
                _ => None,
            };
            if let Some(kind) = kind {
                let remote = RemoteTrack {
                    kind,
                    stream_id: track.stream_id(),
                    track_id: track.id(),
                    media: Some(track as MediaHandle),
                };
                let _ = tx.send(PeerEvent::TrackReceived(remote));
            }
            Box::pin(async {})
        },
    ));
}

// ── State mapping ─────────────────────────────────────────────────────────────

fn map_gatherer_state(state: RTCIceGathererState) -> Option<IceGatheringState> {
    match state {
        RTCIceGathererState::New => Some(IceGatheringState::New),
        RTCIceGathererState::Gathering => Some(IceGatheringState::Gathering),
        RTCIceGathererState::Complete => Some(IceGatheringState::Complete),
        _ => None,
    }
}

fn map_gathering_state(state: RTCIceGatheringState) -> IceGatheringState {
    match state {
        RTCIceGatheringState::Gathering => IceGatheringState::Gathering,
        RTCIceGatheringState::Complete => IceGatheringState::Complete,
        _ => IceGatheringState::New,
    }
}

fn map_ice_connection_state(state: RTCIceConnectionState) -> Option<IceConnectionState> {
    match state {
        RTCIceConnectionState::New => Some(IceConnectionState::New),
        RTCIceConnectionState::Checking => Some(IceConnectionState::Checking),
        RTCIceConnectionState::Connected => Some(IceConnectionState::Connected),
        RTCIceConnectionState::Completed => Some(IceConnectionState::Completed),
        RTCIceConnectionState::Disconnected => Some(IceConnectionState::Disconnected),
        RTCIceConnectionState::Failed => Some(IceConnectionState::Failed),
        RTCIceConnectionState::Closed => Some(IceConnectionState::Closed),
        _ => None,
    }
}

fn map_signaling_state(state: RTCSignalingState) -> Option<SignalingState> {
    match state {
        RTCSignalingState::Stable => Some(SignalingState::Stable),
        RTCSignalingState::HaveLocalOffer => Some(SignalingState::HaveLocalOffer),
        RTCSignalingState::HaveRemoteOffer => Some(SignalingState::HaveRemoteOffer),
        RTCSignalingState::HaveLocalPranswer => Some(SignalingState::HaveLocalPranswer),
        RTCSignalingState::HaveRemotePranswer => Some(SignalingState::HaveRemotePranswer),
        RTCSignalingState::Closed => Some(SignalingState::Closed),
        _ => None,
    }
}

fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription, TransportError> {
    let converted = match desc.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp),
        SdpType::Pranswer => RTCSessionDescription::pranswer(desc.sdp),
        SdpType::Rollback => {
            return Err(TransportError::InvalidDescription(
                "rollback is not supported".to_string(),
            ))
        }
    };
    converted.map_err(|e| TransportError::InvalidDescription(e.to_string()))
}

fn from_rtc(desc: RTCSessionDescription) -> Option<SessionDescription> {
    let sdp_type = match desc.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        _ => return None,
    };
    Some(SessionDescription::new(sdp_type, desc.sdp))
}

#[async_trait]
impl PeerTransport for WebRtcTransport {
    async fn add_video_receiver(&self) -> Result<(), TransportError> {
        self.pc
            .add_transceiver_from_kind(
                RTPCodecType::Video,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: vec![],
                }),
            )
            .await
            .map(|_| ())
            .map_err(|e| TransportError::peer("add_transceiver_from_kind", e))
    }

    async fn create_data_channel(&self, label: &str) -> Result<(), TransportError> {
        let dc = self
            .pc
            .create_data_channel(label, None)
            .await
            .map_err(|e| TransportError::peer("create_data_channel", e))?;
        self.install_channel_handlers(&dc);
        debug!("created data channel {label:?}");
        *self.data_channel.lock().expect("lock poisoned") = Some(dc);
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| TransportError::peer("create_offer", e))?;
        from_rtc(offer)
            .ok_or_else(|| TransportError::InvalidDescription("offer has no type".to_string()))
    }

    async fn set_local_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), TransportError> {
        self.pc
            .set_local_description(to_rtc(desc)?)
            .await
            .map_err(|e| TransportError::peer("set_local_description", e))
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.pc.local_description().await.and_then(from_rtc)
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), TransportError> {
        self.pc
            .set_remote_description(to_rtc(desc)?)
            .await
            .map_err(|e| TransportError::peer("set_remote_description", e))
    }

    fn ice_gathering_state(&self) -> IceGatheringState {
        map_gathering_state(self.pc.ice_gathering_state())
    }

    async fn send_text(&self, text: String) -> Result<(), TransportError> {
        let dc = self
            .data_channel
            .lock()
            .expect("lock poisoned")
            .clone()
            .ok_or(TransportError::NoDataChannel)?;
        dc.send_text(text)
            .await
            .map(|_| ())
            .map_err(|e| TransportError::peer("send_text", e))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.pc
            .close()
            .await
            .map_err(|e| TransportError::peer("close", e))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_core::prefer_codec;
    use tokio::sync::mpsc;

    #[test]
    fn test_gatherer_closed_is_not_reported() {
        assert_eq!(map_gatherer_state(RTCIceGathererState::Closed), None);
        assert_eq!(
            map_gatherer_state(RTCIceGathererState::Complete),
            Some(IceGatheringState::Complete)
        );
    }

    #[test]
    fn test_unspecified_states_are_not_reported() {
        assert_eq!(map_ice_connection_state(RTCIceConnectionState::Unspecified), None);
        assert_eq!(map_signaling_state(RTCSignalingState::Unspecified), None);
    }

    #[test]
    fn test_signaling_states_map_one_to_one() {
        assert_eq!(
            map_signaling_state(RTCSignalingState::HaveLocalOffer),
            Some(SignalingState::HaveLocalOffer)
        );
        assert_eq!(
            map_signaling_state(RTCSignalingState::Closed),
            Some(SignalingState::Closed)
        );
    }

    #[test]
    fn test_rollback_cannot_be_applied() {
        let err = to_rtc(SessionDescription::new(SdpType::Rollback, "")).unwrap_err();
        assert!(matches!(err, TransportError::InvalidDescription(_)));
    }

    #[test]
    fn test_empty_ice_server_list_stays_empty() {
        assert!(ice_servers(&[]).is_empty());
        let servers = ice_servers(&["stun:stun.example.org:3478".to_string()]);
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].urls, vec!["stun:stun.example.org:3478"]);
    }

    #[tokio::test]
    async fn test_offer_carries_video_and_application_sections() {
        // Arrange
        let (tx, _rx) = mpsc::unbounded_channel();
        let transport = WebRtcTransport::new(&ClientConfig::default(), tx)
            .await
            .unwrap();

        // Act
        transport.add_video_receiver().await.unwrap();
        transport.create_data_channel("datachannel").await.unwrap();
        let offer = transport.create_offer().await.unwrap();
        let pinned = prefer_codec(&offer.sdp, "H264");

        // Assert
        assert_eq!(offer.sdp_type, SdpType::Offer);
        assert!(offer.sdp.contains("m=video"));
        assert!(offer.sdp.contains("m=application"));
        assert!(offer.sdp.contains("a=recvonly"));
        let video_line = pinned
            .split("\r\n")
            .find(|l| l.starts_with("m=video"))
            .unwrap();
        assert_eq!(video_line.split(' ').count(), 4);

        transport.close().await.unwrap();
    }
}

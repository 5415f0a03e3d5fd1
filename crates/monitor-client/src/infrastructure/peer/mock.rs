//! Scripted peer transport for tests.
//!
//! [`MockPeerTransport`] behaves like a well-mannered offerer-side peer
//! connection without touching the network.  Setting the local description
//! walks ICE gathering to `complete`; applying the answer (when the script
//! says so) reports signaling `stable`, ICE `checking` → `connected`, the
//! scripted video tracks and finally an open data channel.  Tests drive the
//! inbound side with [`MockPeerTransport::inject`] and inspect what was sent
//! with [`MockPeerTransport::wait_for_sent`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use monitor_core::{
    IceConnectionState, IceGatheringState, SessionDescription, SignalingState,
};
use tokio::sync::Notify;

use crate::application::{
    PeerEvent, PeerEventSender, PeerTransport, PeerTransportFactory, RemoteTrack, TrackKind,
    TransportError,
};
use crate::domain::ClientConfig;

/// What the scripted transport does at each step.
#[derive(Debug, Clone)]
pub struct MockScript {
    /// SDP returned by `create_offer`.
    pub offer_sdp: String,
    /// Report gathering `complete` as soon as the local description is set.
    pub complete_gathering: bool,
    /// Report connectivity once the answer is applied.
    pub connect_on_answer: bool,
    /// Open the data channel once connected.
    pub open_channel: bool,
    /// Stream ids announced as video tracks once connected.
    pub video_streams: Vec<String>,
    /// Refuse the answer.
    pub reject_answer: bool,
    /// Fail every `send_text`.
    pub fail_sends: bool,
}

impl Default for MockScript {
    fn default() -> Self {
        Self {
            offer_sdp: "v=0\r\nm=video 9 UDP/TLS/RTP/SAVPF 96 102\r\n\
                        a=rtpmap:96 VP8/90000\r\na=rtpmap:102 H264/90000\r\n"
                .to_string(),
            complete_gathering: true,
            connect_on_answer: true,
            open_channel: true,
            video_streams: vec!["camera".to_string()],
            reject_answer: false,
            fail_sends: false,
        }
    }
}

/// In-memory [`PeerTransport`] that follows a [`MockScript`].
pub struct MockPeerTransport {
    script: MockScript,
    events: PeerEventSender,
    calls: Mutex<Vec<String>>,
    local: Mutex<Option<SessionDescription>>,
    remote: Mutex<Option<SessionDescription>>,
    gathering: Mutex<IceGatheringState>,
    sent: Mutex<Vec<String>>,
    sent_changed: Notify,
    closed: AtomicBool,
}

impl MockPeerTransport {
    pub fn new(script: MockScript, events: PeerEventSender) -> Self {
        Self {
            script,
            events,
            calls: Mutex::new(Vec::new()),
            local: Mutex::new(None),
            remote: Mutex::new(None),
            gathering: Mutex::new(IceGatheringState::New),
            sent: Mutex::new(Vec::new()),
            sent_changed: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Push an event as if the WebRTC stack had reported it.
    pub fn inject(&self, event: PeerEvent) {
        // The client may already have dropped the receiver.
        let _ = self.events.send(event);
    }

    /// Deliver a text frame on the data channel.
    pub fn inject_message(&self, text: impl Into<String>) {
        self.inject(PeerEvent::DataChannelMessage(text.into()));
    }

    /// Report gathering `complete` (for scripts with `complete_gathering = false`).
    pub fn complete_gathering(&self) {
        *self.gathering.lock().expect("lock poisoned") = IceGatheringState::Complete;
        self.inject(PeerEvent::IceGatheringStateChanged(IceGatheringState::Complete));
    }

    /// Names of the transport methods called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("lock poisoned").clone()
    }

    /// Wait until at least `count` frames have been sent and return them all.
    pub async fn wait_for_sent(&self, count: usize) -> Vec<String> {
        loop {
            let changed = self.sent_changed.notified();
            {
                let sent = self.sent.lock().expect("lock poisoned");
                if sent.len() >= count {
                    return sent.clone();
                }
            }
            changed.await;
        }
    }

    pub fn local_sdp(&self) -> Option<String> {
        self.local
            .lock()
            .expect("lock poisoned")
            .as_ref()
            .map(|d| d.sdp.clone())
    }

    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.remote.lock().expect("lock poisoned").clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().expect("lock poisoned").push(call.into());
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.is_closed() {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PeerTransport for MockPeerTransport {
    async fn add_video_receiver(&self) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.record("add_video_receiver");
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.record(format!("create_data_channel:{label}"));
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        self.ensure_open()?;
        self.record("create_offer");
        Ok(SessionDescription::offer(self.script.offer_sdp.clone()))
    }

    async fn set_local_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.record("set_local_description");
        *self.local.lock().expect("lock poisoned") = Some(desc);
        self.inject(PeerEvent::SignalingStateChanged(SignalingState::HaveLocalOffer));
        *self.gathering.lock().expect("lock poisoned") = IceGatheringState::Gathering;
        self.inject(PeerEvent::IceGatheringStateChanged(IceGatheringState::Gathering));
        if self.script.complete_gathering {
            self.complete_gathering();
        }
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.local.lock().expect("lock poisoned").clone()
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.record("set_remote_description");
        if self.script.reject_answer {
            return Err(TransportError::peer(
                "set_remote_description",
                "answer rejected by script",
            ));
        }
        *self.remote.lock().expect("lock poisoned") = Some(desc);
        if self.script.connect_on_answer {
            // Same order as webrtc-rs: the answer settles signaling before ICE checks.
            self.inject(PeerEvent::SignalingStateChanged(SignalingState::Stable));
            self.inject(PeerEvent::IceConnectionStateChanged(IceConnectionState::Checking));
            self.inject(PeerEvent::IceConnectionStateChanged(IceConnectionState::Connected));
            for stream_id in &self.script.video_streams {
                self.inject(PeerEvent::TrackReceived(RemoteTrack {
                    kind: TrackKind::Video,
                    stream_id: stream_id.clone(),
                    track_id: format!("{stream_id}-video"),
                    media: None,
                }));
            }
            if self.script.open_channel {
                self.inject(PeerEvent::DataChannelOpen);
            }
        }
        Ok(())
    }

    fn ice_gathering_state(&self) -> IceGatheringState {
        *self.gathering.lock().expect("lock poisoned")
    }

    async fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.ensure_open()?;
        if self.script.fail_sends {
            return Err(TransportError::peer("send_text", "send refused by script"));
        }
        self.sent.lock().expect("lock poisoned").push(text);
        self.sent_changed.notify_waiters();
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.record("close");
        if !self.closed.swap(true, Ordering::SeqCst) {
            // Late callbacks a real stack would still deliver.
            self.inject(PeerEvent::DataChannelClose);
            self.inject(PeerEvent::SignalingStateChanged(SignalingState::Closed));
        }
        Ok(())
    }
}

/// Factory that hands out [`MockPeerTransport`]s and keeps them for inspection.
#[derive(Default)]
pub struct MockTransportFactory {
    script: MockScript,
    fail_with: Option<TransportError>,
    created: Mutex<Vec<Arc<MockPeerTransport>>>,
}

impl MockTransportFactory {
    pub fn new(script: MockScript) -> Self {
        Self {
            script,
            fail_with: None,
            created: Mutex::new(Vec::new()),
        }
    }

    /// A factory whose every `create` fails with `err`.
    pub fn failing(err: TransportError) -> Self {
        Self {
            fail_with: Some(err),
            ..Self::default()
        }
    }

    /// All transports created so far, oldest first.
    pub fn created(&self) -> Vec<Arc<MockPeerTransport>> {
        self.created.lock().expect("lock poisoned").clone()
    }

    pub fn last(&self) -> Option<Arc<MockPeerTransport>> {
        self.created.lock().expect("lock poisoned").last().cloned()
    }
}

#[async_trait]
impl PeerTransportFactory for MockTransportFactory {
    async fn create(
        &self,
        _config: &ClientConfig,
        events: PeerEventSender,
    ) -> Result<Arc<dyn PeerTransport>, TransportError> {
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        let transport = Arc::new(MockPeerTransport::new(self.script.clone(), events));
        self.created
            .lock()
            .expect("lock poisoned")
            .push(Arc::clone(&transport));
        Ok(transport)
    }
}

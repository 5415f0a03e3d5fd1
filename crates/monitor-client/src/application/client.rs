//! The monitor client: one peer session at a time, driven from the caller's
//! tokio runtime.
//!
//! # Task layout
//!
//! ```text
//!   connect() ──spawn──► session task   (create transport, negotiate)
//!             ──spawn──► event pump     (PeerEvent → status / routing)
//!   channel open ─spawn► writer task    (serialises data-channel sends)
//! ```
//!
//! All three tasks carry the epoch of the session they were started for.
//! Every `connect` that creates a session gets a new epoch, so work belonging
//! to a session that has since been disconnected or replaced finds its epoch
//! stale and stops without touching the current one.
//!
//! Shared state sits behind one `std::sync::Mutex` that is never held across
//! an `.await`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use monitor_core::{
    ConnectionStatus, FrameError, IceGatheringState, InboundFrame, OutboundFrame, RequestId,
    RequestIdCounter, SignalSnapshot, StatusProjector,
};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::correlation::{PendingResponse, PendingTable};
use crate::application::errors::{ClientError, NegotiationError, RequestError};
use crate::application::events::{MonitorEvent, RemoteStream};
use crate::application::negotiation::{negotiate, NegotiationOptions};
use crate::application::ports::{
    PeerEvent, PeerTransport, PeerTransportFactory, SignalingClient, TrackKind,
};
use crate::domain::{ClientConfig, SignalingEndpoint};

/// A frame queued for the writer task.
struct OutgoingFrame {
    request_id: Option<RequestId>,
    text: String,
}

/// Everything that belongs to one peer connection.
struct PeerSession {
    id: Uuid,
    epoch: u64,
    /// `true` until the negotiation task has finished, successfully or not.
    negotiating: bool,
    transport: Option<Arc<dyn PeerTransport>>,
    signals: SignalSnapshot,
    gathering: watch::Sender<IceGatheringState>,
    /// `Some` while the data channel is open.
    outbound: Option<mpsc::UnboundedSender<OutgoingFrame>>,
    pending: PendingTable,
    ids: RequestIdCounter,
    seen_streams: HashSet<String>,
}

impl PeerSession {
    fn new(epoch: u64, gathering: watch::Sender<IceGatheringState>) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            negotiating: true,
            transport: None,
            signals: SignalSnapshot::default(),
            gathering,
            outbound: None,
            pending: PendingTable::new(),
            ids: RequestIdCounter::new(),
            seen_streams: HashSet::new(),
        }
    }
}

struct ClientState {
    projector: StatusProjector,
    epoch: u64,
    session: Option<PeerSession>,
}

struct Inner {
    config: ClientConfig,
    factory: Arc<dyn PeerTransportFactory>,
    signaling: Arc<dyn SignalingClient>,
    events: mpsc::UnboundedSender<MonitorEvent>,
    state: Mutex<ClientState>,
}

/// Client for one monitor device.
///
/// Cheap to clone; all clones share the same session.  Every method that
/// starts background work must be called from within a tokio runtime.
#[derive(Clone)]
pub struct MonitorClient {
    inner: Arc<Inner>,
}

impl MonitorClient {
    /// Create an idle client and the receiver for its events.
    pub fn new(
        config: ClientConfig,
        factory: Arc<dyn PeerTransportFactory>,
        signaling: Arc<dyn SignalingClient>,
    ) -> (Self, mpsc::UnboundedReceiver<MonitorEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let projector = StatusProjector::new(config.status_rule, config.notify_policy);
        let inner = Inner {
            config,
            factory,
            signaling,
            events,
            state: Mutex::new(ClientState {
                projector,
                epoch: 0,
                session: None,
            }),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The last projected connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.inner.lock_state().projector.current()
    }

    pub fn is_channel_open(&self) -> bool {
        self.inner
            .lock_state()
            .session
            .as_ref()
            .is_some_and(|s| s.outbound.is_some())
    }

    /// Number of requests currently awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.inner
            .lock_state()
            .session
            .as_ref()
            .map_or(0, |s| s.pending.len())
    }

    /// Identifier of the current session, for correlating log lines.
    pub fn session_id(&self) -> Option<Uuid> {
        self.inner.lock_state().session.as_ref().map(|s| s.id)
    }

    /// Start connecting to the device at `host:port`.
    ///
    /// Returns immediately; progress is reported on the event stream.  While
    /// a session is negotiating, or its peer connection is still alive, this
    /// is a no-op.  The projected status is not consulted, since the literal
    /// rule reports `disconnected` while ICE is still checking.  A leftover
    /// session whose ICE has failed or closed, or whose signaling has
    /// closed, is torn down and replaced.
    pub fn connect(&self, host: impl Into<String>, port: u16) {
        self.connect_to(SignalingEndpoint::new(host, port));
    }

    pub fn connect_to(&self, endpoint: SignalingEndpoint) {
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let (gathering_tx, gathering_rx) = watch::channel(IceGatheringState::New);

        let (epoch, previous) = {
            let mut state = self.inner.lock_state();
            if let Some(session) = &state.session {
                if session.negotiating || !session.signals.has_ended() {
                    info!("session {}: already active; connect ignored", session.id);
                    return;
                }
            }
            state.epoch += 1;
            let epoch = state.epoch;
            let session = PeerSession::new(epoch, gathering_tx);
            info!("session {}: connecting to {endpoint}", session.id);
            (epoch, state.session.replace(session))
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            // The replaced session's close events go out before any of the new one's.
            if let Some(previous) = previous {
                inner.close_session(previous).await;
            }
            tokio::spawn(Arc::clone(&inner).run_event_pump(epoch, peer_rx));
            inner
                .run_session(epoch, endpoint, peer_tx, gathering_rx)
                .await;
        });
    }

    /// Tear down the current session.
    ///
    /// Pending requests are rejected with [`RequestError::ConnectionClosed`]
    /// and the status is forced to `disconnected`.  Returns once the
    /// transport has acknowledged the close.  Calling it with no session is
    /// a no-op.
    pub async fn disconnect(&self) {
        let (session, status) = {
            let mut state = self.inner.lock_state();
            let Some(session) = state.session.take() else {
                debug!("disconnect: no active session");
                return;
            };
            let status = state.projector.force(ConnectionStatus::Disconnected);
            (session, status)
        };
        info!("session {}: disconnecting", session.id);
        if let Some(status) = status {
            self.inner.emit(MonitorEvent::StatusChanged(status));
        }
        self.inner.close_session(session).await;
    }

    /// Send `{"type":"cmd","cmd":name,"request_id":id}` and await the reply.
    ///
    /// # Errors
    ///
    /// Fails immediately with [`RequestError::ChannelClosed`] when no data
    /// channel is open; see [`PendingResponse`] for the deferred outcomes.
    pub fn cmd(&self, name: &str) -> Result<PendingResponse, RequestError> {
        self.request(|id| OutboundFrame::cmd(name, id))
    }

    /// Send `{"type":"get","data":key,"request_id":id}` and await the reply.
    pub fn get(&self, key: &str) -> Result<PendingResponse, RequestError> {
        self.request(|id| OutboundFrame::get(key, id))
    }

    /// Send a tagged command without waiting for its reply.
    ///
    /// A reply that arrives anyway is reported as an unmatched response.
    pub fn notify(&self, name: &str) -> Result<RequestId, RequestError> {
        let mut state = self.inner.lock_state();
        let session = state.session.as_mut().ok_or(RequestError::ChannelClosed)?;
        let outbound = session
            .outbound
            .clone()
            .ok_or(RequestError::ChannelClosed)?;
        let request_id = session.ids.next_id();
        let text = OutboundFrame::cmd(name, request_id)
            .encode()
            .map_err(RequestError::Encode)?;
        outbound
            .send(OutgoingFrame {
                request_id: None,
                text,
            })
            .map_err(|_| RequestError::ChannelClosed)?;
        debug!("session {}: notify {name} queued as {request_id}", session.id);
        Ok(request_id)
    }

    /// Send an arbitrary JSON value as-is, without a request id.
    pub fn send_raw(&self, message: &Value) -> Result<(), RequestError> {
        let text = serde_json::to_string(message)
            .map_err(|e| RequestError::Encode(FrameError::Encode(e)))?;
        let state = self.inner.lock_state();
        let outbound = state
            .session
            .as_ref()
            .and_then(|s| s.outbound.as_ref())
            .ok_or(RequestError::ChannelClosed)?;
        outbound
            .send(OutgoingFrame {
                request_id: None,
                text,
            })
            .map_err(|_| RequestError::ChannelClosed)
    }

    /// Register, frame and queue one tagged request.
    ///
    /// A call rejected with `TooManyPending` draws no request id.  One
    /// rejected with `RequestIdInUse` consumes the colliding id.  On any
    /// later failure the response is dropped before it is returned, which
    /// removes its entry again.
    fn request(
        &self,
        build: impl FnOnce(RequestId) -> OutboundFrame,
    ) -> Result<PendingResponse, RequestError> {
        let config = &self.inner.config;
        let mut state = self.inner.lock_state();
        let session = state.session.as_mut().ok_or(RequestError::ChannelClosed)?;
        let outbound = session
            .outbound
            .clone()
            .ok_or(RequestError::ChannelClosed)?;

        let ids = &mut session.ids;
        let response = session.pending.register_next(
            || ids.next_id(),
            config.max_pending_requests,
            config.request_timeout,
        )?;
        let request_id = response.request_id();
        let text = build(request_id).encode().map_err(RequestError::Encode)?;

        outbound
            .send(OutgoingFrame {
                request_id: Some(request_id),
                text,
            })
            .map_err(|_| RequestError::ChannelClosed)?;
        debug!("session {}: request {request_id} queued", session.id);
        Ok(response)
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().expect("lock poisoned")
    }

    fn emit(&self, event: MonitorEvent) {
        if self.events.send(event).is_err() {
            debug!("event receiver dropped; event discarded");
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.lock_state()
            .session
            .as_ref()
            .is_some_and(|s| s.epoch == epoch)
    }

    async fn run_session(
        self: Arc<Self>,
        epoch: u64,
        endpoint: SignalingEndpoint,
        peer_tx: mpsc::UnboundedSender<PeerEvent>,
        gathering: watch::Receiver<IceGatheringState>,
    ) {
        let transport = match self.factory.create(&self.config, peer_tx).await {
            Ok(transport) => transport,
            Err(e) => {
                self.fail_negotiation(epoch, e.into()).await;
                return;
            }
        };

        if !self.install_transport(epoch, &transport) {
            debug!("session replaced before its transport was ready");
            if let Err(e) = transport.close().await {
                debug!("closing orphaned transport failed: {e}");
            }
            return;
        }

        let options = NegotiationOptions {
            data_channel_label: &self.config.data_channel_label,
            prefer_h264: self.config.prefer_h264,
        };
        let outcome = negotiate(
            transport.as_ref(),
            self.signaling.as_ref(),
            &endpoint,
            &options,
            gathering,
            || self.is_current(epoch),
        )
        .await;

        match outcome {
            Ok(()) => self.finish_negotiation(epoch),
            Err(NegotiationError::Superseded) => {
                debug!("negotiation for epoch {epoch} superseded");
            }
            Err(e) => self.fail_negotiation(epoch, e).await,
        }
    }

    fn install_transport(&self, epoch: u64, transport: &Arc<dyn PeerTransport>) -> bool {
        let mut state = self.lock_state();
        match state.session.as_mut() {
            Some(session) if session.epoch == epoch => {
                session.transport = Some(Arc::clone(transport));
                true
            }
            _ => false,
        }
    }

    fn finish_negotiation(&self, epoch: u64) {
        let mut state = self.lock_state();
        if let Some(session) = state.session.as_mut().filter(|s| s.epoch == epoch) {
            session.negotiating = false;
            info!("session {}: negotiation complete", session.id);
        }
    }

    /// Force `disconnected`, tear the session down and report the error.
    ///
    /// Does nothing when the session for `epoch` is already gone.
    async fn fail_negotiation(&self, epoch: u64, err: NegotiationError) {
        let (session, status) = {
            let mut state = self.lock_state();
            if !state.session.as_ref().is_some_and(|s| s.epoch == epoch) {
                debug!("stale negotiation failure ignored: {err}");
                return;
            }
            let session = state.session.take();
            let status = state.projector.force(ConnectionStatus::Disconnected);
            (session, status)
        };
        warn!("negotiation failed: {err}");
        if let Some(status) = status {
            self.emit(MonitorEvent::StatusChanged(status));
        }
        if let Some(session) = session {
            self.close_session(session).await;
        }
        self.emit(MonitorEvent::Error(ClientError::Negotiation(err)));
    }

    /// Release everything a detached session holds.
    async fn close_session(&self, mut session: PeerSession) {
        let had_channel = session.outbound.take().is_some();
        let rejected = session
            .pending
            .reject_all(|| RequestError::ConnectionClosed);
        if had_channel {
            self.emit(MonitorEvent::DataChannelClose);
        }
        if let Some(transport) = session.transport.take() {
            if let Err(e) = transport.close().await {
                warn!("session {}: transport close failed: {e}", session.id);
            }
        }
        info!(
            "session {}: closed ({rejected} pending request(s) rejected)",
            session.id
        );
    }

    async fn run_event_pump(
        self: Arc<Self>,
        epoch: u64,
        mut events: mpsc::UnboundedReceiver<PeerEvent>,
    ) {
        while let Some(event) = events.recv().await {
            if !self.handle_peer_event(epoch, event) {
                break;
            }
        }
        debug!("event pump for epoch {epoch} stopped");
    }

    /// Apply one transport event.  Returns `false` once the session is stale.
    fn handle_peer_event(&self, epoch: u64, event: PeerEvent) -> bool {
        let mut outbox = Vec::new();
        {
            let mut guard = self.lock_state();
            let state = &mut *guard;
            let Some(session) = state.session.as_mut().filter(|s| s.epoch == epoch) else {
                return false;
            };

            match event {
                PeerEvent::IceGatheringStateChanged(s) => {
                    session.signals.ice_gathering = s;
                    session.gathering.send_replace(s);
                    outbox.extend(reproject(&mut state.projector, &session.signals));
                }
                PeerEvent::IceConnectionStateChanged(s) => {
                    session.signals.ice_connection = s;
                    outbox.extend(reproject(&mut state.projector, &session.signals));
                }
                PeerEvent::SignalingStateChanged(s) => {
                    session.signals.signaling = s;
                    outbox.extend(reproject(&mut state.projector, &session.signals));
                }
                PeerEvent::TrackReceived(track) => {
                    if track.kind == TrackKind::Video
                        && session.seen_streams.insert(track.stream_id.clone())
                    {
                        info!("session {}: video stream {}", session.id, track.stream_id);
                        outbox.push(MonitorEvent::VideoReceived(RemoteStream {
                            stream_id: track.stream_id,
                            track_id: track.track_id,
                            media: track.media,
                        }));
                    }
                }
                PeerEvent::DataChannelOpen => {
                    if session.outbound.is_none() {
                        if let Some(transport) = session.transport.clone() {
                            let (tx, rx) = mpsc::unbounded_channel();
                            tokio::spawn(run_writer(
                                session.id,
                                transport,
                                session.pending.clone(),
                                rx,
                            ));
                            session.outbound = Some(tx);
                            info!("session {}: data channel open", session.id);
                            outbox.push(MonitorEvent::DataChannelOpen);
                        } else {
                            warn!("session {}: channel opened without a transport", session.id);
                        }
                    }
                }
                PeerEvent::DataChannelClose => {
                    if session.outbound.take().is_some() {
                        let rejected = session
                            .pending
                            .reject_all(|| RequestError::ConnectionClosed);
                        info!(
                            "session {}: data channel closed ({rejected} pending request(s) rejected)",
                            session.id
                        );
                        outbox.push(MonitorEvent::DataChannelClose);
                    }
                }
                PeerEvent::DataChannelMessage(text) => {
                    outbox.extend(route_frame(session, text));
                }
            }
        }

        for event in outbox {
            self.emit(event);
        }
        true
    }
}

fn reproject(
    projector: &mut StatusProjector,
    signals: &SignalSnapshot,
) -> Option<MonitorEvent> {
    projector
        .observe(true, signals)
        .map(MonitorEvent::StatusChanged)
}

/// Hand an inbound frame to its waiter, or turn it into an event.
fn route_frame(session: &PeerSession, text: String) -> Option<MonitorEvent> {
    match InboundFrame::decode(&text) {
        Ok(InboundFrame::Unsolicited(value)) => Some(MonitorEvent::MessageReceived(value)),
        Ok(InboundFrame::Response {
            request_id,
            payload,
        }) => {
            if session.pending.resolve(request_id, payload) {
                None
            } else {
                Some(unmatched(session, request_id, text))
            }
        }
        Err(FrameError::MissingPayload { request_id }) => {
            let rejected = session
                .pending
                .reject(request_id, RequestError::MalformedResponse { request_id });
            if rejected {
                warn!("session {}: response {request_id} has no payload", session.id);
                None
            } else {
                Some(unmatched(session, request_id, text))
            }
        }
        Err(e) => {
            warn!("session {}: dropping malformed frame: {e}", session.id);
            Some(MonitorEvent::Error(ClientError::MalformedFrame(e)))
        }
    }
}

fn unmatched(session: &PeerSession, request_id: RequestId, frame: String) -> MonitorEvent {
    warn!(
        "session {}: response {request_id} does not match any pending request",
        session.id
    );
    MonitorEvent::Error(ClientError::UnmatchedResponse { request_id, frame })
}

/// Drains queued frames into the data channel, one at a time.
async fn run_writer(
    session_id: Uuid,
    transport: Arc<dyn PeerTransport>,
    pending: PendingTable,
    mut frames: mpsc::UnboundedReceiver<OutgoingFrame>,
) {
    while let Some(frame) = frames.recv().await {
        if let Err(e) = transport.send_text(frame.text).await {
            warn!("session {session_id}: data channel send failed: {e}");
            if let Some(request_id) = frame.request_id {
                pending.reject(
                    request_id,
                    RequestError::SendFailed {
                        request_id,
                        reason: e.to_string(),
                    },
                );
            }
        }
    }
    debug!("session {session_id}: writer stopped");
}

//! Offer/answer negotiation for one session.
//!
//! The client is always the offerer.  It asks for a receive-only video
//! stream, opens the data channel, waits until ICE gathering completes so the
//! offer carries every candidate, and swaps that offer for the device's
//! answer over HTTP.  There is no trickle ICE.

use std::borrow::Cow;

use monitor_core::{prefer_codec, IceGatheringState, SessionDescription};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::application::errors::NegotiationError;
use crate::application::ports::{PeerTransport, SignalingClient};
use crate::domain::SignalingEndpoint;

const PREFERRED_VIDEO_CODEC: &str = "H264";

/// Per-session negotiation parameters.
#[derive(Debug, Clone)]
pub struct NegotiationOptions<'a> {
    pub data_channel_label: &'a str,
    pub prefer_h264: bool,
}

/// Run the negotiation sequence against `transport`.
///
/// `is_current` is checked after every suspension point; once it returns
/// `false` the sequence stops with [`NegotiationError::Superseded`] and no
/// further transport or signaling calls are made.
///
/// `gathering` must follow the transport's ICE gathering state.
pub async fn negotiate<F>(
    transport: &dyn PeerTransport,
    signaling: &dyn SignalingClient,
    endpoint: &SignalingEndpoint,
    options: &NegotiationOptions<'_>,
    mut gathering: watch::Receiver<IceGatheringState>,
    is_current: F,
) -> Result<(), NegotiationError>
where
    F: Fn() -> bool + Send + Sync,
{
    let ensure_current = || {
        if is_current() {
            Ok(())
        } else {
            Err(NegotiationError::Superseded)
        }
    };

    transport.add_video_receiver().await?;
    ensure_current()?;

    transport
        .create_data_channel(options.data_channel_label)
        .await?;
    ensure_current()?;

    let offer = transport.create_offer().await?;
    ensure_current()?;

    let offer = if options.prefer_h264 {
        let sdp = match prefer_codec(&offer.sdp, PREFERRED_VIDEO_CODEC) {
            Cow::Owned(sdp) => sdp,
            Cow::Borrowed(_) => {
                warn!("offer has no {PREFERRED_VIDEO_CODEC} payload; sending it unchanged");
                offer.sdp.clone()
            }
        };
        SessionDescription::new(offer.sdp_type, sdp)
    } else {
        offer
    };
    transport.set_local_description(offer).await?;
    ensure_current()?;

    if transport.ice_gathering_state() != IceGatheringState::Complete {
        debug!("waiting for ICE gathering to complete");
        gathering
            .wait_for(|state| *state == IceGatheringState::Complete)
            .await
            .map(|_| ())
            .map_err(|_| NegotiationError::Superseded)?;
    }
    drop(gathering);
    ensure_current()?;

    let local = transport
        .local_description()
        .await
        .ok_or(NegotiationError::MissingLocalDescription)?;
    debug!("posting offer to {}", endpoint.offer_url());
    let answer = signaling.exchange(endpoint, &local).await?;
    ensure_current()?;

    transport.set_remote_description(answer).await?;
    ensure_current()?;

    debug!("negotiation complete");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::application::errors::{SignalingError, TransportError};
    use crate::infrastructure::peer::{MockPeerTransport, MockScript};

    /// Records every offer and answers with a fixed description.
    #[derive(Default)]
    struct RecordingSignaling {
        offers: Mutex<Vec<SessionDescription>>,
        fail: bool,
    }

    #[async_trait]
    impl SignalingClient for RecordingSignaling {
        async fn exchange(
            &self,
            endpoint: &SignalingEndpoint,
            offer: &SessionDescription,
        ) -> Result<SessionDescription, SignalingError> {
            self.offers.lock().unwrap().push(offer.clone());
            if self.fail {
                return Err(SignalingError::Status {
                    url: endpoint.offer_url(),
                    status: 503,
                });
            }
            Ok(SessionDescription::answer("v=0\r\n"))
        }
    }

    fn options(prefer_h264: bool) -> NegotiationOptions<'static> {
        NegotiationOptions {
            data_channel_label: "datachannel",
            prefer_h264,
        }
    }

    fn transport(script: MockScript) -> MockPeerTransport {
        let (tx, _rx) = mpsc::unbounded_channel();
        MockPeerTransport::new(script, tx)
    }

    fn endpoint() -> SignalingEndpoint {
        SignalingEndpoint::new("127.0.0.1", 8080)
    }

    #[tokio::test]
    async fn test_negotiate_posts_pinned_offer_and_applies_answer() {
        // Arrange
        let transport = transport(MockScript::default());
        let signaling = RecordingSignaling::default();
        let (_gather_tx, gather_rx) = watch::channel(IceGatheringState::New);

        // Act
        negotiate(&transport, &signaling, &endpoint(), &options(true), gather_rx, || true)
            .await
            .unwrap();

        // Assert
        let offers = signaling.offers.lock().unwrap().clone();
        assert_eq!(offers.len(), 1);
        assert!(offers[0].sdp.contains("m=video 9 UDP/TLS/RTP/SAVPF 102\r\n"));
        assert!(transport.remote_description().is_some());
    }

    #[tokio::test]
    async fn test_offer_without_h264_is_sent_unchanged() {
        let script = MockScript {
            offer_sdp: "v=0\r\nm=video 9 UDP/TLS/RTP/SAVPF 96\r\na=rtpmap:96 VP8/90000\r\n"
                .to_string(),
            ..MockScript::default()
        };
        let expected = script.offer_sdp.clone();
        let transport = transport(script);
        let signaling = RecordingSignaling::default();
        let (_gather_tx, gather_rx) = watch::channel(IceGatheringState::New);

        negotiate(&transport, &signaling, &endpoint(), &options(true), gather_rx, || true)
            .await
            .unwrap();

        assert_eq!(signaling.offers.lock().unwrap()[0].sdp, expected);
    }

    #[tokio::test]
    async fn test_superseded_session_stops_before_signaling() {
        // Arrange: the session is replaced while the data channel is created
        let transport = transport(MockScript::default());
        let signaling = RecordingSignaling::default();
        let (_gather_tx, gather_rx) = watch::channel(IceGatheringState::New);
        let current = AtomicBool::new(true);

        // Act
        let result = negotiate(
            &transport,
            &signaling,
            &endpoint(),
            &options(true),
            gather_rx,
            || current.swap(false, Ordering::SeqCst),
        )
        .await;

        // Assert
        assert!(matches!(result, Err(NegotiationError::Superseded)));
        assert_eq!(
            transport.calls(),
            vec!["add_video_receiver", "create_data_channel:datachannel"]
        );
        assert!(signaling.offers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_gathering_sender_means_superseded() {
        let script = MockScript {
            complete_gathering: false,
            ..MockScript::default()
        };
        let transport = transport(script);
        let signaling = RecordingSignaling::default();
        let (gather_tx, gather_rx) = watch::channel(IceGatheringState::New);
        drop(gather_tx);

        let result =
            negotiate(&transport, &signaling, &endpoint(), &options(true), gather_rx, || true)
                .await;

        assert!(matches!(result, Err(NegotiationError::Superseded)));
        assert!(signaling.offers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_signaling_error_is_propagated() {
        let transport = transport(MockScript::default());
        let signaling = RecordingSignaling {
            fail: true,
            ..RecordingSignaling::default()
        };
        let (_gather_tx, gather_rx) = watch::channel(IceGatheringState::New);

        let result =
            negotiate(&transport, &signaling, &endpoint(), &options(false), gather_rx, || true)
                .await;

        assert!(matches!(
            result,
            Err(NegotiationError::Signaling(SignalingError::Status { status: 503, .. }))
        ));
        assert!(transport.remote_description().is_none());
    }

    #[tokio::test]
    async fn test_closed_transport_fails_first_step() {
        let transport = transport(MockScript::default());
        transport.close().await.unwrap();
        let signaling = RecordingSignaling::default();
        let (_gather_tx, gather_rx) = watch::channel(IceGatheringState::New);

        let result =
            negotiate(&transport, &signaling, &endpoint(), &options(true), gather_rx, || true)
                .await;

        assert!(matches!(
            result,
            Err(NegotiationError::Transport(TransportError::Closed))
        ));
    }
}

//! Integration tests for the monitor-core protocol through its public API.
//!
//! These tests exercise the request-id counter, frame envelopes and status
//! projection together, the way the client drives them during a session.

use monitor_core::{
    project_status, prefer_codec, ConnectionStatus, InboundFrame, IceConnectionState,
    IceGatheringState, OutboundFrame, RequestIdCounter, SignalSnapshot, SignalingState,
    StatusRule, MAX_REQUEST_ID,
};
use serde_json::{json, Value};

/// Encodes a request, plays the device by echoing its id with `payload`,
/// and decodes the reply.
fn device_reply(frame: &OutboundFrame, payload: Value) -> InboundFrame {
    let sent: Value = serde_json::from_str(&frame.encode().expect("encode")).expect("json");
    let reply = json!({"request_id": sent["request_id"], "payload": payload});
    InboundFrame::decode(&reply.to_string()).expect("decode")
}

#[test]
fn test_ids_stay_unique_until_wraparound() {
    // Arrange
    let mut ids = RequestIdCounter::starting_after(MAX_REQUEST_ID - 3);

    // Act
    let issued: Vec<u32> = (0..5).map(|_| ids.next_id()).collect();

    // Assert
    assert_eq!(
        issued,
        vec![MAX_REQUEST_ID - 2, MAX_REQUEST_ID - 1, MAX_REQUEST_ID, 0, 1]
    );
}

#[test]
fn test_reply_echoes_request_id_of_get() {
    let mut ids = RequestIdCounter::new();
    let frame = OutboundFrame::get("sensors_data", ids.next_id());

    let reply = device_reply(&frame, json!({"temp": 21.5}));

    assert_eq!(
        reply,
        InboundFrame::Response {
            request_id: 1,
            payload: json!({"temp": 21.5}),
        }
    );
}

#[test]
fn test_interleaved_frames_decode_by_request_id_presence() {
    let frames = [
        r#"{"type":"log","value":"hello"}"#,
        r#"{"request_id":2,"payload":true}"#,
        r#"{"type":"sensors_data","sensorsData":{"cpu":48.1}}"#,
        r#"{"request_id":1,"payload":[1,2]}"#,
    ];

    let decoded: Vec<InboundFrame> = frames
        .iter()
        .map(|f| InboundFrame::decode(f).expect("decode"))
        .collect();

    let response_ids: Vec<u32> = decoded
        .iter()
        .filter_map(|f| match f {
            InboundFrame::Response { request_id, .. } => Some(*request_id),
            InboundFrame::Unsolicited(_) => None,
        })
        .collect();
    assert_eq!(response_ids, vec![2, 1]);
    assert!(matches!(decoded[0], InboundFrame::Unsolicited(_)));
    assert!(matches!(decoded[2], InboundFrame::Unsolicited(_)));
}

#[test]
fn test_negotiation_signal_sequence_projects_connecting_then_connected() {
    // Arrange: the sequence of signals a successful negotiation produces.
    let mut snap = SignalSnapshot::default();
    let mut seen = Vec::new();
    let mut record = |snap: &SignalSnapshot| {
        let status = project_status(true, snap, StatusRule::Literal);
        if seen.last() != Some(&status) {
            seen.push(status);
        }
    };

    // Act
    snap.signaling = SignalingState::HaveLocalOffer;
    record(&snap);
    snap.ice_gathering = IceGatheringState::Gathering;
    record(&snap);
    snap.ice_gathering = IceGatheringState::Complete;
    record(&snap);
    snap.ice_connection = IceConnectionState::Checking;
    record(&snap);
    snap.ice_connection = IceConnectionState::Connected;
    record(&snap);
    snap.signaling = SignalingState::Stable;
    record(&snap);

    // Assert
    assert_eq!(
        seen,
        vec![ConnectionStatus::Connecting, ConnectionStatus::Connected]
    );
}

#[test]
fn test_prefer_codec_on_crlf_offer_keeps_trailing_separator() {
    let sdp = "v=0\r\nm=video 9 RTP/AVP 96 102\r\na=rtpmap:96 VP8/90000\r\na=rtpmap:102 H264/90000\r\n";
    let out = prefer_codec(sdp, "H264");
    assert_eq!(out, "v=0\r\nm=video 9 RTP/AVP 102\r\na=rtpmap:102 H264/90000\r\n");
}

//! JSON frames carried on the monitor data channel.
//!
//! # Message flow
//!
//! ```text
//! Client → Device:  OutboundFrame  →  JSON text frame
//! Device → Client:  JSON text frame  →  InboundFrame
//! ```
//!
//! # Outbound envelopes
//!
//! ```json
//! {"type":"cmd","cmd":"start_monitor","request_id":7}
//! {"type":"get","data":"sensors_data","request_id":8}
//! ```
//!
//! # Inbound frames
//!
//! Inbound traffic is either a response to a correlated request or an
//! unsolicited message (telemetry, log lines).  The only discriminant is the
//! presence of `request_id`:
//!
//! ```json
//! {"request_id":8,"payload":{"temp":21.5}}     ← Response
//! {"type":"log","value":"camera ready"}         ← Unsolicited
//! ```
//!
//! The `type` field of unsolicited messages belongs to the UI; this crate
//! never interprets it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::request_id::RequestId;

/// Errors raised while encoding or decoding data-channel frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The frame text is not valid JSON.
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The frame is valid JSON but not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,

    /// `request_id` is present but not an identifier-sized unsigned integer.
    #[error("frame carries an invalid request_id: {0}")]
    InvalidRequestId(Value),

    /// A response frame has no usable `payload`.
    #[error("response {request_id} has no payload")]
    MissingPayload { request_id: RequestId },

    /// An outbound frame could not be serialised.
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}

// ── Outbound ──────────────────────────────────────────────────────────────────

/// A frame the client sends to the device.
///
/// `request_id` is `None` only for fire-and-forget sends built by hand; the
/// client tags every frame it issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundFrame {
    /// A command for the device firmware (`start_monitor`, `stop`, ...).
    Cmd {
        cmd: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    /// A query for a named piece of device state (`sensors_data`, ...).
    Get {
        data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
}

impl OutboundFrame {
    pub fn cmd(name: impl Into<String>, request_id: RequestId) -> Self {
        OutboundFrame::Cmd {
            cmd: name.into(),
            request_id: Some(request_id),
        }
    }

    pub fn get(key: impl Into<String>, request_id: RequestId) -> Self {
        OutboundFrame::Get {
            data: key.into(),
            request_id: Some(request_id),
        }
    }

    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            OutboundFrame::Cmd { request_id, .. } | OutboundFrame::Get { request_id, .. } => {
                *request_id
            }
        }
    }

    /// Serialises the frame to the JSON text sent on the wire.
    pub fn encode(&self) -> Result<String, FrameError> {
        serde_json::to_string(self).map_err(FrameError::Encode)
    }
}

// ── Inbound ───────────────────────────────────────────────────────────────────

/// A decoded frame received from the device.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Reply to a correlated request.
    Response {
        request_id: RequestId,
        payload: Value,
    },
    /// Any object without a (non-null) `request_id`, forwarded verbatim.
    Unsolicited(Value),
}

impl InboundFrame {
    /// Decodes one data-channel text frame.
    ///
    /// # Errors
    ///
    /// - [`FrameError::InvalidJson`] / [`FrameError::NotAnObject`] when the
    ///   frame is not a JSON object.
    /// - [`FrameError::InvalidRequestId`] when `request_id` is not a
    ///   non-negative integer that fits a [`RequestId`].
    /// - [`FrameError::MissingPayload`] when a response has no `payload` or
    ///   a `null` one.  The id is carried so the caller can fail the request.
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text).map_err(FrameError::InvalidJson)?;
        let Value::Object(mut object) = value else {
            return Err(FrameError::NotAnObject);
        };

        let request_id = match object.get("request_id") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(parse_request_id(raw)?),
        };
        let Some(request_id) = request_id else {
            return Ok(InboundFrame::Unsolicited(Value::Object(object)));
        };

        match object.remove("payload") {
            None | Some(Value::Null) => Err(FrameError::MissingPayload { request_id }),
            Some(payload) => Ok(InboundFrame::Response {
                request_id,
                payload,
            }),
        }
    }
}

fn parse_request_id(raw: &Value) -> Result<RequestId, FrameError> {
    raw.as_u64()
        .and_then(|id| RequestId::try_from(id).ok())
        .ok_or_else(|| FrameError::InvalidRequestId(raw.clone()))
}

/// `true` for a payload that is exactly `{}`.
///
/// The device answers a query it cannot satisfy with an empty object, so an
/// empty object is a failure rather than an empty result.  Empty arrays,
/// empty strings and zero are valid payloads.
pub fn is_empty_payload(payload: &Value) -> bool {
    matches!(payload, Value::Object(map) if map.is_empty())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cmd_frame_encodes_type_cmd_and_request_id() {
        // Arrange
        let frame = OutboundFrame::cmd("start_monitor", 7);

        // Act
        let text = frame.encode().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        // Assert
        assert_eq!(
            value,
            json!({"type": "cmd", "cmd": "start_monitor", "request_id": 7})
        );
    }

    #[test]
    fn test_get_frame_encodes_data_field() {
        let text = OutboundFrame::get("sensors_data", 8).encode().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({"type": "get", "data": "sensors_data", "request_id": 8})
        );
    }

    #[test]
    fn test_untagged_cmd_omits_request_id() {
        let frame = OutboundFrame::Cmd {
            cmd: "stop".to_string(),
            request_id: None,
        };
        let value: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert!(value.get("request_id").is_none());
    }

    #[test]
    fn test_request_id_accessor() {
        assert_eq!(OutboundFrame::get("x", 3).request_id(), Some(3));
    }

    #[test]
    fn test_response_frame_decodes_payload() {
        let frame = InboundFrame::decode(r#"{"request_id":1,"payload":{"temp":21.5}}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Response {
                request_id: 1,
                payload: json!({"temp": 21.5}),
            }
        );
    }

    #[test]
    fn test_frame_without_request_id_is_unsolicited() {
        let frame = InboundFrame::decode(r#"{"type":"log","value":"hello"}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Unsolicited(json!({"type": "log", "value": "hello"}))
        );
    }

    #[test]
    fn test_null_request_id_is_unsolicited_and_kept_verbatim() {
        let frame = InboundFrame::decode(r#"{"request_id":null,"type":"log"}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Unsolicited(json!({"request_id": null, "type": "log"}))
        );
    }

    #[test]
    fn test_string_request_id_is_rejected() {
        let result = InboundFrame::decode(r#"{"request_id":"1","payload":{}}"#);
        assert!(matches!(result, Err(FrameError::InvalidRequestId(_))));
    }

    #[test]
    fn test_negative_request_id_is_rejected() {
        let result = InboundFrame::decode(r#"{"request_id":-1,"payload":1}"#);
        assert!(matches!(result, Err(FrameError::InvalidRequestId(_))));
    }

    #[test]
    fn test_request_id_beyond_u32_is_rejected() {
        let result = InboundFrame::decode(r#"{"request_id":4294967296,"payload":1}"#);
        assert!(matches!(result, Err(FrameError::InvalidRequestId(_))));
    }

    #[test]
    fn test_response_without_payload_reports_its_id() {
        let result = InboundFrame::decode(r#"{"request_id":5}"#);
        assert!(matches!(
            result,
            Err(FrameError::MissingPayload { request_id: 5 })
        ));
    }

    #[test]
    fn test_response_with_null_payload_is_missing_payload() {
        let result = InboundFrame::decode(r#"{"request_id":5,"payload":null}"#);
        assert!(matches!(
            result,
            Err(FrameError::MissingPayload { request_id: 5 })
        ));
    }

    #[test]
    fn test_non_object_frame_is_rejected() {
        assert!(matches!(
            InboundFrame::decode("[1,2,3]"),
            Err(FrameError::NotAnObject)
        ));
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(matches!(
            InboundFrame::decode("{not json"),
            Err(FrameError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_empty_object_is_empty_payload() {
        assert!(is_empty_payload(&json!({})));
    }

    #[test]
    fn test_other_empty_values_are_valid_payloads() {
        assert!(!is_empty_payload(&json!([])));
        assert!(!is_empty_payload(&json!("")));
        assert!(!is_empty_payload(&json!(0)));
        assert!(!is_empty_payload(&json!({"running": false})));
    }
}

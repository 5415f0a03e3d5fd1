//! Session descriptions exchanged with the signaling endpoint.
//!
//! The signaling server accepts and returns the same JSON shape a browser's
//! `RTCSessionDescription` serialises to:
//!
//! ```json
//! {"sdp": "v=0\r\no=- ...", "type": "offer"}
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The role of a session description in the offer/answer exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

impl SdpType {
    /// Returns the lowercase wire name (`"offer"`, `"answer"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            SdpType::Offer => "offer",
            SdpType::Answer => "answer",
            SdpType::Pranswer => "pranswer",
            SdpType::Rollback => "rollback",
        }
    }
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known [`SdpType`].
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown SDP type: {0:?}")]
pub struct SdpTypeError(pub String);

impl FromStr for SdpType {
    type Err = SdpTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offer" => Ok(SdpType::Offer),
            "answer" => Ok(SdpType::Answer),
            "pranswer" => Ok(SdpType::Pranswer),
            "rollback" => Ok(SdpType::Rollback),
            other => Err(SdpTypeError(other.to_string())),
        }
    }
}

/// An SDP document together with its offer/answer role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Raw SDP text, lines separated by `\r\n`.
    pub sdp: String,
    /// Serialised as `"type"` to match the signaling server's schema.
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
}

impl SessionDescription {
    pub fn new(sdp_type: SdpType, sdp: impl Into<String>) -> Self {
        Self {
            sdp: sdp.into(),
            sdp_type,
        }
    }

    pub fn offer(sdp: impl Into<String>) -> Self {
        Self::new(SdpType::Offer, sdp)
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self::new(SdpType::Answer, sdp)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_serialises_with_type_field() {
        // Arrange
        let desc = SessionDescription::offer("v=0\r\n");

        // Act
        let json = serde_json::to_value(&desc).unwrap();

        // Assert
        assert_eq!(json["type"], "offer");
        assert_eq!(json["sdp"], "v=0\r\n");
    }

    #[test]
    fn test_answer_deserialises_from_signaling_response() {
        let desc: SessionDescription =
            serde_json::from_str(r#"{"sdp":"v=0\r\n","type":"answer"}"#).unwrap();
        assert_eq!(desc.sdp_type, SdpType::Answer);
        assert_eq!(desc.sdp, "v=0\r\n");
    }

    #[test]
    fn test_unknown_type_is_rejected_by_serde() {
        let result: Result<SessionDescription, _> =
            serde_json::from_str(r#"{"sdp":"","type":"bogus"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_sdp_type_from_str_accepts_wire_names() {
        assert_eq!("pranswer".parse::<SdpType>(), Ok(SdpType::Pranswer));
        assert_eq!("rollback".parse::<SdpType>(), Ok(SdpType::Rollback));
    }

    #[test]
    fn test_sdp_type_from_str_rejects_capitalised_name() {
        assert_eq!(
            "Offer".parse::<SdpType>(),
            Err(SdpTypeError("Offer".to_string()))
        );
    }

    #[test]
    fn test_sdp_type_display_matches_wire_name() {
        assert_eq!(SdpType::Answer.to_string(), "answer");
    }
}

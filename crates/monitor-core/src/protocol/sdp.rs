//! Codec-preference rewrite for local SDP offers.
//!
//! The monitor device encodes its camera feed in H.264.  Offering only that
//! codec avoids a transcode on the device, so before the local offer is
//! applied the client rewrites it:
//!
//! 1. Find the payload type mapped to the codec by the first
//!    `a=rtpmap:<pt> <codec>/<clock>` line.  If there is none the SDP is
//!    returned untouched.
//! 2. Reduce every `m=video` line's payload list to that single payload type.
//! 3. Drop every `a=rtpmap`, `a=fmtp` and `a=rtcp-fb` line that belongs to a
//!    different payload type.
//!
//! All other lines keep their content and order.
//!
//! # Example
//!
//! ```text
//! m=video 9 UDP/TLS/RTP/SAVPF 96 102        m=video 9 UDP/TLS/RTP/SAVPF 102
//! a=rtpmap:96 VP8/90000               →     a=rtpmap:102 H264/90000
//! a=rtcp-fb:96 nack                         a=rtcp-fb:102 nack
//! a=rtpmap:102 H264/90000
//! a=rtcp-fb:102 nack
//! ```

use std::borrow::Cow;

const LINE_SEPARATOR: &str = "\r\n";

/// Attribute names that are scoped to a single payload type.
const CODEC_ATTRIBUTES: [&str; 3] = ["fmtp", "rtpmap", "rtcp-fb"];

/// Pins `codec` (e.g. `"H264"`) as the only video payload type in `sdp`.
///
/// Returns [`Cow::Borrowed`] with the input when the SDP has no `rtpmap`
/// entry for `codec`.
pub fn prefer_codec<'a>(sdp: &'a str, codec: &str) -> Cow<'a, str> {
    let lines: Vec<&str> = sdp.split(LINE_SEPARATOR).collect();

    let Some(payload_type) = lines.iter().find_map(|line| rtpmap_for(line, codec)) else {
        return Cow::Borrowed(sdp);
    };

    let rewritten: Vec<Cow<'_, str>> = lines
        .iter()
        .filter(|line| match codec_attribute(line) {
            Some((_, pt)) => pt == payload_type,
            None => true,
        })
        .map(|line| match rewrite_video_line(line, payload_type) {
            Some(new_line) => Cow::Owned(new_line),
            None => Cow::Borrowed(*line),
        })
        .collect();

    Cow::Owned(rewritten.join(LINE_SEPARATOR))
}

/// Returns the payload type if `line` is `a=rtpmap:<pt> <codec>/...`.
fn rtpmap_for<'a>(line: &'a str, codec: &str) -> Option<&'a str> {
    let rest = line.strip_prefix("a=rtpmap:")?;
    let (pt, encoding) = rest.split_once(char::is_whitespace)?;
    if !is_payload_type(pt) {
        return None;
    }
    let (name, _clock) = encoding.split_once('/')?;
    (name == codec).then_some(pt)
}

/// Splits `a=<name>:<pt>...` into `(name, pt)` for codec-scoped attributes.
fn codec_attribute(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("a=")?;
    let (name, value) = rest.split_once(':')?;
    if !CODEC_ATTRIBUTES.contains(&name) {
        return None;
    }
    let digits = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let pt = &value[..digits];
    is_payload_type(pt).then_some((name, pt))
}

/// Rewrites `m=video <port> <proto> <pts...>` to list only `payload_type`.
fn rewrite_video_line(line: &str, payload_type: &str) -> Option<String> {
    let rest = line.strip_prefix("m=video ")?;
    let mut fields = rest.splitn(3, ' ');
    let port = fields.next()?;
    let proto = fields.next()?;
    // A media line without any payload list is left alone.
    fields.next()?;
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("m=video {port} {proto} {payload_type}"))
}

fn is_payload_type(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn join(lines: &[&str]) -> String {
        lines.join(LINE_SEPARATOR)
    }

    fn offer_with_vp8_and_h264() -> String {
        join(&[
            "v=0",
            "o=- 4611731400430051336 2 IN IP4 127.0.0.1",
            "s=-",
            "t=0 0",
            "m=video 9 UDP/TLS/RTP/SAVPF 96 97 102 103",
            "c=IN IP4 0.0.0.0",
            "a=recvonly",
            "a=rtpmap:96 VP8/90000",
            "a=rtcp-fb:96 nack",
            "a=rtpmap:97 rtx/90000",
            "a=fmtp:97 apt=96",
            "a=rtpmap:102 H264/90000",
            "a=rtcp-fb:102 nack pli",
            "a=fmtp:102 level-asymmetry-allowed=1;packetization-mode=1",
            "a=rtpmap:103 H264/90000",
            "a=fmtp:103 packetization-mode=0",
            "m=application 9 UDP/DTLS/SCTP webrtc-datachannel",
            "a=sctp-port:5000",
            "",
        ])
    }

    #[test]
    fn test_video_line_lists_only_first_h264_payload_type() {
        // Arrange
        let sdp = offer_with_vp8_and_h264();

        // Act
        let out = prefer_codec(&sdp, "H264");

        // Assert
        assert!(out
            .split(LINE_SEPARATOR)
            .any(|l| l == "m=video 9 UDP/TLS/RTP/SAVPF 102"));
    }

    #[test]
    fn test_codec_lines_for_other_payload_types_are_removed() {
        let sdp = offer_with_vp8_and_h264();
        let out = prefer_codec(&sdp, "H264");

        for line in out.split(LINE_SEPARATOR) {
            if let Some((name, pt)) = codec_attribute(line) {
                assert_eq!(pt, "102", "unexpected {name} line survived: {line}");
            }
        }
        assert!(out.contains("a=rtpmap:102 H264/90000"));
        assert!(out.contains("a=rtcp-fb:102 nack pli"));
        assert!(out.contains("a=fmtp:102 level-asymmetry-allowed=1;packetization-mode=1"));
    }

    #[test]
    fn test_unrelated_lines_are_kept_in_order() {
        let sdp = offer_with_vp8_and_h264();
        let out = prefer_codec(&sdp, "H264");
        let expected = join(&[
            "v=0",
            "o=- 4611731400430051336 2 IN IP4 127.0.0.1",
            "s=-",
            "t=0 0",
            "m=video 9 UDP/TLS/RTP/SAVPF 102",
            "c=IN IP4 0.0.0.0",
            "a=recvonly",
            "a=rtpmap:102 H264/90000",
            "a=rtcp-fb:102 nack pli",
            "a=fmtp:102 level-asymmetry-allowed=1;packetization-mode=1",
            "m=application 9 UDP/DTLS/SCTP webrtc-datachannel",
            "a=sctp-port:5000",
            "",
        ]);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_sdp_without_h264_is_returned_unchanged() {
        // Arrange
        let sdp = join(&[
            "v=0",
            "m=video 9 UDP/TLS/RTP/SAVPF 96",
            "a=rtpmap:96 VP8/90000",
            "a=rtcp-fb:96 nack",
        ]);

        // Act
        let out = prefer_codec(&sdp, "H264");

        // Assert
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out, sdp);
    }

    #[test]
    fn test_codec_name_must_match_exactly() {
        // "H264-SVC" is a different codec and must not be picked.
        let sdp = join(&["m=video 9 RTP/AVP 96", "a=rtpmap:96 H264-SVC/90000"]);
        assert_eq!(prefer_codec(&sdp, "H264"), sdp);
    }

    #[test]
    fn test_attributes_without_payload_type_are_kept() {
        let sdp = join(&[
            "m=video 9 RTP/AVP 96 102",
            "a=rtpmap:96 VP8/90000",
            "a=rtpmap:102 H264/90000",
            "a=rtcp-fb:* nack",
            "a=extmap:1 urn:ietf:params:rtp-hdrext:toffset",
        ]);
        let out = prefer_codec(&sdp, "H264");
        assert!(out.contains("a=rtcp-fb:* nack"));
        assert!(out.contains("a=extmap:1 urn:ietf:params:rtp-hdrext:toffset"));
        assert!(!out.contains("VP8"));
    }

    #[test]
    fn test_non_video_media_lines_are_not_rewritten() {
        let sdp = join(&[
            "m=audio 9 UDP/TLS/RTP/SAVPF 111",
            "m=video 9 UDP/TLS/RTP/SAVPF 96 102",
            "a=rtpmap:102 H264/90000",
        ]);
        let out = prefer_codec(&sdp, "H264");
        assert!(out.starts_with("m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n"));
        assert!(out.contains("m=video 9 UDP/TLS/RTP/SAVPF 102"));
    }

    #[test]
    fn test_codec_attribute_parses_name_and_payload_type() {
        assert_eq!(codec_attribute("a=fmtp:97 apt=96"), Some(("fmtp", "97")));
        assert_eq!(codec_attribute("a=rtcp-fb:102 nack"), Some(("rtcp-fb", "102")));
        assert_eq!(codec_attribute("a=ssrc:1234 cname:x"), None);
        assert_eq!(codec_attribute("m=video 9 RTP/AVP 96"), None);
    }
}

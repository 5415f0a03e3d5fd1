//! Client configuration types.
//!
//! [`ClientConfig`] is the single source of truth for all runtime settings of
//! a [`MonitorClient`](crate::application::MonitorClient).  It is a plain
//! struct: the infrastructure layer builds it from CLI arguments and the
//! optional TOML file, tests build it by hand.

use std::time::Duration;

use monitor_core::{NotifyPolicy, StatusRule};

/// All runtime configuration for the monitor client.
///
/// # Example
///
/// ```rust
/// use monitor_client::domain::ClientConfig;
///
/// let cfg = ClientConfig::default();
/// assert_eq!(cfg.data_channel_label, "datachannel");
/// assert!(cfg.prefer_h264);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// STUN/TURN server URLs handed to the peer connection.
    ///
    /// Empty by default: the ground station and the device share a LAN, so
    /// host candidates are enough.
    pub ice_servers: Vec<String>,

    /// Label of the data channel the device listens on.
    pub data_channel_label: String,

    /// Rewrite the local offer so H.264 is the only video codec.
    pub prefer_h264: bool,

    /// How long a `cmd`/`get` waits for its response before failing.
    ///
    /// `None` waits until the response arrives or the channel closes.
    pub request_timeout: Option<Duration>,

    /// Timeout applied to the `POST /offer` signaling request.
    pub signaling_timeout: Option<Duration>,

    /// Maximum number of requests awaiting a response at the same time.
    pub max_pending_requests: usize,

    /// Variant of the status decision rule.
    pub status_rule: StatusRule,

    /// Whether unchanged statuses are re-announced on every signal change.
    pub notify_policy: NotifyPolicy,
}

impl Default for ClientConfig {
    /// | Field                | Default          |
    /// |----------------------|------------------|
    /// | ice_servers          | none             |
    /// | data_channel_label   | `"datachannel"`  |
    /// | prefer_h264          | `true`           |
    /// | request_timeout      | 10 seconds       |
    /// | signaling_timeout    | 10 seconds       |
    /// | max_pending_requests | 1024             |
    /// | status_rule          | `Literal`        |
    /// | notify_policy        | `OnChange`       |
    fn default() -> Self {
        Self {
            ice_servers: Vec::new(),
            data_channel_label: "datachannel".to_string(),
            prefer_h264: true,
            request_timeout: Some(Duration::from_secs(10)),
            signaling_timeout: Some(Duration::from_secs(10)),
            max_pending_requests: 1024,
            status_rule: StatusRule::Literal,
            notify_policy: NotifyPolicy::OnChange,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

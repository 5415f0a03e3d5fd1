//! Connection status model.
//!
//! A WebRTC peer connection exposes three independent state signals: ICE
//! gathering, ICE connection, and signaling.  The user interface only cares
//! about one coarse value, [`ConnectionStatus`].  This module derives that
//! value from the three signals and decides when observers must be told.
//!
//! # Decision rule
//!
//! Evaluated top to bottom, first match wins:
//!
//! ```text
//! 1. no active session                              → disconnected
//! 2. ICE connected  AND  signaling stable           → connected
//! 3. signaling stable  OR  signaling closed         → disconnected
//! 4. otherwise                                      → connecting
//! ```
//!
//! Rule 3 means a session whose signaling has become stable while ICE is
//! still checking reports `disconnected`.  That is the behaviour the
//! dashboard has always shown and it stays the default
//! ([`StatusRule::Literal`]).  [`StatusRule::Progressive`] reports such a
//! session as `connecting` instead.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The coarse connection status shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
        })
    }
}

/// Progress of local ICE candidate collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IceGatheringState {
    #[default]
    New,
    Gathering,
    Complete,
}

/// End-to-end ICE connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IceConnectionState {
    #[default]
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

/// Offer/answer exchange progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SignalingState {
    #[default]
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveLocalPranswer,
    HaveRemotePranswer,
    Closed,
}

/// Latest value of each low-level signal for one peer connection.
///
/// The default matches a freshly created peer connection: nothing gathered,
/// no connectivity, signaling stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignalSnapshot {
    pub ice_gathering: IceGatheringState,
    pub ice_connection: IceConnectionState,
    pub signaling: SignalingState,
}

impl SignalSnapshot {
    /// `true` once the peer connection can no longer come up on its own:
    /// ICE has failed or closed, or signaling has closed.
    ///
    /// Independent of the [`StatusRule`], which may report `disconnected`
    /// while ICE is still checking.
    pub fn has_ended(&self) -> bool {
        self.signaling == SignalingState::Closed
            || matches!(
                self.ice_connection,
                IceConnectionState::Failed | IceConnectionState::Closed
            )
    }
}

/// Which variant of the decision rule to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusRule {
    /// Stable signaling without ICE connectivity reports `disconnected`.
    #[default]
    Literal,
    /// Stable signaling without ICE connectivity reports `connecting` unless
    /// ICE has failed, disconnected or closed.
    Progressive,
}

/// When observers are notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyPolicy {
    /// Only when the projected status differs from the last one.
    #[default]
    OnChange,
    /// On every signal change, even if the projected status is unchanged.
    EverySignal,
}

/// Derives the coarse status from the low-level signals.
///
/// `session_present` is `false` when no peer connection exists at all.
pub fn project_status(
    session_present: bool,
    snapshot: &SignalSnapshot,
    rule: StatusRule,
) -> ConnectionStatus {
    if !session_present {
        return ConnectionStatus::Disconnected;
    }

    if snapshot.ice_connection == IceConnectionState::Connected
        && snapshot.signaling == SignalingState::Stable
    {
        return ConnectionStatus::Connected;
    }

    let disconnected = match rule {
        StatusRule::Literal => matches!(
            snapshot.signaling,
            SignalingState::Stable | SignalingState::Closed
        ),
        StatusRule::Progressive => {
            snapshot.signaling == SignalingState::Closed
                || matches!(
                    snapshot.ice_connection,
                    IceConnectionState::Failed
                        | IceConnectionState::Disconnected
                        | IceConnectionState::Closed
                )
        }
    };

    if disconnected {
        ConnectionStatus::Disconnected
    } else {
        ConnectionStatus::Connecting
    }
}

/// Tracks the last projected status and filters notifications.
///
/// The projector is the single source of truth for [`ConnectionStatus`]; the
/// client never stores the status anywhere else.
#[derive(Debug, Clone)]
pub struct StatusProjector {
    rule: StatusRule,
    policy: NotifyPolicy,
    current: ConnectionStatus,
}

impl StatusProjector {
    pub fn new(rule: StatusRule, policy: NotifyPolicy) -> Self {
        Self {
            rule,
            policy,
            current: ConnectionStatus::Disconnected,
        }
    }

    /// Returns the last projected status.
    pub fn current(&self) -> ConnectionStatus {
        self.current
    }

    /// Re-evaluates the rule after a signal change.
    ///
    /// Returns `Some(status)` when observers must be notified.
    pub fn observe(
        &mut self,
        session_present: bool,
        snapshot: &SignalSnapshot,
    ) -> Option<ConnectionStatus> {
        let next = project_status(session_present, snapshot, self.rule);
        self.apply(next)
    }

    /// Sets the status directly, bypassing the rule.
    ///
    /// Used on negotiation failure and teardown where the status is forced
    /// to `disconnected` regardless of the signals.
    pub fn force(&mut self, status: ConnectionStatus) -> Option<ConnectionStatus> {
        self.apply(status)
    }

    fn apply(&mut self, next: ConnectionStatus) -> Option<ConnectionStatus> {
        let changed = next != self.current;
        self.current = next;
        match self.policy {
            NotifyPolicy::OnChange if !changed => None,
            _ => Some(next),
        }
    }
}

impl Default for StatusProjector {
    fn default() -> Self {
        Self::new(StatusRule::default(), NotifyPolicy::default())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! monitor-client library crate.
//!
//! Connects a ground-station dashboard to a monitor device over WebRTC: one
//! receive-only video stream plus a JSON data channel for commands and
//! queries.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Dashboard / CLI
//!         ↕  MonitorEvent stream, cmd/get futures
//! [monitor-client]
//!   ├── domain/           Pure types: ClientConfig, SignalingEndpoint
//!   ├── application/      Session lifecycle, negotiation, request correlation
//!   └── infrastructure/
//!         ├── peer/       PeerTransport over webrtc-rs (and a scripted double)
//!         ├── signaling   POST /offer over reqwest
//!         └── config_file Optional TOML configuration
//!         ↕
//! Monitor device (HTTP signaling + WebRTC)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `monitor-core`; it reaches the
//!   outside world only through the traits in [`application::ports`].
//! - `infrastructure` implements those traits with webrtc-rs and reqwest.

/// Domain layer: configuration and addressing types (no I/O).
pub mod domain;

/// Application layer: the monitor client and its ports.
pub mod application;

/// Infrastructure layer: WebRTC transport, HTTP signaling, config file.
pub mod infrastructure;

pub use application::{ClientError, MonitorClient, MonitorEvent, PendingResponse, RequestError};
pub use domain::ClientConfig;

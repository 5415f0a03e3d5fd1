//! Domain layer for monitor-client.
//!
//! Plain configuration and addressing types with no I/O.  The infrastructure
//! layer fills them from the command line and the optional TOML file.

pub mod config;
pub mod endpoint;

pub use config::ClientConfig;
pub use endpoint::SignalingEndpoint;

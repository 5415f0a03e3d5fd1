//! Optional TOML configuration file for the `monitor-client` binary.
//!
//! Every key is optional; absent keys keep their built-in default.
//!
//! ```toml
//! [connection]
//! host = "192.168.4.1"
//! port = 8080
//! ice_servers = ["stun:stun.l.google.com:19302"]
//! data_channel_label = "datachannel"
//! prefer_h264 = true
//! signaling_timeout_secs = 10
//!
//! [requests]
//! timeout_ms = 10000   # 0 waits forever
//! max_pending = 1024
//!
//! [status]
//! rule = "literal"     # or "progressive"
//! notify = "on_change" # or "every_signal"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Values from the command line take precedence over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use monitor_core::{NotifyPolicy, StatusRule};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ClientConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub connection: ConnectionSection,
    #[serde(default)]
    pub requests: RequestsSection,
    #[serde(default)]
    pub status: StatusSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Where the device is and how to negotiate with it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default)]
    pub ice_servers: Vec<String>,
    #[serde(default = "default_label")]
    pub data_channel_label: String,
    #[serde(default = "default_true")]
    pub prefer_h264: bool,
    /// `0` disables the signaling timeout.
    #[serde(default = "default_signaling_timeout_secs")]
    pub signaling_timeout_secs: u64,
}

/// Limits for correlated requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestsSection {
    /// `0` lets requests wait until a response arrives or the channel closes.
    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatusSection {
    #[serde(default)]
    pub rule: StatusRule,
    #[serde(default)]
    pub notify: NotifyPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    /// `tracing` filter directive, e.g. `"info"` or `"monitor_client=debug"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_label() -> String {
    ClientConfig::default().data_channel_label
}
fn default_true() -> bool {
    true
}
fn default_signaling_timeout_secs() -> u64 {
    10
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_max_pending() -> usize {
    1024
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            ice_servers: Vec::new(),
            data_channel_label: default_label(),
            prefer_h264: default_true(),
            signaling_timeout_secs: default_signaling_timeout_secs(),
        }
    }
}

impl Default for RequestsSection {
    fn default() -> Self {
        Self {
            timeout_ms: default_request_timeout_ms(),
            max_pending: default_max_pending(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn nonzero(duration: Duration) -> Option<Duration> {
    (!duration.is_zero()).then_some(duration)
}

impl ConfigFile {
    /// The client settings described by this file.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            ice_servers: self.connection.ice_servers.clone(),
            data_channel_label: self.connection.data_channel_label.clone(),
            prefer_h264: self.connection.prefer_h264,
            request_timeout: nonzero(Duration::from_millis(self.requests.timeout_ms)),
            signaling_timeout: nonzero(Duration::from_secs(
                self.connection.signaling_timeout_secs,
            )),
            max_pending_requests: self.requests.max_pending,
            status_rule: self.status.rule,
            notify_policy: self.status.notify,
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses a config document.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the TOML is malformed.
pub fn parse(content: &str) -> Result<ConfigFile, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Reads and parses the config file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read (including when it
/// does not exist) and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_yields_client_defaults() {
        // Arrange / Act
        let file = parse("").expect("parse");

        // Assert
        assert_eq!(file.client_config(), ClientConfig::default());
        assert_eq!(file.logging.level, "info");
        assert!(file.connection.host.is_none());
    }

    #[test]
    fn test_full_document_maps_onto_client_config() {
        // Arrange
        let text = r#"
            [connection]
            host = "192.168.4.1"
            port = 9000
            ice_servers = ["stun:stun.example.org:3478"]
            prefer_h264 = false

            [requests]
            timeout_ms = 2500
            max_pending = 16

            [status]
            rule = "progressive"
            notify = "every_signal"
        "#;

        // Act
        let file = parse(text).expect("parse");
        let cfg = file.client_config();

        // Assert
        assert_eq!(file.connection.host.as_deref(), Some("192.168.4.1"));
        assert_eq!(file.connection.port, Some(9000));
        assert_eq!(cfg.ice_servers, vec!["stun:stun.example.org:3478"]);
        assert!(!cfg.prefer_h264);
        assert_eq!(cfg.request_timeout, Some(Duration::from_millis(2500)));
        assert_eq!(cfg.max_pending_requests, 16);
        assert_eq!(cfg.status_rule, StatusRule::Progressive);
        assert_eq!(cfg.notify_policy, NotifyPolicy::EverySignal);
    }

    #[test]
    fn test_zero_timeouts_disable_them() {
        let file = parse(
            "[requests]\ntimeout_ms = 0\n[connection]\nsignaling_timeout_secs = 0\n",
        )
        .expect("parse");

        let cfg = file.client_config();

        assert_eq!(cfg.request_timeout, None);
        assert_eq!(cfg.signaling_timeout, None);
    }

    #[test]
    fn test_unknown_status_rule_is_a_parse_error() {
        let result = parse("[status]\nrule = \"optimistic\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let path = std::env::temp_dir().join("monitor-client-missing-config.toml");

        let err = load(&path).unwrap_err();

        match err {
            ConfigError::Io { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_reads_file_from_disk() {
        // Arrange
        let path = std::env::temp_dir().join(format!(
            "monitor-client-config-{}.toml",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").expect("write");

        // Act
        let file = load(&path);
        let _ = std::fs::remove_file(&path);

        // Assert
        assert_eq!(file.expect("load").logging.level, "debug");
    }
}

//! Address of the device's HTTP signaling endpoint.

use std::fmt;

/// Host and port of the monitor device's signaling server.
///
/// The offer is always posted to `http://{host}:{port}/offer`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignalingEndpoint {
    pub host: String,
    pub port: u16,
}

impl SignalingEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Full URL of the offer/answer exchange.
    pub fn offer_url(&self) -> String {
        format!("http://{}:{}/offer", self.host, self.port)
    }
}

impl fmt::Display for SignalingEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_url_uses_http_and_offer_path() {
        let endpoint = SignalingEndpoint::new("localhost", 8080);
        assert_eq!(endpoint.offer_url(), "http://localhost:8080/offer");
    }

    #[test]
    fn test_display_is_host_colon_port() {
        let endpoint = SignalingEndpoint::new("192.168.4.1", 9000);
        assert_eq!(endpoint.to_string(), "192.168.4.1:9000");
    }
}

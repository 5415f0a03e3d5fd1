//! HTTP signaling: one `POST /offer` per session.
//!
//! The body is the local description serialised as `{"sdp": ..., "type":
//! "offer"}` with `Content-Type: application/json`; the device answers with
//! the same shape.  No retries.

use std::time::Duration;

use async_trait::async_trait;
use monitor_core::SessionDescription;
use tracing::debug;

use crate::application::{SignalingClient, SignalingError};
use crate::domain::SignalingEndpoint;

/// [`SignalingClient`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpSignalingClient {
    http: reqwest::Client,
}

impl HttpSignalingClient {
    /// Build a client whose requests give up after `timeout`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SignalingError::Client`] if the TLS backend cannot be
    /// initialised.
    pub fn new(timeout: Option<Duration>) -> Result<Self, SignalingError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(SignalingError::Client)?;
        Ok(Self { http })
    }
}

#[async_trait]
impl SignalingClient for HttpSignalingClient {
    async fn exchange(
        &self,
        endpoint: &SignalingEndpoint,
        offer: &SessionDescription,
    ) -> Result<SessionDescription, SignalingError> {
        let url = endpoint.offer_url();
        debug!("POST {url} ({} bytes of SDP)", offer.sdp.len());

        let response = self
            .http
            .post(&url)
            .json(offer)
            .send()
            .await
            .map_err(|source| SignalingError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SignalingError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| SignalingError::Request {
                url: url.clone(),
                source,
            })?;
        let answer: SessionDescription =
            serde_json::from_slice(&body).map_err(SignalingError::InvalidAnswer)?;
        debug!("received {} from {url}", answer.sdp_type);
        Ok(answer)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Event-stream transport lifecycle
//!
//! A [`TransportConnector`] opens handles; [`TransportProbe`] uses one to check that a
//! service is reachable and always leaves no live connection behind.

pub mod codec;
pub mod sse;

pub use codec::{SseDecoder, SseEvent};
pub use sse::{SseConnector, SseTransport};

use async_trait::async_trait;
use mcpdesk_core::{try_with_timeout, DeskResult, SessionCredential, TransportConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// One open streaming connection, owned by a single caller
#[async_trait]
pub trait TransportHandle: Send {
    /// Release the connection; calling it again is a no-op
    async fn close(&mut self) -> DeskResult<()>;

    fn is_closed(&self) -> bool;
}

#[async_trait]
pub trait TransportConnector: Send + Sync {
    type Handle: TransportHandle;

    /// Establish the raw connection
    async fn open(
        &self,
        url: &str,
        credential: Option<&SessionCredential>,
    ) -> DeskResult<Self::Handle>;

    /// Complete the protocol handshake on an opened handle
    async fn handshake(&self, handle: &mut Self::Handle) -> DeskResult<()>;

    /// Open and handshake; a handle whose handshake fails is closed before returning
    async fn connect(
        &self,
        url: &str,
        credential: Option<&SessionCredential>,
    ) -> DeskResult<Self::Handle> {
        let mut handle = self.open(url, credential).await?;

        match self.handshake(&mut handle).await {
            Ok(()) => Ok(handle),
            Err(e) => {
                if let Err(close_error) = handle.close().await {
                    warn!(
                        url,
                        error = %close_error,
                        "Failed to close transport after handshake error"
                    );
                }
                Err(e)
            }
        }
    }
}

/// Outcome of a reachability test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub success: bool,
    pub message: String,
}

impl ProbeResult {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            message: "Connection test succeeded".to_string(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            message: if message.trim().is_empty() {
                "Connection test failed".to_string()
            } else {
                message
            },
        }
    }
}

pub struct TransportProbe<C> {
    connector: C,
    timeout: Duration,
}

impl<C: TransportConnector> TransportProbe<C> {
    pub fn new(connector: C, timeout: Duration) -> Self {
        Self { connector, timeout }
    }

    pub fn from_config(connector: C, config: &TransportConfig) -> Self {
        Self::new(connector, Duration::from_secs(config.probe_timeout_seconds))
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Connect, then close immediately
    ///
    /// Never fails: every error becomes an unsuccessful result. Dropping the returned
    /// future early drops any handle it opened, which releases the connection.
    pub async fn test(&self, url: &str, credential: Option<&SessionCredential>) -> ProbeResult {
        let connected = try_with_timeout(
            self.connector.connect(url, credential),
            self.timeout.as_millis() as u64,
            "transport_probe",
        )
        .await;

        match connected {
            Ok(mut handle) => {
                if let Err(e) = handle.close().await {
                    warn!(url, error = %e, "Probe connected but closing the handle failed");
                }
                info!(url, "Transport probe succeeded");
                ProbeResult::succeeded()
            }
            Err(e) => {
                warn!(url, error = %e, "Transport probe failed");
                ProbeResult::failed(e.to_string())
            }
        }
    }
}

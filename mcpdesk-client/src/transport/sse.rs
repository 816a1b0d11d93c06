//! Event-stream transport over reqwest

use super::codec::{SseDecoder, SseEvent};
use super::{TransportConnector, TransportHandle};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use mcpdesk_core::{
    token_fingerprint, transport_error, try_with_timeout, DeskError, DeskResult, ErrorContext,
    SessionCredential, TransportConfig,
};
use reqwest::header::{
    HeaderValue, ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, USER_AGENT,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const EVENT_STREAM: &str = "text/event-stream";

/// A live event-stream connection plus the endpoint its messages are posted to
pub struct SseTransport {
    client: reqwest::Client,
    stream_url: Url,
    endpoint: Option<Url>,
    bearer: Option<HeaderValue>,
    events: Option<BoxStream<'static, reqwest::Result<Bytes>>>,
    decoder: SseDecoder,
    pending: VecDeque<SseEvent>,
}

impl SseTransport {
    pub fn stream_url(&self) -> &Url {
        &self.stream_url
    }

    /// Message endpoint announced by the server, once the handshake is done
    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    /// Next decoded event; `None` once the server ended the stream
    pub async fn next_event(&mut self) -> DeskResult<Option<SseEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }

            let Some(events) = self.events.as_mut() else {
                return Err(transport_error!("Transport is closed", "sse_transport"));
            };

            match events.next().await {
                Some(Ok(chunk)) => self.pending.extend(self.decoder.push(&chunk)),
                Some(Err(e)) => {
                    return Err(transport_error!(
                        format!("Event stream from {} failed: {}", self.stream_url, e),
                        "sse_transport",
                        e
                    ))
                }
                None => {
                    self.events = None;
                    return Ok(None);
                }
            }
        }
    }

    /// Post a JSON-RPC message to the announced endpoint
    pub async fn send(&mut self, message: &Value) -> DeskResult<()> {
        if self.events.is_none() {
            return Err(transport_error!("Transport is closed", "sse_transport"));
        }
        let endpoint = self.endpoint.as_ref().ok_or_else(|| {
            transport_error!("Handshake has not completed, no endpoint yet", "sse_transport")
        })?;

        let mut request = self.client.post(endpoint.clone()).json(message);
        if let Some(bearer) = &self.bearer {
            request = request.header(AUTHORIZATION, bearer.clone());
        }

        let response = request.send().await.map_err(|e| {
            transport_error!(
                format!("Failed to post to {}: {}", endpoint, e),
                "sse_transport",
                e
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeskError::Transport {
                message: format!(
                    "Endpoint {} answered HTTP {}: {}",
                    endpoint,
                    status.as_u16(),
                    body
                ),
                source: None,
                context: ErrorContext::new("sse_transport")
                    .with_operation("send")
                    .with_metadata("status", &status.as_u16().to_string()),
            });
        }

        debug!(endpoint = %endpoint, status = status.as_u16(), "Message delivered");
        Ok(())
    }

    async fn wait_for_endpoint(&mut self) -> DeskResult<Url> {
        while let Some(event) = self.next_event().await? {
            if event.event != "endpoint" {
                debug!(event = %event.event, "Ignoring event before endpoint");
                continue;
            }

            let endpoint = self.stream_url.join(event.data.trim()).map_err(|e| {
                transport_error!(
                    format!("Invalid endpoint '{}': {}", event.data, e),
                    "sse_transport",
                    e
                )
            })?;

            if endpoint.origin() != self.stream_url.origin() {
                return Err(transport_error!(
                    format!("Endpoint origin {} does not match the stream", endpoint),
                    "sse_transport"
                ));
            }
            return Ok(endpoint);
        }

        Err(transport_error!(
            "Stream ended before the endpoint event",
            "sse_transport"
        ))
    }
}

#[async_trait]
impl TransportHandle for SseTransport {
    async fn close(&mut self) -> DeskResult<()> {
        if self.events.take().is_some() {
            self.pending.clear();
            info!(url = %self.stream_url, "Transport closed");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.events.is_none()
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        if self.events.take().is_some() {
            debug!(url = %self.stream_url, "Releasing transport dropped while open");
        }
    }
}

impl std::fmt::Debug for SseTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseTransport")
            .field("stream_url", &self.stream_url.as_str())
            .field("endpoint", &self.endpoint.as_ref().map(Url::as_str))
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Media type check ignoring case and parameters such as `charset`
fn is_event_stream(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|media_type| media_type.trim().eq_ignore_ascii_case(EVENT_STREAM))
}

pub struct SseConnector {
    client: reqwest::Client,
    handshake_timeout: Duration,
}

impl SseConnector {
    pub fn new(config: &TransportConfig, user_agent: &str) -> DeskResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).map_err(|e| DeskError::Config {
                message: format!("Invalid user agent: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("sse_connector").with_operation("new"),
            })?,
        );

        let handshake_timeout = Duration::from_secs(config.handshake_timeout_seconds);
        // no overall timeout: the stream stays open for as long as the handle lives
        let client = reqwest::Client::builder()
            .connect_timeout(handshake_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| DeskError::Config {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("sse_connector").with_operation("new"),
            })?;

        Ok(Self {
            client,
            handshake_timeout,
        })
    }
}

#[async_trait]
impl TransportConnector for SseConnector {
    type Handle = SseTransport;

    async fn open(
        &self,
        url: &str,
        credential: Option<&SessionCredential>,
    ) -> DeskResult<SseTransport> {
        let stream_url = Url::parse(url).map_err(|e| DeskError::Validation {
            message: format!("Invalid event-stream URL '{}': {}", url, e),
            field: Some("url".to_string()),
            context: ErrorContext::new("sse_connector").with_operation("open"),
        })?;

        let bearer = match credential {
            Some(credential) => {
                let mut value = HeaderValue::from_str(&credential.bearer()).map_err(|e| {
                    transport_error!(
                        format!("Token cannot be sent as a header: {}", e),
                        "sse_connector",
                        e
                    )
                })?;
                value.set_sensitive(true);
                debug!(
                    token = %token_fingerprint(&credential.token),
                    "Attaching bearer to event stream"
                );
                Some(value)
            }
            None => None,
        };

        let mut request = self
            .client
            .get(stream_url.clone())
            .header(ACCEPT, EVENT_STREAM)
            .header(CACHE_CONTROL, "no-cache");
        if let Some(bearer) = &bearer {
            request = request.header(AUTHORIZATION, bearer.clone());
        }

        let response = request.send().await.map_err(|e| {
            transport_error!(
                format!("Failed to connect to {}: {}", stream_url, e),
                "sse_connector",
                e
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeskError::Transport {
                message: format!(
                    "Event stream {} answered HTTP {}",
                    stream_url,
                    status.as_u16()
                ),
                source: None,
                context: ErrorContext::new("sse_connector")
                    .with_operation("open")
                    .with_metadata("status", &status.as_u16().to_string())
                    .with_suggestion(if status.as_u16() == 401 {
                        "The service rejected the credential, log in again"
                    } else {
                        "Verify the event-stream URL and that the service is running"
                    }),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !is_event_stream(&content_type) {
            return Err(transport_error!(
                format!(
                    "{} is not an event stream (content type '{}')",
                    stream_url, content_type
                ),
                "sse_connector"
            ));
        }

        info!(url = %stream_url, "Event stream opened");
        Ok(SseTransport {
            client: self.client.clone(),
            stream_url,
            endpoint: None,
            bearer,
            events: Some(response.bytes_stream().boxed()),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
        })
    }

    async fn handshake(&self, handle: &mut SseTransport) -> DeskResult<()> {
        let endpoint = try_with_timeout(
            handle.wait_for_endpoint(),
            self.handshake_timeout.as_millis() as u64,
            "sse_handshake",
        )
        .await?;

        info!(endpoint = %endpoint, "Handshake completed");
        handle.endpoint = Some(endpoint);
        Ok(())
    }
}

//! The network edge of the pipeline

use super::{HttpRequest, HttpResponse};
use async_trait::async_trait;
use mcpdesk_core::{ApiConfig, DeskError, DeskResult, ErrorContext};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Performs one HTTP exchange
///
/// Returns `Ok` for every response the server produced, whatever its status; `Err`
/// only when no response was received.
#[async_trait]
pub trait HttpSender: Send + Sync {
    async fn send(&self, request: HttpRequest) -> DeskResult<HttpResponse>;
}

pub struct ReqwestSender {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestSender {
    pub fn new(config: &ApiConfig) -> DeskResult<Self> {
        Ok(Self {
            client: create_http_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, request: &HttpRequest) -> DeskResult<Url> {
        let raw = format!("{}/{}", self.base_url, request.path.trim_start_matches('/'));
        let mut url = Url::parse(&raw).map_err(|e| DeskError::Validation {
            message: format!("Invalid request URL '{}': {}", raw, e),
            field: Some("path".to_string()),
            context: ErrorContext::new("http_sender").with_operation("url_for"),
        })?;

        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }
}

#[async_trait]
impl HttpSender for ReqwestSender {
    async fn send(&self, request: HttpRequest) -> DeskResult<HttpResponse> {
        let url = self.url_for(&request)?;
        debug!(method = %request.method, url = %url, "Sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), url.clone())
            .headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| network_error(e, &url, "send"))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| network_error(e, &url, "read_body"))?;

        debug!(status, url = %url, bytes = body.len(), "Received response");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// HTTP client with the configured timeout and identification headers
pub(crate) fn create_http_client(config: &ApiConfig) -> DeskResult<reqwest::Client> {
    let mut headers = HeaderMap::new();

    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&config.user_agent).map_err(|e| DeskError::Config {
            message: format!("Invalid user agent: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("http_client").with_operation("create_client"),
        })?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .default_headers(headers)
        .build()
        .map_err(|e| DeskError::Config {
            message: format!("Failed to create HTTP client: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("http_client").with_operation("create_client"),
        })
}

fn network_error(e: reqwest::Error, url: &Url, operation: &str) -> DeskError {
    let message = if e.is_timeout() {
        format!("Request to {} timed out", url)
    } else if e.is_connect() {
        format!("Could not connect to {}", url)
    } else {
        format!("Request to {} failed: {}", url, e)
    };

    DeskError::Network {
        message,
        source: Some(Box::new(e)),
        context: ErrorContext::new("http_sender")
            .with_operation(operation)
            .with_suggestion("Check that the backend is running and reachable")
            .with_suggestion("Check api.base_url in the configuration"),
    }
}

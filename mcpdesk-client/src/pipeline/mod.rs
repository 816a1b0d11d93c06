//! Request pipeline
//!
//! Every backend call goes through an ordered list of [`Middleware`]. The request
//! stage runs in order before the [`HttpSender`], the response stage runs in the same
//! order afterwards. Any stage may short-circuit with a final result.

pub mod auth;
pub mod client;
pub mod notice;
pub mod recovery;
pub mod sender;

pub use auth::BearerAuthMiddleware;
pub use client::{ApiClient, ApiClientBuilder};
pub use notice::ErrorNoticeMiddleware;
pub use recovery::SessionRecoveryMiddleware;
pub use sender::{HttpSender, ReqwestSender};

use async_trait::async_trait;
use bytes::Bytes;
use mcpdesk_core::{DeskError, DeskResult, ErrorContext};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// An outbound call, relative to the API base URL
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> DeskResult<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn with_query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
}

/// A response as received, whatever its status
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> DeskResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Server-provided explanation: `detail`, then `message`, then the raw body
    pub fn error_message(&self) -> Option<String> {
        if let Ok(value) = serde_json::from_slice::<Value>(&self.body) {
            for field in ["detail", "message"] {
                if let Some(text) = value.get(field).and_then(Value::as_str) {
                    if !text.trim().is_empty() {
                        return Some(text.to_string());
                    }
                }
            }
            return None;
        }

        let text = self.text();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

/// Session as observed by the request stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionMark {
    pub generation: u64,
    pub authenticated: bool,
}

/// Per-call state shared between the stages of one request
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub method: Method,
    pub path: String,
    /// Set by the first middleware that reads the session
    pub session: Option<SessionMark>,
}

impl RequestContext {
    pub fn new(request: &HttpRequest) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            method: request.method.clone(),
            path: request.path.clone(),
            session: None,
        }
    }
}

/// What a middleware stage wants the dispatcher to do next
#[derive(Debug)]
pub enum Flow<T> {
    /// Hand the (possibly modified) value to the next stage
    Continue(T),
    /// Stop the chain and resolve the call with this result
    Respond(DeskResult<HttpResponse>),
}

#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_request(
        &self,
        request: HttpRequest,
        _ctx: &mut RequestContext,
    ) -> Flow<HttpRequest> {
        Flow::Continue(request)
    }

    async fn on_response(
        &self,
        result: DeskResult<HttpResponse>,
        _ctx: &RequestContext,
    ) -> Flow<DeskResult<HttpResponse>> {
        Flow::Continue(result)
    }
}

/// Turn a non-2xx response into the matching error
pub fn error_for_status(response: HttpResponse, ctx: &RequestContext) -> DeskResult<HttpResponse> {
    if response.is_success() {
        return Ok(response);
    }

    let status = response.status;
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown error");
    let message = response
        .error_message()
        .unwrap_or_else(|| reason.to_string());

    let context = ErrorContext::new("api_client")
        .with_operation(&format!("{} {}", ctx.method, ctx.path))
        .with_metadata("request_id", &ctx.request_id);

    if status == 401 {
        return Err(DeskError::Unauthorized {
            message,
            context: context.with_suggestion("Log in again with 'mcpdesk login'"),
        });
    }

    Err(DeskError::Status {
        status,
        message,
        context: context.with_suggestion(match status {
            403 => "This action requires more privileges than the current account has",
            404 => "Check the resource id and the configured API prefix",
            s if s >= 500 => "The backend failed, check its logs and retry",
            _ => "Check the request parameters",
        }),
    })
}

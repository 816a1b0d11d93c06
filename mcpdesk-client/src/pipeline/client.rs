//! Dispatcher running the middleware chain around the sender

use super::{
    error_for_status, BearerAuthMiddleware, ErrorNoticeMiddleware, Flow, HttpRequest,
    HttpResponse, HttpSender, Middleware, RequestContext, SessionRecoveryMiddleware,
};
use crate::navigation::Navigator;
use crate::notify::Notifier;
use crate::session::SessionStore;
use mcpdesk_core::{DeskError, DeskResult, ErrorContext};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct ApiClient {
    sender: Arc<dyn HttpSender>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl ApiClient {
    pub fn builder(sender: Arc<dyn HttpSender>) -> ApiClientBuilder {
        ApiClientBuilder {
            sender,
            middleware: Vec::new(),
        }
    }

    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }

    /// Run `request` through the chain
    ///
    /// Non-2xx responses resolve as errors: `Unauthorized` for 401, `Status` otherwise.
    /// Failures without a response keep their original error.
    pub async fn execute(&self, request: HttpRequest) -> DeskResult<HttpResponse> {
        let mut ctx = RequestContext::new(&request);
        let mut request = request;

        for middleware in &self.middleware {
            match middleware.on_request(request, &mut ctx).await {
                Flow::Continue(next) => request = next,
                Flow::Respond(result) => {
                    debug!(
                        request_id = %ctx.request_id,
                        middleware = middleware.name(),
                        "Request short-circuited"
                    );
                    return result;
                }
            }
        }

        let mut result = match self.sender.send(request).await {
            Ok(response) => error_for_status(response, &ctx),
            Err(e) => Err(e),
        };

        for middleware in &self.middleware {
            match middleware.on_response(result, &ctx).await {
                Flow::Continue(next) => result = next,
                Flow::Respond(final_result) => {
                    result = final_result;
                    break;
                }
            }
        }

        if let Err(e) = &result {
            warn!(
                request_id = %ctx.request_id,
                method = %ctx.method,
                path = %ctx.path,
                error = %e,
                "Request failed"
            );
        }
        result
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: HttpRequest) -> DeskResult<T> {
        let response = self.execute(request).await?;
        response.json().map_err(|e| DeskError::Validation {
            message: format!("Unexpected response body: {}", e),
            field: None,
            context: ErrorContext::new("api_client")
                .with_operation("decode")
                .with_metadata("status", &response.status.to_string()),
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> DeskResult<T> {
        self.send_json(HttpRequest::get(path)).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> DeskResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(HttpRequest::post(path).with_json(body)?).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> DeskResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(HttpRequest::put(path).with_json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> DeskResult<HttpResponse> {
        self.execute(HttpRequest::delete(path)).await
    }
}

pub struct ApiClientBuilder {
    sender: Arc<dyn HttpSender>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl ApiClientBuilder {
    pub fn with(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Bearer injection, session recovery and error notices, in that order
    pub fn with_session(
        self,
        store: Arc<SessionStore>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        login_path: &str,
    ) -> Self {
        self.with(Arc::new(BearerAuthMiddleware::new(store.clone())))
            .with(Arc::new(SessionRecoveryMiddleware::new(
                store,
                notifier.clone(),
                navigator,
                login_path,
            )))
            .with(Arc::new(ErrorNoticeMiddleware::new(notifier)))
    }

    pub fn build(self) -> ApiClient {
        ApiClient {
            sender: self.sender,
            middleware: self.middleware,
        }
    }
}

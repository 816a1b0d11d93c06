//! Inbound stage: tell the operator about failed calls

use super::{Flow, HttpResponse, Middleware, RequestContext};
use crate::notify::{Notice, Notifier};
use async_trait::async_trait;
use mcpdesk_core::{DeskError, DeskResult};
use std::sync::Arc;

/// Raises an error notice for failed calls and lets the error continue
///
/// 401 is left to session recovery.
pub struct ErrorNoticeMiddleware {
    notifier: Arc<dyn Notifier>,
}

impl ErrorNoticeMiddleware {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

pub const NO_RESPONSE_MESSAGE: &str =
    "The server did not respond, please check the network connection";

pub fn notice_message(status: u16, server_message: &str) -> String {
    match status {
        403 => "You do not have permission to access this resource".to_string(),
        404 => "The requested resource does not exist".to_string(),
        500 => "Internal server error".to_string(),
        _ if !server_message.trim().is_empty() => server_message.to_string(),
        _ => "Request failed, please try again later".to_string(),
    }
}

#[async_trait]
impl Middleware for ErrorNoticeMiddleware {
    fn name(&self) -> &'static str {
        "error_notice"
    }

    async fn on_response(
        &self,
        result: DeskResult<HttpResponse>,
        _ctx: &RequestContext,
    ) -> Flow<DeskResult<HttpResponse>> {
        match &result {
            Err(DeskError::Status {
                status, message, ..
            }) => {
                self.notifier
                    .notify(Notice::error("Error", notice_message(*status, message)));
            }
            Err(DeskError::Network { .. } | DeskError::Timeout { .. }) => {
                self.notifier
                    .notify(Notice::error("Error", NO_RESPONSE_MESSAGE));
            }
            _ => {}
        }
        Flow::Continue(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NoticeLog;
    use crate::pipeline::HttpRequest;
    use mcpdesk_core::ErrorContext;

    fn status(status: u16, message: &str) -> DeskResult<HttpResponse> {
        Err(DeskError::Status {
            status,
            message: message.to_string(),
            context: ErrorContext::new("test"),
        })
    }

    #[test]
    fn test_notice_message_by_status() {
        assert_eq!(
            notice_message(403, "whatever"),
            "You do not have permission to access this resource"
        );
        assert_eq!(notice_message(404, ""), "The requested resource does not exist");
        assert_eq!(notice_message(500, "trace"), "Internal server error");
        assert_eq!(notice_message(422, "module_id is required"), "module_id is required");
        assert_eq!(notice_message(502, " "), "Request failed, please try again later");
    }

    #[tokio::test]
    async fn test_notifies_and_propagates() {
        let log = Arc::new(NoticeLog::new());
        let middleware = ErrorNoticeMiddleware::new(log.clone());
        let ctx = RequestContext::new(&HttpRequest::get("/x"));

        let flow = middleware.on_response(status(403, "denied"), &ctx).await;
        assert!(matches!(flow, Flow::Continue(Err(DeskError::Status { status: 403, .. }))));

        let flow = middleware
            .on_response(Ok(HttpResponse::new(200, "{}")), &ctx)
            .await;
        assert!(matches!(flow, Flow::Continue(Ok(_))));

        let network = Err(DeskError::Network {
            message: "refused".to_string(),
            source: None,
            context: ErrorContext::new("test"),
        });
        let flow = middleware.on_response(network, &ctx).await;
        assert!(matches!(flow, Flow::Continue(Err(DeskError::Network { .. }))));

        let unauthorized = Err(DeskError::Unauthorized {
            message: "token expired".to_string(),
            context: ErrorContext::new("test"),
        });
        middleware.on_response(unauthorized, &ctx).await;

        let notices = log.notices();
        assert_eq!(notices.len(), 2);
        assert_eq!(
            notices[0].message,
            "You do not have permission to access this resource"
        );
        assert_eq!(notices[1].message, NO_RESPONSE_MESSAGE);
    }

    #[tokio::test]
    async fn test_timeout_notifies_no_response() {
        let log = Arc::new(NoticeLog::new());
        let middleware = ErrorNoticeMiddleware::new(log.clone());
        let ctx = RequestContext::new(&HttpRequest::get("/x"));

        let timeout = Err(DeskError::Timeout {
            operation: "http_request".to_string(),
            duration_ms: 30_000,
            context: ErrorContext::new("test"),
        });
        let flow = middleware.on_response(timeout, &ctx).await;

        assert!(matches!(flow, Flow::Continue(Err(DeskError::Timeout { .. }))));
        assert_eq!(log.notices()[0].message, NO_RESPONSE_MESSAGE);
    }
}

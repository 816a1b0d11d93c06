//! Outbound stage: attach the session credential

use super::{Flow, HttpRequest, Middleware, RequestContext, SessionMark};
use crate::session::SessionStore;
use async_trait::async_trait;
use mcpdesk_core::{token_fingerprint, DeskError, ErrorContext};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use std::sync::Arc;
use tracing::debug;

/// Sets `Authorization: Bearer <token>` when the store holds a credential
///
/// Also records the session generation the request was sent under, which recovery
/// uses to tell a current session from a replaced one.
pub struct BearerAuthMiddleware {
    store: Arc<SessionStore>,
}

impl BearerAuthMiddleware {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Middleware for BearerAuthMiddleware {
    fn name(&self) -> &'static str {
        "bearer_auth"
    }

    async fn on_request(
        &self,
        mut request: HttpRequest,
        ctx: &mut RequestContext,
    ) -> Flow<HttpRequest> {
        let snapshot = self.store.snapshot();
        ctx.session = Some(SessionMark {
            generation: snapshot.generation,
            authenticated: snapshot.is_authenticated(),
        });

        let Some(credential) = snapshot.credential else {
            request.headers.remove(AUTHORIZATION);
            return Flow::Continue(request);
        };

        match HeaderValue::from_str(&credential.bearer()) {
            Ok(mut value) => {
                value.set_sensitive(true);
                request.headers.insert(AUTHORIZATION, value);
                debug!(
                    request_id = %ctx.request_id,
                    token = %token_fingerprint(&credential.token),
                    "Attached bearer credential"
                );
                Flow::Continue(request)
            }
            Err(e) => Flow::Respond(Err(DeskError::Validation {
                message: format!("Stored token cannot be sent as a header: {}", e),
                field: Some("token".to_string()),
                context: ErrorContext::new("bearer_auth")
                    .with_operation("on_request")
                    .with_suggestion("Log out and log in again"),
            })),
        }
    }
}

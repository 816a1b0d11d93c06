//! Inbound stage: recover from a rejected session
//!
//! A 401 ends the session it was sent under. The store's generation check makes the
//! clear atomic, so however many requests fail together only one of them notifies
//! the operator and replaces the current view with the login view.

use super::{Flow, HttpRequest, HttpResponse, Middleware, RequestContext, SessionMark};
use crate::navigation::Navigator;
use crate::notify::{Notice, Notifier};
use crate::session::{Invalidation, SessionStore};
use async_trait::async_trait;
use mcpdesk_core::DeskResult;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct SessionRecoveryMiddleware {
    store: Arc<SessionStore>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    episodes: AtomicU64,
}

impl SessionRecoveryMiddleware {
    pub fn new(
        store: Arc<SessionStore>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        login_path: impl Into<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            navigator,
            login_path: login_path.into(),
            episodes: AtomicU64::new(0),
        }
    }

    /// Number of recoveries that actually cleared a session
    pub fn episodes(&self) -> u64 {
        self.episodes.load(Ordering::SeqCst)
    }

    fn recover(&self, mark: SessionMark, ctx: &RequestContext) {
        if !mark.authenticated {
            debug!(
                request_id = %ctx.request_id,
                "401 for a request sent without a session, nothing to recover"
            );
            return;
        }

        match self.store.invalidate(mark.generation) {
            Invalidation::Stale => {
                debug!(
                    request_id = %ctx.request_id,
                    generation = mark.generation,
                    "Session already recovered or replaced"
                );
            }
            Invalidation::Cleared(previous) => {
                let episode = self.episodes.fetch_add(1, Ordering::SeqCst) + 1;
                warn!(
                    request_id = %ctx.request_id,
                    user_id = ?previous.as_ref().map(|c| c.user_id.as_str()),
                    episode,
                    "Session rejected by the backend, returning to login"
                );

                self.notifier.notify(Notice::session_expired());
                if let Err(e) = self.navigator.replace(&self.login_path) {
                    error!(error = %e, "Failed to navigate to the login view");
                }
            }
        }
    }
}

#[async_trait]
impl Middleware for SessionRecoveryMiddleware {
    fn name(&self) -> &'static str {
        "session_recovery"
    }

    async fn on_request(
        &self,
        request: HttpRequest,
        ctx: &mut RequestContext,
    ) -> Flow<HttpRequest> {
        if ctx.session.is_none() {
            let snapshot = self.store.snapshot();
            ctx.session = Some(SessionMark {
                generation: snapshot.generation,
                authenticated: snapshot.is_authenticated(),
            });
        }
        Flow::Continue(request)
    }

    async fn on_response(
        &self,
        result: DeskResult<HttpResponse>,
        ctx: &RequestContext,
    ) -> Flow<DeskResult<HttpResponse>> {
        match result {
            Err(e) if e.is_unauthorized() => {
                if let Some(mark) = ctx.session {
                    self.recover(mark, ctx);
                }
                // handled here, later stages never see the 401
                Flow::Respond(Err(e))
            }
            other => Flow::Continue(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::NavigationOutcome;
    use crate::notify::NoticeLog;
    use crate::session::MemoryStorage;
    use mcpdesk_core::{DeskError, ErrorContext, SessionCredential};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNavigator {
        replaced: Mutex<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn push(&self, path: &str) -> DeskResult<NavigationOutcome> {
            panic!("recovery must not push {path}")
        }

        fn replace(&self, path: &str) -> DeskResult<NavigationOutcome> {
            self.replaced.lock().unwrap().push(path.to_string());
            Ok(NavigationOutcome {
                requested: path.to_string(),
                landed: path.to_string(),
                decisions: vec![],
            })
        }
    }

    struct Fixture {
        store: Arc<SessionStore>,
        notices: Arc<NoticeLog>,
        navigator: Arc<RecordingNavigator>,
        middleware: SessionRecoveryMiddleware,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(SessionStore::new(Arc::new(MemoryStorage::new()), "userInfo"));
        let notices = Arc::new(NoticeLog::new());
        let navigator = Arc::new(RecordingNavigator::default());
        let middleware = SessionRecoveryMiddleware::new(
            store.clone(),
            notices.clone(),
            navigator.clone(),
            "/login",
        );
        Fixture {
            store,
            notices,
            navigator,
            middleware,
        }
    }

    fn unauthorized() -> DeskResult<HttpResponse> {
        Err(DeskError::Unauthorized {
            message: "token expired".to_string(),
            context: ErrorContext::new("test"),
        })
    }

    async fn observe(fixture: &Fixture) -> RequestContext {
        let request = HttpRequest::get("/x");
        let mut ctx = RequestContext::new(&request);
        fixture.middleware.on_request(request, &mut ctx).await;
        ctx
    }

    #[tokio::test]
    async fn test_401_recovers_once_per_generation() {
        let f = fixture();
        f.store.save(&SessionCredential::new("1", "tok", false)).unwrap();

        let first = observe(&f).await;
        let second = observe(&f).await;

        for ctx in [&first, &second] {
            let flow = f.middleware.on_response(unauthorized(), ctx).await;
            assert!(matches!(flow, Flow::Respond(Err(DeskError::Unauthorized { .. }))));
        }

        assert!(!f.store.is_authenticated());
        assert_eq!(f.middleware.episodes(), 1);
        assert_eq!(f.notices.notices(), vec![Notice::session_expired()]);
        assert_eq!(*f.navigator.replaced.lock().unwrap(), vec!["/login".to_string()]);
    }

    #[tokio::test]
    async fn test_stale_401_keeps_newer_login() {
        let f = fixture();
        f.store.save(&SessionCredential::new("1", "old", false)).unwrap();
        let ctx = observe(&f).await;

        f.store.save(&SessionCredential::new("1", "new", false)).unwrap();
        f.middleware.on_response(unauthorized(), &ctx).await;

        assert_eq!(f.store.load().map(|c| c.token).as_deref(), Some("new"));
        assert_eq!(f.middleware.episodes(), 0);
        assert!(f.notices.notices().is_empty());
    }

    #[tokio::test]
    async fn test_anonymous_401_only_rejects() {
        let f = fixture();
        let ctx = observe(&f).await;

        let flow = f.middleware.on_response(unauthorized(), &ctx).await;
        assert!(matches!(flow, Flow::Respond(Err(_))));
        assert_eq!(f.middleware.episodes(), 0);
        assert!(f.navigator.replaced.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_results_pass_through() {
        let f = fixture();
        f.store.save(&SessionCredential::new("1", "tok", false)).unwrap();
        let ctx = observe(&f).await;

        let ok = f
            .middleware
            .on_response(Ok(HttpResponse::new(200, "{}")), &ctx)
            .await;
        assert!(matches!(ok, Flow::Continue(Ok(_))));

        let forbidden = Err(DeskError::Status {
            status: 403,
            message: "no".to_string(),
            context: ErrorContext::new("test"),
        });
        let flow = f.middleware.on_response(forbidden, &ctx).await;
        assert!(matches!(flow, Flow::Continue(Err(DeskError::Status { status: 403, .. }))));
        assert!(f.store.is_authenticated());
    }
}

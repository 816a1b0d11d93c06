//! MCP Desk Client - the session-aware core of the admin console
//!
//! Session store, request pipeline with 401 recovery, navigation guard and router,
//! and the event-stream transport used to probe hosted services.

pub mod api;
pub mod desk;
pub mod navigation;
pub mod notify;
pub mod pipeline;
pub mod session;
pub mod transport;

pub use desk::{DeskClient, DeskClientBuilder};
pub use navigation::{NavigationDecision, NavigationGuard, Navigator, Router, RouteTable};
pub use notify::{Notice, NoticeLevel, NoticeLog, Notifier, TracingNotifier};
pub use pipeline::{ApiClient, HttpRequest, HttpResponse, HttpSender, Middleware};
pub use session::{FileStorage, KeyValueStorage, MemoryStorage, SessionStore};
pub use transport::{ProbeResult, TransportConnector, TransportHandle, TransportProbe};

//! Route-access state machine
//!
//! The route table declares what each view requires, the guard decides, and the
//! router applies the decision to its history.

pub mod guard;
pub mod router;
pub mod routes;

pub use guard::{decide, NavigationDecision, NavigationGuard, SessionFlags};
pub use router::{HistoryMode, NavigationOutcome, Navigator, Router};
pub use routes::{ResolvedRoute, RouteAccessMeta, RouteRecord, RouteTable};

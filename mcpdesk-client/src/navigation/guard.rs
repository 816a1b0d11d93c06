//! Navigation guard
//!
//! Decides whether a view may render given the session and the view's access meta.
//! Pure: the caller supplies a fresh session snapshot on every navigation attempt.

use super::routes::{RouteAccessMeta, RouteRecord};
use crate::session::SessionSnapshot;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavigationDecision {
    Allow,
    RedirectLogin,
    RedirectHome,
}

/// The two session booleans the guard depends on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionFlags {
    pub authenticated: bool,
    pub is_admin: bool,
}

impl From<&SessionSnapshot> for SessionFlags {
    fn from(snapshot: &SessionSnapshot) -> Self {
        Self {
            authenticated: snapshot.is_authenticated(),
            is_admin: snapshot.is_admin(),
        }
    }
}

/// The transition table
///
/// | authenticated | public | admin_only | is_admin | decision |
/// |---|---|---|---|---|
/// | any | true | - | - | allow (home instead of the login view when authenticated) |
/// | false | false | - | - | redirect to login |
/// | true | false | false | - | allow |
/// | true | false | true | false | redirect to home |
/// | true | false | true | true | allow |
pub fn decide(
    session: SessionFlags,
    meta: RouteAccessMeta,
    is_login_view: bool,
) -> NavigationDecision {
    if meta.public {
        return if is_login_view && session.authenticated {
            NavigationDecision::RedirectHome
        } else {
            NavigationDecision::Allow
        };
    }

    if !session.authenticated {
        return NavigationDecision::RedirectLogin;
    }

    if meta.admin_only && !session.is_admin {
        return NavigationDecision::RedirectHome;
    }

    NavigationDecision::Allow
}

/// Binds [`decide`] to the configured login view
#[derive(Debug, Clone)]
pub struct NavigationGuard {
    login_path: String,
}

impl NavigationGuard {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
        }
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn evaluate(&self, session: SessionFlags, target: &RouteRecord) -> NavigationDecision {
        decide(session, target.meta, target.path == self.login_path)
    }
}

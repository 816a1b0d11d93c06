//! Router: history plus guard evaluation on every navigation attempt

use super::guard::{NavigationDecision, NavigationGuard, SessionFlags};
use super::routes::RouteTable;
use crate::session::SessionStore;
use mcpdesk_core::{DeskError, DeskResult, ErrorContext, NavigationConfig};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Guards can redirect to guarded views; a chain longer than this is a misconfigured table
const MAX_REDIRECTS: usize = 4;

/// Something that can move the operator to another view
pub trait Navigator: Send + Sync {
    /// Navigate, adding a history entry
    fn push(&self, path: &str) -> DeskResult<NavigationOutcome>;

    /// Navigate, replacing the current history entry
    fn replace(&self, path: &str) -> DeskResult<NavigationOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryMode {
    Push,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationOutcome {
    pub requested: String,
    /// Path that was finally rendered
    pub landed: String,
    /// Guard decisions in the order they were taken, the last one is always `Allow`
    pub decisions: Vec<NavigationDecision>,
}

impl NavigationOutcome {
    pub fn was_redirected(&self) -> bool {
        self.decisions.len() > 1
    }
}

#[derive(Debug, Default)]
struct RouterState {
    history: Vec<String>,
}

pub struct Router {
    table: RouteTable,
    guard: NavigationGuard,
    store: Arc<SessionStore>,
    home_path: String,
    title_suffix: String,
    state: Mutex<RouterState>,
}

impl Router {
    pub fn new(table: RouteTable, store: Arc<SessionStore>, config: &NavigationConfig) -> Self {
        Self {
            table,
            guard: NavigationGuard::new(config.login_path.clone()),
            store,
            home_path: config.home_path.clone(),
            title_suffix: config.title_suffix.clone(),
            state: Mutex::new(RouterState::default()),
        }
    }

    /// Router over the default admin console views
    pub fn admin_console(store: Arc<SessionStore>, config: &NavigationConfig) -> Self {
        let table = RouteTable::admin_console(&config.login_path, &config.home_path);
        Self::new(table, store, config)
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn login_path(&self) -> &str {
        self.guard.login_path()
    }

    /// Evaluate the guard for `path` without navigating
    pub fn check(&self, path: &str) -> DeskResult<NavigationDecision> {
        let resolved = self.table.resolve(path).ok_or_else(|| not_found(path))?;
        let snapshot = self.store.snapshot();
        Ok(self
            .guard
            .evaluate(SessionFlags::from(&snapshot), resolved.record))
    }

    pub fn navigate(&self, path: &str, mode: HistoryMode) -> DeskResult<NavigationOutcome> {
        let mut target = path.to_string();
        let mut decisions = Vec::new();

        for _ in 0..=MAX_REDIRECTS {
            let resolved = self.table.resolve(&target).ok_or_else(|| not_found(&target))?;
            // never cached: the session may have changed since the last attempt
            let snapshot = self.store.snapshot();
            let decision = self
                .guard
                .evaluate(SessionFlags::from(&snapshot), resolved.record);
            decisions.push(decision);

            match decision {
                NavigationDecision::Allow => {
                    self.commit(resolved.path.clone(), mode);
                    info!(requested = %path, landed = %resolved.path, ?mode, "Navigated");
                    return Ok(NavigationOutcome {
                        requested: path.to_string(),
                        landed: resolved.path,
                        decisions,
                    });
                }
                NavigationDecision::RedirectLogin => {
                    debug!(from = %resolved.path, "Guard redirected to login");
                    target = self.guard.login_path().to_string();
                }
                NavigationDecision::RedirectHome => {
                    debug!(from = %resolved.path, "Guard redirected to home");
                    target = self.home_path.clone();
                }
            }
        }

        Err(DeskError::Navigation {
            path: path.to_string(),
            context: ErrorContext::new("router")
                .with_operation("navigate")
                .with_metadata("redirects", &decisions.len().to_string())
                .with_suggestion("Check that the login view is public in the route table"),
        })
    }

    pub fn current(&self) -> Option<String> {
        self.lock().history.last().cloned()
    }

    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    /// Page title of the current view
    pub fn title(&self) -> String {
        let title = self
            .current()
            .and_then(|path| self.table.resolve(&path))
            .and_then(|resolved| resolved.record.title.clone());

        match title {
            Some(title) => format!("{} - {}", title, self.title_suffix),
            None => self.title_suffix.clone(),
        }
    }

    fn commit(&self, path: String, mode: HistoryMode) {
        let mut state = self.lock();
        match (mode, state.history.last_mut()) {
            (HistoryMode::Replace, Some(last)) => *last = path,
            _ => state.history.push(path),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RouterState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Navigator for Router {
    fn push(&self, path: &str) -> DeskResult<NavigationOutcome> {
        self.navigate(path, HistoryMode::Push)
    }

    fn replace(&self, path: &str) -> DeskResult<NavigationOutcome> {
        self.navigate(path, HistoryMode::Replace)
    }
}

fn not_found(path: &str) -> DeskError {
    DeskError::Navigation {
        path: path.to_string(),
        context: ErrorContext::new("router")
            .with_operation("resolve")
            .with_suggestion("Run 'mcpdesk routes' to list known views"),
    }
}

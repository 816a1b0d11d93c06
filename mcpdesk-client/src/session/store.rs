//! Session store: the single source of truth for "am I authenticated, am I admin"

use super::storage::KeyValueStorage;
use mcpdesk_core::{token_fingerprint, DeskError, DeskResult, ErrorContext, SessionCredential};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// A consistent view of the session at one instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Bumped on every save and clear
    pub generation: u64,
    pub credential: Option<SessionCredential>,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.credential.as_ref().is_some_and(|c| c.is_admin)
    }
}

/// Result of a generation-checked invalidation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// The session changed since the caller observed it; nothing was done
    Stale,
    /// The session was cleared; carries the credential that was live, if any
    Cleared(Option<SessionCredential>),
}

#[derive(Debug, Default)]
struct StoreState {
    generation: u64,
    /// Set once the session is cleared; hides an entry that storage failed to remove
    cleared: bool,
}

/// Holds at most one credential, persisted under a single storage key
pub struct SessionStore {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
    state: Mutex<StoreState>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the persisted credential
    ///
    /// Never fails: unreadable or malformed data is purged and reported as absent.
    pub fn load(&self) -> Option<SessionCredential> {
        let state = self.lock();
        self.load_locked(&state)
    }

    /// Persist a credential, replacing any previous one
    pub fn save(&self, credential: &SessionCredential) -> DeskResult<()> {
        if !credential.is_well_formed() {
            return Err(DeskError::Validation {
                message: "credential must carry a user id and a header-safe token".to_string(),
                field: Some("credential".to_string()),
                context: ErrorContext::new("session_store").with_operation("save"),
            });
        }

        let serialized = serde_json::to_string(credential)?;

        let mut state = self.lock();
        self.storage.set(&self.key, &serialized)?;
        state.generation += 1;
        state.cleared = false;

        info!(
            user_id = %credential.user_id,
            is_admin = credential.is_admin,
            token = %token_fingerprint(&credential.token),
            "Session saved"
        );
        Ok(())
    }

    /// Drop the credential
    ///
    /// The session reads as absent afterwards even when removing the entry fails.
    pub fn clear(&self) -> DeskResult<()> {
        let mut state = self.lock();
        state.generation += 1;
        state.cleared = true;
        self.storage.remove(&self.key)?;

        info!("Session cleared");
        Ok(())
    }

    /// Generation and credential read under one lock
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            generation: state.generation,
            credential: self.load_locked(&state),
        }
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn is_authenticated(&self) -> bool {
        self.load().is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.load().is_some_and(|c| c.is_admin)
    }

    /// Clear the session only if it is still at `observed_generation`
    ///
    /// Check and clear happen under one lock, so among any number of callers that
    /// observed the same generation exactly one gets `Cleared`.
    pub fn invalidate(&self, observed_generation: u64) -> Invalidation {
        let mut state = self.lock();
        if state.generation != observed_generation {
            debug!(
                observed = observed_generation,
                current = state.generation,
                "Skipping invalidation of a newer session"
            );
            return Invalidation::Stale;
        }

        let credential = self.load_locked(&state);
        state.generation += 1;
        state.cleared = true;
        if let Err(e) = self.storage.remove(&self.key) {
            warn!(error = %e, "Failed to remove persisted session during invalidation");
        }

        info!(
            user_id = ?credential.as_ref().map(|c| c.user_id.as_str()),
            "Session invalidated"
        );
        Invalidation::Cleared(credential)
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // the guarded state is always valid, even after a panic elsewhere
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Takes the held state guard so it cannot be called without the lock
    fn load_locked(&self, state: &StoreState) -> Option<SessionCredential> {
        if state.cleared {
            return None;
        }

        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) if is_undecodable(&e) => {
                warn!(error = %e, "Persisted session is undecodable, purging it");
                self.purge_locked();
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read persisted session, treating as absent");
                return None;
            }
        };

        match serde_json::from_str::<SessionCredential>(&raw) {
            Ok(credential) if credential.is_well_formed() => Some(credential),
            Ok(_) => {
                warn!("Persisted session is malformed, purging it");
                self.purge_locked();
                None
            }
            Err(e) => {
                warn!(error = %e, "Persisted session is corrupt, purging it");
                self.purge_locked();
                None
            }
        }
    }

    fn purge_locked(&self) {
        if let Err(e) = self.storage.remove(&self.key) {
            warn!(error = %e, "Failed to purge corrupt session entry");
        }
    }
}

/// Storage reports bytes it could read but not decode as a `value` validation error
fn is_undecodable(error: &DeskError) -> bool {
    matches!(error, DeskError::Validation { field: Some(field), .. } if field == "value")
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("key", &self.key)
            .field("generation", &self.generation())
            .finish()
    }
}

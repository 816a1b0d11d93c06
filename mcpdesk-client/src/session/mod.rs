//! Session management
//!
//! Persists the operator's credential and exposes consistent snapshots of it.

pub mod storage;
pub mod store;

pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use store::{Invalidation, SessionSnapshot, SessionStore};

//! MCP Desk Core - shared data structures and infrastructure
//!
//! Error handling, logging, configuration and the types shared by the admin client crates

pub mod async_utils;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use async_utils::*;
pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tracing;

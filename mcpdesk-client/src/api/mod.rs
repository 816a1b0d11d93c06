//! Typed wrappers over the backend REST surface
//!
//! Every call goes through the [`ApiClient`](crate::pipeline::ApiClient) pipeline, so
//! they all carry the session credential and share 401 recovery.

pub mod auth;
pub mod service;

pub use auth::{AuthApi, CurrentUser, LoginResponse, TenantRef};
pub use service::{McpServiceApi, McpServiceInfo, McpStatus, ToolLoadRequest};

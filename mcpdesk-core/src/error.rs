//! Unified error handling system
//!
//! Provides structured error types with context, recovery suggestions, and proper error chaining

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

pub type DeskResult<T> = Result<T, DeskError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: std::collections::HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: std::collections::HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type for the admin client
#[derive(Error, Debug)]
pub enum DeskError {
    /// The backend rejected the session credential (HTTP 401)
    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
        context: ErrorContext,
    },

    /// Any other non-success HTTP status
    #[error("HTTP {status} error: {message}")]
    Status {
        status: u16,
        message: String,
        context: ErrorContext,
    },

    /// The request never produced a response
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Operation timeout: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },

    /// Event-stream connect, handshake or send failure
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("No route matches: {path}")]
    Navigation {
        path: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DeskError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            DeskError::Unauthorized { context, .. } => Some(context),
            DeskError::Status { context, .. } => Some(context),
            DeskError::Network { context, .. } => Some(context),
            DeskError::Timeout { context, .. } => Some(context),
            DeskError::Transport { context, .. } => Some(context),
            DeskError::Storage { context, .. } => Some(context),
            DeskError::Config { context, .. } => Some(context),
            DeskError::Navigation { context, .. } => Some(context),
            DeskError::Validation { context, .. } => Some(context),
            DeskError::Io(_) | DeskError::Serialization(_) => None,
        }
    }

    /// HTTP status carried by the error, if the backend answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            DeskError::Unauthorized { .. } => Some(401),
            DeskError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, DeskError::Unauthorized { .. })
    }

    /// Check if error is recoverable by trying again later
    pub fn is_recoverable(&self) -> bool {
        match self {
            DeskError::Network { .. } => true,
            DeskError::Timeout { .. } => true,
            DeskError::Transport { .. } => true,
            DeskError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Recovery suggestions attached to the error, empty when there is no context
    pub fn suggestions(&self) -> &[String] {
        self.context()
            .map(|c| c.recovery_suggestions.as_slice())
            .unwrap_or(&[])
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            DeskError::Config { .. } | DeskError::Validation { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Configuration or validation error"
                );
            }
            DeskError::Network { .. } | DeskError::Timeout { .. } | DeskError::Transport { .. } => {
                warn!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Network or transport error (may be recoverable)"
                );
            }
            DeskError::Unauthorized { .. } | DeskError::Navigation { .. } => {
                warn!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Access error"
                );
            }
            _ => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Error occurred"
                );
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::DeskError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file")
                .with_suggestion("Run 'mcpdesk config --init' to create default config"),
        }
    };
}

#[macro_export]
macro_rules! storage_error {
    ($msg:expr, $component:expr) => {
        $crate::DeskError::Storage {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::DeskError::Storage {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check that the session directory exists and is writable"),
        }
    };
}

#[macro_export]
macro_rules! transport_error {
    ($msg:expr, $component:expr) => {
        $crate::DeskError::Transport {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Verify the event-stream URL and that the service is running"),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::DeskError::Transport {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Verify the event-stream URL and that the service is running"),
        }
    };
}

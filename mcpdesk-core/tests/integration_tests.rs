//! Integration tests for mcpdesk-core infrastructure

use mcpdesk_core::{
    config_error, storage_error, transport_error, try_with_timeout, with_timeout, DeskConfig,
    DeskError, ErrorContext,
};
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test]
async fn test_error_handling() {
    let error = storage_error!("Disk full", "session_store");

    match &error {
        DeskError::Storage {
            message, context, ..
        } => {
            assert_eq!(message, "Disk full");
            assert_eq!(context.component, "session_store");
            assert!(!context.error_id.is_empty());
        }
        _ => panic!("Expected Storage error"),
    }

    // Should not panic
    error.log();

    let network_error = DeskError::Network {
        message: "Connection refused".to_string(),
        source: None,
        context: ErrorContext::new("test"),
    };
    assert!(network_error.is_recoverable());
    assert_eq!(network_error.status(), None);

    let unauthorized = DeskError::Unauthorized {
        message: "token expired".to_string(),
        context: ErrorContext::new("test"),
    };
    assert!(!unauthorized.is_recoverable());
    assert!(unauthorized.is_unauthorized());
    assert_eq!(unauthorized.status(), Some(401));

    let server_error = DeskError::Status {
        status: 503,
        message: "unavailable".to_string(),
        context: ErrorContext::new("test"),
    };
    assert!(server_error.is_recoverable());

    let config_err = config_error!("Invalid config", "test");
    assert!(!config_err.is_recoverable());
    assert_eq!(config_err.suggestions().len(), 2);
}

#[tokio::test]
async fn test_transport_error_macro_keeps_source() {
    let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
    let error = transport_error!("stream closed during handshake", "sse_transport", io);

    assert!(std::error::Error::source(&error).is_some());
    assert!(error.to_string().contains("stream closed during handshake"));
    assert!(!error.suggestions().is_empty());
}

#[tokio::test]
async fn test_timeout_mechanism() {
    let quick_operation = async {
        sleep(Duration::from_millis(10)).await;
        "Success"
    };

    let result = with_timeout(quick_operation, 500, "quick_test").await;
    assert_eq!(result.unwrap(), "Success");

    let slow_operation = async {
        sleep(Duration::from_millis(500)).await;
        "Should not reach here"
    };

    let result = with_timeout(slow_operation, 20, "slow_test").await;

    match result.unwrap_err() {
        DeskError::Timeout {
            operation,
            duration_ms,
            ..
        } => {
            assert_eq!(operation, "slow_test");
            assert_eq!(duration_ms, 20);
        }
        _ => panic!("Expected Timeout error"),
    }
}

#[tokio::test]
async fn test_try_with_timeout_flattens_inner_error() {
    let failing = async {
        Err::<(), _>(DeskError::Validation {
            message: "bad".to_string(),
            field: None,
            context: ErrorContext::new("test"),
        })
    };

    let result = try_with_timeout(failing, 100, "failing").await;
    assert!(matches!(result, Err(DeskError::Validation { .. })));
}

#[tokio::test]
async fn test_config_validation() {
    let mut config = DeskConfig::default();
    assert!(config.validate().is_ok());

    config.api.api_prefix = "api/v1".to_string();
    match config.validate().unwrap_err() {
        DeskError::Validation { field, .. } => {
            assert_eq!(field.as_deref(), Some("api.api_prefix"));
        }
        _ => panic!("Expected Validation error"),
    }
}

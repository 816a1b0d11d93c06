//! Shared fixtures for the client integration tests

#![allow(dead_code)]

use axum::Router;
use mcpdesk_client::{DeskClient, MemoryStorage, NoticeLog};
use mcpdesk_core::DeskConfig;
use std::sync::{Arc, LazyLock};
use tokio::net::TcpListener;

static TRACING: LazyLock<()> = LazyLock::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(std::io::sink)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
});

pub fn init_tracing() {
    LazyLock::force(&TRACING);
}

/// Serve `app` on an ephemeral port, returning its base address
pub async fn spawn_server(app: Router) -> String {
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server failed");
    });

    format!("http://127.0.0.1:{}", port)
}

pub struct TestDesk {
    pub client: DeskClient,
    pub notices: Arc<NoticeLog>,
}

/// A client against `base_url` with in-memory session storage and recorded notices
pub fn desk(base_url: &str) -> TestDesk {
    init_tracing();

    let mut config = DeskConfig::default();
    config.api.base_url = base_url.to_string();
    config.api.timeout_seconds = 5;
    config.transport.handshake_timeout_seconds = 2;
    config.transport.probe_timeout_seconds = 3;

    let notices = Arc::new(NoticeLog::new());
    let client = DeskClient::builder(config)
        .storage(Arc::new(MemoryStorage::new()))
        .notifier(notices.clone())
        .build()
        .expect("Failed to build client");

    TestDesk { client, notices }
}

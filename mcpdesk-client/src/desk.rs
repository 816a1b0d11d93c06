//! Composition root: one session store shared by the pipeline, router and probe

use crate::api::{AuthApi, McpServiceApi};
use crate::navigation::Router;
use crate::notify::{Notifier, TracingNotifier};
use crate::pipeline::{ApiClient, HttpSender, ReqwestSender};
use crate::session::{FileStorage, KeyValueStorage, SessionStore};
use crate::transport::{ProbeResult, SseConnector, TransportProbe};
use mcpdesk_core::{DeskConfig, DeskResult};
use std::sync::Arc;
use tracing::info;

pub struct DeskClient {
    config: DeskConfig,
    store: Arc<SessionStore>,
    router: Arc<Router>,
    api: ApiClient,
    auth: AuthApi,
    services: McpServiceApi,
    probe: TransportProbe<SseConnector>,
}

impl DeskClient {
    /// Client with file-backed session storage and notices routed to tracing
    pub fn from_config(config: DeskConfig) -> DeskResult<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: DeskConfig) -> DeskClientBuilder {
        DeskClientBuilder {
            config,
            storage: None,
            notifier: None,
            sender: None,
        }
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn auth(&self) -> &AuthApi {
        &self.auth
    }

    pub fn services(&self) -> &McpServiceApi {
        &self.services
    }

    /// Reachability test of an event-stream URL, with the current session's bearer
    pub async fn probe(&self, url: &str) -> ProbeResult {
        let credential = self.store.load();
        self.probe.test(url, credential.as_ref()).await
    }

    pub fn transport_probe(&self) -> &TransportProbe<SseConnector> {
        &self.probe
    }
}

pub struct DeskClientBuilder {
    config: DeskConfig,
    storage: Option<Arc<dyn KeyValueStorage>>,
    notifier: Option<Arc<dyn Notifier>>,
    sender: Option<Arc<dyn HttpSender>>,
}

impl DeskClientBuilder {
    pub fn storage(mut self, storage: Arc<dyn KeyValueStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn sender(mut self, sender: Arc<dyn HttpSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn build(self) -> DeskResult<DeskClient> {
        let config = self.config;
        config.validate()?;

        let storage: Arc<dyn KeyValueStorage> = match self.storage {
            Some(storage) => storage,
            None => Arc::new(FileStorage::new(config.session_dir())?),
        };
        let notifier: Arc<dyn Notifier> = match self.notifier {
            Some(notifier) => notifier,
            None => Arc::new(TracingNotifier),
        };
        let sender: Arc<dyn HttpSender> = match self.sender {
            Some(sender) => sender,
            None => Arc::new(ReqwestSender::new(&config.api)?),
        };

        let store = Arc::new(SessionStore::new(storage, config.session.storage_key.clone()));
        let router = Arc::new(Router::admin_console(store.clone(), &config.navigation));

        let api = ApiClient::builder(sender)
            .with_session(
                store.clone(),
                notifier,
                router.clone(),
                &config.navigation.login_path,
            )
            .build();

        let auth = AuthApi::new(api.clone(), store.clone());
        let services = McpServiceApi::new(api.clone(), &config.api.api_prefix);
        let probe = TransportProbe::from_config(
            SseConnector::new(&config.transport, &config.api.user_agent)?,
            &config.transport,
        );

        info!(
            base_url = %config.api.base_url,
            middleware = ?api.middleware_names(),
            "Admin client ready"
        );

        Ok(DeskClient {
            config,
            store,
            router,
            api,
            auth,
            services,
            probe,
        })
    }
}

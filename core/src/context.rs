use crate::config::AppConfig;
use crate::coordinator::Coordinator;
use crate::error::GatorError;
use crate::sink::ResultSink;
use crate::state::{spawn_sweeper, sweep, SweepReport, TaskManager, TaskStore};
use crate::tab::BrowserHost;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct Services {
    pub host: Arc<dyn BrowserHost>,
    pub store: Arc<dyn TaskStore>,
    pub sink: Option<Arc<dyn ResultSink>>,
}

#[async_trait::async_trait]
pub trait ServicesFactory: Send + Sync {
    async fn build_services(&self, cfg: &AppConfig) -> Result<Services, GatorError>;
}

#[derive(Clone)]
pub struct AppContext {
    cfg: AppConfig,
    services: Services,
    coordinator: Coordinator,
    shutdown: CancellationToken,
}

impl AppContext {
    pub async fn new(
        cfg: AppConfig,
        services_factory: Arc<dyn ServicesFactory>,
    ) -> Result<Self, GatorError> {
        let services = services_factory.build_services(&cfg).await?;
        Ok(Self::from_services(cfg, services))
    }

    /// Must be called from within a tokio runtime.
    pub fn from_services(cfg: AppConfig, services: Services) -> Self {
        let manager = TaskManager::new(services.store.clone());
        let coordinator = Coordinator::new(manager, services.host.clone(), &cfg);
        Self {
            cfg,
            services,
            coordinator,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn cfg(&self) -> &AppConfig {
        &self.cfg
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn manager(&self) -> &TaskManager {
        self.coordinator.manager()
    }

    pub fn sink(&self) -> Option<Arc<dyn ResultSink>> {
        self.services.sink.clone()
    }

    /// Starts the periodic store sweep; it stops on [`AppContext::shutdown`].
    pub fn start_sweeper(&self) -> tokio::task::JoinHandle<()> {
        spawn_sweeper(
            self.services.store.clone(),
            self.cfg.store.sweep_policy(),
            self.cfg.store.sweep_interval(),
            self.shutdown.child_token(),
        )
    }

    pub async fn sweep_now(&self) -> Result<SweepReport, GatorError> {
        Ok(sweep(
            self.services.store.as_ref(),
            chrono::Utc::now(),
            self.cfg.store.sweep_policy(),
        )
        .await?)
    }

    pub fn shutdown(&self) {
        self.coordinator.shutdown();
        self.shutdown.cancel();
    }
}

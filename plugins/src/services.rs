//! ServicesFactory implementation: builds the browser host, task store and result sink from config for the CLI.
use async_trait::async_trait;
use gator_core::api::{AppConfig, GatorError, Services, ServicesFactory};

use crate::factory;

#[derive(Default)]
pub struct PluginServicesFactory;

#[async_trait]
impl ServicesFactory for PluginServicesFactory {
    async fn build_services(&self, cfg: &AppConfig) -> Result<Services, GatorError> {
        let host = factory::build_host(cfg)?;
        let store = factory::build_store(cfg).await?;
        let sink = factory::build_sink(cfg)?;
        Ok(Services { host, store, sink })
    }
}

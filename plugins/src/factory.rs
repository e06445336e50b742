use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use gator_core::api::{
    AppConfig, BrowserHost, FileTaskStore, MemoryTaskStore, ResultSink, TaskStore,
};

use crate::host::HttpBrowserHost;
use crate::sink::HttpResultSink;

pub fn build_host(cfg: &AppConfig) -> Result<Arc<dyn BrowserHost>> {
    let timeout = Duration::from_millis(cfg.tabs.transcript_timeout_ms);
    Ok(Arc::new(HttpBrowserHost::new(timeout)?))
}

/// File-backed when a directory is configured; in-memory otherwise.
pub async fn build_store(cfg: &AppConfig) -> Result<Arc<dyn TaskStore>> {
    match cfg.store.directory.as_deref().map(str::trim) {
        Some(dir) if !dir.is_empty() => Ok(Arc::new(FileTaskStore::open(dir).await?)),
        _ => {
            tracing::warn!("no task store directory configured, task state will not survive restarts");
            Ok(Arc::new(MemoryTaskStore::new()))
        }
    }
}

pub fn build_sink(cfg: &AppConfig) -> Result<Option<Arc<dyn ResultSink>>> {
    if !cfg.backend.enabled {
        return Ok(None);
    }
    Ok(Some(Arc::new(HttpResultSink::new(cfg.backend.clone())?)))
}

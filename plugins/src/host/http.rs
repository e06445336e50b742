//! Browser host backed by plain HTTP fetches.
//!
//! Each "tab" is one fetched document. There is no script engine, so clicks
//! are reported as unsupported and pages that need interaction fall back to
//! whatever the server rendered.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use gator_core::api::{
    BrowserHost, ElementHandle, HostError, PageContext, PageSnapshot, TabId, TabInfo,
};

use crate::http_client::{preview_body, HttpError};

#[derive(Debug, Clone, Default)]
struct HttpTab {
    url: String,
    html: Option<String>,
}

type Tabs = Arc<Mutex<HashMap<TabId, HttpTab>>>;

pub struct HttpBrowserHost {
    http: reqwest::Client,
    tabs: Tabs,
    next_id: AtomicU64,
}

impl HttpBrowserHost {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("gator/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            tabs: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        })
    }

    async fn fetch(&self, url: &str) -> Result<(String, String), HostError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| HostError::Navigation(HttpError::from_reqwest(e, url).to_string()))?;
        let status = resp.status();
        let final_url = resp.url().to_string();
        let body = resp
            .text()
            .await
            .map_err(|e| HostError::Navigation(HttpError::from_reqwest(e, url).to_string()))?;

        if !status.is_success() {
            let err = HttpError::status_error(status.as_u16(), url, preview_body(&body));
            return Err(HostError::Navigation(err.to_string()));
        }
        Ok((final_url, body))
    }

    async fn tab(&self, tab: TabId) -> Result<HttpTab, HostError> {
        self.tabs
            .lock()
            .await
            .get(&tab)
            .cloned()
            .ok_or(HostError::TabGone(tab))
    }
}

#[async_trait]
impl BrowserHost for HttpBrowserHost {
    /// There is no user-facing tab to restore.
    async fn active_tab(&self) -> Result<Option<TabInfo>, HostError> {
        Ok(None)
    }

    async fn create_tab(&self, url: &str, _active: bool) -> Result<TabId, HostError> {
        let id = TabId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.tabs.lock().await.insert(
            id,
            HttpTab {
                url: url.to_string(),
                html: None,
            },
        );
        tracing::debug!(tab_id = %id, url = %url, "http tab created");
        Ok(id)
    }

    async fn wait_for_load(&self, tab: TabId) -> Result<(), HostError> {
        let current = self.tab(tab).await?;
        if current.html.is_some() {
            return Ok(());
        }

        let (final_url, html) = self.fetch(&current.url).await?;
        let mut tabs = self.tabs.lock().await;
        let entry = tabs.get_mut(&tab).ok_or(HostError::TabGone(tab))?;
        tracing::debug!(tab_id = %tab, url = %final_url, bytes = html.len(), "http tab loaded");
        entry.url = final_url;
        entry.html = Some(html);
        Ok(())
    }

    async fn remove_tab(&self, tab: TabId) -> Result<(), HostError> {
        self.tabs
            .lock()
            .await
            .remove(&tab)
            .map(|_| ())
            .ok_or(HostError::TabGone(tab))
    }

    async fn navigate(&self, tab: TabId, url: &str) -> Result<(), HostError> {
        let mut tabs = self.tabs.lock().await;
        let entry = tabs.get_mut(&tab).ok_or(HostError::TabGone(tab))?;
        entry.url = url.to_string();
        entry.html = None;
        Ok(())
    }

    async fn tab_url(&self, tab: TabId) -> Result<String, HostError> {
        Ok(self.tab(tab).await?.url)
    }

    async fn page(&self, tab: TabId) -> Result<Arc<dyn PageContext>, HostError> {
        self.tab(tab).await?;
        Ok(Arc::new(HttpPage {
            tab,
            tabs: self.tabs.clone(),
        }))
    }

    /// Parsing happens in-process, so a live tab always answers.
    async fn ping(&self, tab: TabId) -> bool {
        self.tabs.lock().await.contains_key(&tab)
    }

    async fn inject(&self, tab: TabId) -> Result<(), HostError> {
        self.tab(tab).await.map(|_| ())
    }
}

struct HttpPage {
    tab: TabId,
    tabs: Tabs,
}

#[async_trait]
impl PageContext for HttpPage {
    async fn snapshot(&self) -> Result<PageSnapshot, HostError> {
        let tabs = self.tabs.lock().await;
        let entry = tabs.get(&self.tab).ok_or(HostError::TabGone(self.tab))?;
        let html = entry.html.clone().ok_or_else(|| {
            HostError::Communication(format!("{} has not finished loading", self.tab))
        })?;
        Ok(PageSnapshot::new(entry.url.clone(), html))
    }

    async fn click(&self, target: &ElementHandle) -> Result<bool, HostError> {
        tracing::debug!(tab_id = %self.tab, target = %target, "click unsupported over http");
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn removed_tab_is_gone() {
        let host = HttpBrowserHost::new(Duration::from_secs(1)).unwrap();
        let tab = host.create_tab("http://127.0.0.1:9/x", false).await.unwrap();

        assert!(host.ping(tab).await);
        assert_eq!(host.tab_url(tab).await.unwrap(), "http://127.0.0.1:9/x");

        host.remove_tab(tab).await.unwrap();
        assert!(!host.ping(tab).await);
        assert!(matches!(host.remove_tab(tab).await, Err(HostError::TabGone(_))));
    }

    #[tokio::test]
    async fn snapshot_before_load_is_a_communication_error() {
        let host = HttpBrowserHost::new(Duration::from_secs(1)).unwrap();
        let tab = host.create_tab("http://127.0.0.1:9/x", false).await.unwrap();
        let page = host.page(tab).await.unwrap();

        assert!(matches!(page.snapshot().await, Err(HostError::Communication(_))));
        assert!(!page.click(&ElementHandle::new("button", 0)).await.unwrap());
    }
}

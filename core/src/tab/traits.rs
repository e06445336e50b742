use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::HostError;
use crate::extract::PageContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u64);

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tab#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
}

/// The browser the orchestrator drives.
///
/// `ping` checks whether the extraction listener is already present in a
/// tab; `inject` installs it.
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// Tab the user is looking at, if any.
    async fn active_tab(&self) -> Result<Option<TabInfo>, HostError>;

    async fn create_tab(&self, url: &str, active: bool) -> Result<TabId, HostError>;

    /// Resolves once the tab reports load completion.
    async fn wait_for_load(&self, tab: TabId) -> Result<(), HostError>;

    /// Fails with [`HostError::TabGone`] when the tab no longer exists.
    async fn remove_tab(&self, tab: TabId) -> Result<(), HostError>;

    async fn navigate(&self, tab: TabId, url: &str) -> Result<(), HostError>;

    async fn tab_url(&self, tab: TabId) -> Result<String, HostError>;

    async fn page(&self, tab: TabId) -> Result<Arc<dyn PageContext>, HostError>;

    async fn ping(&self, tab: TabId) -> bool;

    async fn inject(&self, tab: TabId) -> Result<(), HostError>;
}

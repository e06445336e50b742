//! Ephemeral tab lifecycle.
//!
//! A tab is opened in the background, given a listener, handed to the
//! caller's `on_loaded` callback, and removed exactly once whatever the
//! outcome. Tabs opened by a future that is dropped early are removed from
//! `Drop`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::traits::{BrowserHost, TabId, TabInfo};
use crate::error::{ErrorKind, HostError};
use crate::extract::{ExtractionFailure, ExtractionOutcome, PageContext};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EphemeralTabOptions {
    /// Wall-clock budget, counted from tab creation.
    pub timeout: Duration,
    /// Wait after the listener is ready, before `on_loaded` runs.
    pub settle: Duration,
    /// Put the user's tab back on its original URL after a success.
    pub restore_origin: bool,
}

impl Default for EphemeralTabOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(45),
            settle: Duration::from_secs(1),
            restore_origin: true,
        }
    }
}

/// Lifecycle hooks for the orchestrator.
#[async_trait]
pub trait TabLifecycleObserver: Send + Sync {
    async fn on_tab_opened(&self, _tab: TabId) {}
}

pub struct NoopTabObserver;

#[async_trait]
impl TabLifecycleObserver for NoopTabObserver {}

/// Ownership record for a tab created on behalf of a task.
pub struct ManagedTab {
    pub tab_id: TabId,
    pub task_id: String,
    pub created_at: DateTime<Utc>,
    host: Arc<dyn BrowserHost>,
    closed: AtomicBool,
}

impl ManagedTab {
    pub fn new(host: Arc<dyn BrowserHost>, tab_id: TabId, task_id: impl Into<String>) -> Self {
        Self {
            tab_id,
            task_id: task_id.into(),
            created_at: Utc::now(),
            host,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Removes the tab. Only the first call reaches the host; later calls
    /// return `false`. A tab that is already gone counts as closed.
    pub async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        match self.host.remove_tab(self.tab_id).await {
            Ok(()) => tracing::debug!(tab_id = %self.tab_id, task_id = %self.task_id, "tab closed"),
            Err(HostError::TabGone(_)) => {
                tracing::debug!(tab_id = %self.tab_id, "tab already gone")
            }
            Err(e) => tracing::warn!(tab_id = %self.tab_id, error = %e, "failed to close tab"),
        }
        true
    }
}

impl Drop for ManagedTab {
    // Reached when the owning future is dropped mid-flight (an outer cancel or
    // timeout won the race). The removal is handed to the runtime.
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(tab_id = %self.tab_id, "tab dropped outside a runtime, left open");
            return;
        };
        let host = self.host.clone();
        let tab = self.tab_id;
        tracing::debug!(tab_id = %tab, task_id = %self.task_id, "closing abandoned tab");
        handle.spawn(async move {
            if let Err(e) = host.remove_tab(tab).await {
                tracing::debug!(tab_id = %tab, error = %e, "abandoned tab close failed");
            }
        });
    }
}

fn host_failure(e: HostError) -> ExtractionFailure {
    ExtractionFailure::new(ErrorKind::CommunicationFailure, e.to_string())
}

fn cancelled_outcome<T>() -> ExtractionOutcome<T> {
    ExtractionOutcome::failure(ErrorKind::Cancelled, "Extraction cancelled")
}

#[derive(Clone)]
pub struct TabController {
    host: Arc<dyn BrowserHost>,
}

impl TabController {
    pub fn new(host: Arc<dyn BrowserHost>) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &Arc<dyn BrowserHost> {
        &self.host
    }

    /// Makes sure the extraction listener answers in `tab`. A failed
    /// injection is retried once.
    pub async fn ensure_listener(&self, tab: TabId) -> Result<(), ExtractionFailure> {
        if self.host.ping(tab).await {
            tracing::debug!(tab_id = %tab, "listener already present");
            return Ok(());
        }

        if let Err(first) = self.host.inject(tab).await {
            tracing::warn!(tab_id = %tab, error = %first, "injection failed, retrying once");
            self.host.inject(tab).await.map_err(|e| {
                ExtractionFailure::new(
                    ErrorKind::CommunicationFailure,
                    format!("Could not reach the page after re-injecting: {}", e),
                )
            })?;
        }
        Ok(())
    }

    /// Runs `on_loaded` against a background tab and always cleans up.
    ///
    /// Timeouts resolve as a recoverable `Timeout` failure. A cancel that
    /// lands while the tab is still being created closes the tab as soon as
    /// its id is known.
    pub async fn run_in_ephemeral_tab<T, F, Fut>(
        &self,
        task_id: &str,
        url: &str,
        opts: &EphemeralTabOptions,
        cancel: &CancellationToken,
        observer: &dyn TabLifecycleObserver,
        on_loaded: F,
    ) -> ExtractionOutcome<T>
    where
        F: FnOnce(Arc<dyn PageContext>) -> Fut,
        Fut: Future<Output = ExtractionOutcome<T>>,
    {
        if cancel.is_cancelled() {
            return cancelled_outcome();
        }

        let origin = if opts.restore_origin {
            self.host.active_tab().await.ok().flatten()
        } else {
            None
        };

        let managed = match self.host.create_tab(url, false).await {
            Ok(id) => ManagedTab::new(self.host.clone(), id, task_id),
            Err(e) => {
                tracing::error!(task_id, url = %url, error = %e, "failed to open tab");
                return ExtractionOutcome::Failure(host_failure(e));
            }
        };
        let tab = managed.tab_id;
        tracing::info!(task_id, tab_id = %tab, "tab opened");

        if cancel.is_cancelled() {
            managed.close().await;
            return cancelled_outcome();
        }
        observer.on_tab_opened(tab).await;

        let work = async {
            self.host.wait_for_load(tab).await.map_err(host_failure)?;
            self.ensure_listener(tab).await?;
            tokio::time::sleep(opts.settle).await;
            let page = self.host.page(tab).await.map_err(host_failure)?;
            Ok::<_, ExtractionFailure>(on_loaded(page).await)
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => cancelled_outcome(),
            res = tokio::time::timeout(opts.timeout, work) => match res {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(failure)) => ExtractionOutcome::Failure(failure),
                Err(_) => {
                    tracing::warn!(task_id, tab_id = %tab, timeout_ms = opts.timeout.as_millis() as u64, "tab timed out");
                    ExtractionOutcome::failure(
                        ErrorKind::Timeout,
                        format!("Timed out after {} seconds", opts.timeout.as_secs_f32()),
                    )
                }
            },
        };

        managed.close().await;

        if outcome.is_success() {
            if let Some(origin) = origin.filter(|o| o.id != tab) {
                self.restore(&origin).await;
            }
        }
        outcome
    }

    async fn restore(&self, origin: &TabInfo) {
        match self.host.tab_url(origin.id).await {
            Ok(current) if current == origin.url => {}
            Ok(_) => {
                if let Err(e) = self.host.navigate(origin.id, &origin.url).await {
                    tracing::warn!(tab_id = %origin.id, error = %e, "failed to restore original tab");
                }
            }
            Err(e) => tracing::debug!(tab_id = %origin.id, error = %e, "original tab unavailable"),
        }
    }
}

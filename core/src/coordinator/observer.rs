//! Mirrors tab and ladder progress into the persisted task.

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::extract::ExtractionFailure;
use crate::retry::LadderObserver;
use crate::state::{ExtractionTask, Progress, TaskManager, TaskStatus};
use crate::tab::{TabId, TabLifecycleObserver};

pub(crate) struct TaskObserver {
    manager: TaskManager,
    task_id: String,
    cancel: CancellationToken,
}

impl TaskObserver {
    pub(crate) fn new(manager: TaskManager, task_id: &str, cancel: CancellationToken) -> Self {
        Self {
            manager,
            task_id: task_id.to_string(),
            cancel,
        }
    }

    /// A task finalized elsewhere (a direct cancel from another process, a
    /// sweep) stops the running flow.
    fn record(&self, res: Result<ExtractionTask, TaskError>) {
        match res {
            Ok(_) => {}
            Err(TaskError::Terminal { status, .. }) => {
                tracing::info!(task_id = %self.task_id, status = ?status, "task finalized elsewhere, stopping");
                self.cancel.cancel();
            }
            Err(TaskError::NotFound(_)) => {
                tracing::warn!(task_id = %self.task_id, "task vanished from the store, stopping");
                self.cancel.cancel();
            }
            Err(e) => tracing::warn!(task_id = %self.task_id, error = %e, "failed to record task state"),
        }
    }

    /// Walks the task forward to EXTRACTING from wherever it is.
    pub(crate) async fn advance_to_extracting(&self) {
        loop {
            let task = match self.manager.get(&self.task_id).await {
                Ok(t) => t,
                Err(e) => return self.record(Err(e)),
            };
            let next = match task.status {
                TaskStatus::Pending => TaskStatus::TabOpened,
                TaskStatus::TabOpened | TaskStatus::Retrying => TaskStatus::Extracting,
                TaskStatus::Extracting => return,
                status => {
                    return self.record(Err(TaskError::Terminal {
                        id: task.id,
                        status,
                    }))
                }
            };
            let res = self.manager.transition(&self.task_id, next).await;
            if res.is_err() {
                return self.record(res);
            }
        }
    }

    pub(crate) async fn progress(&self, current: usize, total: usize, label: &str) {
        let res = self
            .manager
            .update_progress(
                &self.task_id,
                Progress::new(current as u32, total as u32, label),
            )
            .await;
        self.record(res);
    }
}

#[async_trait]
impl TabLifecycleObserver for TaskObserver {
    async fn on_tab_opened(&self, tab: TabId) {
        tracing::debug!(task_id = %self.task_id, tab_id = %tab, "primary tab opened");
        self.advance_to_extracting().await;
    }
}

#[async_trait]
impl LadderObserver for TaskObserver {
    async fn on_attempt(&self, attempt: u32) {
        if attempt > 1 {
            self.advance_to_extracting().await;
        }
        let res = self.manager.set_attempt(&self.task_id, attempt).await;
        self.record(res);
    }

    async fn on_retry(&self, attempt: u32, delay: Duration, failure: &ExtractionFailure) {
        tracing::info!(
            task_id = %self.task_id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            kind = %failure.kind,
            "attempt failed, retrying"
        );
        let res = self
            .manager
            .transition(&self.task_id, TaskStatus::Retrying)
            .await;
        self.record(res);
    }
}

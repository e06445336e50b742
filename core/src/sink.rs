//! Hand-off of completed results to the storage backend.

use async_trait::async_trait;

use crate::state::{ExtractionTask, TaskPayload, TaskStatus};

/// Where a submission went and how the backend answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub endpoint: String,
    pub status: u16,
}

#[async_trait]
pub trait ResultSink: Send + Sync {
    fn name(&self) -> &str;

    /// Submits the task's result. Only COMPLETED tasks carry one.
    async fn submit(&self, task: &ExtractionTask) -> anyhow::Result<SubmitReceipt>;
}

/// The result of a task if it is ready for submission.
pub fn submittable(task: &ExtractionTask) -> Option<&TaskPayload> {
    match task.status {
        TaskStatus::Completed => task.result.as_ref(),
        _ => None,
    }
}

//! 过期任务清理

use super::store::TaskStore;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPolicy {
    /// 终态任务在最后一次更新后保留多久
    pub completed_retention: Duration,
    /// 任何任务（包括仍然“活跃”的）超过该时长视为遗弃
    pub abandoned_after: Duration,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            completed_retention: Duration::hours(2),
            abandoned_after: Duration::hours(24),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: Vec<String>,
    pub abandoned: Vec<String>,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.expired.len() + self.abandoned.len()
    }
}

/// 单次清理
pub async fn sweep(
    store: &dyn TaskStore,
    now: DateTime<Utc>,
    policy: SweepPolicy,
) -> anyhow::Result<SweepReport> {
    let mut report = SweepReport::default();

    for task in store.list().await? {
        if now - task.created_at >= policy.abandoned_after {
            store.remove(&task.id).await?;
            tracing::info!(task_id = %task.id, status = ?task.status, "removed abandoned task");
            report.abandoned.push(task.id);
        } else if task.status.is_terminal() && now - task.updated_at >= policy.completed_retention {
            store.remove(&task.id).await?;
            tracing::debug!(task_id = %task.id, "removed expired terminal task");
            report.expired.push(task.id);
        }
    }

    Ok(report)
}

/// 后台周期清理，直到 `shutdown` 被触发
pub fn spawn_sweeper(
    store: Arc<dyn TaskStore>,
    policy: SweepPolicy,
    every: std::time::Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    match sweep(store.as_ref(), Utc::now(), policy).await {
                        Ok(report) if report.removed() > 0 => {
                            tracing::info!(removed = report.removed(), "task sweep finished");
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!(error = %e, "task sweep failed"),
                    }
                }
            }
        }
    })
}

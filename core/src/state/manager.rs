//! 任务管理器
//!
//! 所有状态变更都走这里：先校验转换，再写入存储，最后广播事件。
//! 这样重新连接的界面从存储读到的永远是最新状态。

use super::store::TaskStore;
use super::transitions::StateTransition;
use super::types::{ExtractionTask, Progress, TaskEvent, TaskFailure, TaskKind, TaskPayload, TaskStatus};
use crate::error::TaskError;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// 任务管理器
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<TaskManagerInner>,
}

struct TaskManagerInner {
    store: Arc<dyn TaskStore>,
    /// 事件广播通道
    event_tx: broadcast::Sender<TaskEvent>,
    /// 串行化所有写操作，保证“每种类型只有一个活跃任务”的检查与写入是原子的
    write_lock: Mutex<()>,
}

impl TaskManager {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        let (event_tx, _) = broadcast::channel(1000);

        Self {
            inner: Arc::new(TaskManagerInner {
                store,
                event_tx,
                write_lock: Mutex::new(()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.inner.store
    }

    /// 订阅任务事件
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.event_tx.subscribe()
    }

    fn emit_event(&self, event: TaskEvent) {
        let _ = self.inner.event_tx.send(event);
    }

    /// 创建任务。同类型已有活跃任务时返回 `Busy`，不排队，也不改动已有任务。
    pub async fn begin(&self, kind: TaskKind, target: &str) -> Result<ExtractionTask, TaskError> {
        let _guard = self.inner.write_lock.lock().await;

        if let Some(active) = self.active_of_kind(kind).await? {
            tracing::warn!(kind = %kind, active_id = %active.id, "rejecting start, task already active");
            return Err(TaskError::Busy {
                kind,
                active_id: active.id,
            });
        }

        let task = ExtractionTask::new(kind, target);
        self.inner.store.save(&task).await?;
        tracing::info!(task_id = %task.id, kind = %kind, target = %target, "task created");

        self.emit_event(TaskEvent::Created { task: task.clone() });
        Ok(task)
    }

    /// 获取任务
    pub async fn get(&self, id: &str) -> Result<ExtractionTask, TaskError> {
        self.inner
            .store
            .load(id)
            .await?
            .ok_or_else(|| TaskError::NotFound(id.to_string()))
    }

    pub async fn list_active(&self) -> Result<Vec<ExtractionTask>, TaskError> {
        Ok(self.inner.store.list_active().await?)
    }

    /// 某种类型当前的活跃任务
    pub async fn active_of_kind(&self, kind: TaskKind) -> Result<Option<ExtractionTask>, TaskError> {
        Ok(self
            .inner
            .store
            .list_active()
            .await?
            .into_iter()
            .find(|t| t.kind == kind))
    }

    /// 非终态之间的状态转换
    pub async fn transition(&self, id: &str, to: TaskStatus) -> Result<ExtractionTask, TaskError> {
        self.apply_status(id, to, |_| {}).await
    }

    /// 更新进度。计数器只增不减，倒退的更新被忽略。
    pub async fn update_progress(
        &self,
        id: &str,
        progress: Progress,
    ) -> Result<ExtractionTask, TaskError> {
        let _guard = self.inner.write_lock.lock().await;
        let mut task = self.load_mutable(id).await?;

        if progress.is_regression_from(&task.progress) {
            tracing::debug!(task_id = %id, "ignoring regressing progress update");
            return Ok(task);
        }

        task.progress = progress.clone();
        task.touch();
        self.inner.store.save(&task).await?;

        self.emit_event(TaskEvent::Progress {
            id: task.id.clone(),
            kind: task.kind,
            progress,
        });
        Ok(task)
    }

    /// 记录当前尝试次数（从 1 开始）
    pub async fn set_attempt(&self, id: &str, attempt: u32) -> Result<ExtractionTask, TaskError> {
        let _guard = self.inner.write_lock.lock().await;
        let mut task = self.load_mutable(id).await?;
        task.attempt = attempt.max(1);
        task.touch();
        self.inner.store.save(&task).await?;
        Ok(task)
    }

    /// 完成任务。`partial` 不为空时表示部分成功。
    pub async fn complete(
        &self,
        id: &str,
        payload: TaskPayload,
        partial: Option<TaskFailure>,
    ) -> Result<ExtractionTask, TaskError> {
        self.apply_status(id, TaskStatus::Completed, move |task| {
            task.result = Some(payload);
            task.error = partial;
        })
        .await
    }

    pub async fn fail(&self, id: &str, failure: TaskFailure) -> Result<ExtractionTask, TaskError> {
        self.apply_status(id, TaskStatus::Failed, move |task| {
            task.error = Some(failure);
        })
        .await
    }

    pub async fn time_out(
        &self,
        id: &str,
        failure: TaskFailure,
    ) -> Result<ExtractionTask, TaskError> {
        self.apply_status(id, TaskStatus::TimedOut, move |task| {
            task.error = Some(failure);
        })
        .await
    }

    pub async fn cancel(&self, id: &str) -> Result<ExtractionTask, TaskError> {
        self.apply_status(id, TaskStatus::Cancelled, |_| {}).await
    }

    async fn load_mutable(&self, id: &str) -> Result<ExtractionTask, TaskError> {
        let task = self.get(id).await?;
        if task.status.is_terminal() {
            return Err(TaskError::Terminal {
                id: task.id,
                status: task.status,
            });
        }
        Ok(task)
    }

    async fn apply_status<F>(
        &self,
        id: &str,
        to: TaskStatus,
        f: F,
    ) -> Result<ExtractionTask, TaskError>
    where
        F: FnOnce(&mut ExtractionTask),
    {
        let _guard = self.inner.write_lock.lock().await;
        let mut task = self.load_mutable(id).await?;
        let old = task.status;

        StateTransition::validate(old, to)?;

        task.status = to;
        f(&mut task);
        task.touch();
        self.inner.store.save(&task).await?;

        tracing::info!(
            task_id = %task.id,
            kind = %task.kind,
            from = ?old,
            to = ?to,
            "task status changed"
        );

        self.emit_event(TaskEvent::StatusChanged {
            task: task.clone(),
            old,
        });
        if to.is_terminal() {
            self.emit_event(TaskEvent::Finished { task: task.clone() });
        }

        Ok(task)
    }
}

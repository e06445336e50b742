//! 任务状态类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::model::{AssignmentRecord, RecordingRecord, TranscriptRecord};

/// 任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    Assignments,
    Recordings,
    Transcript,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [Self::Assignments, Self::Recordings, Self::Transcript];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assignments => "ASSIGNMENTS",
            Self::Recordings => "RECORDINGS",
            Self::Transcript => "TRANSCRIPT",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// 已创建，尚未打开标签页
    Pending,
    /// 标签页已打开
    TabOpened,
    /// 提取中
    Extracting,
    /// 等待下一次重试
    Retrying,
    /// 完成
    Completed,
    /// 失败
    Failed,
    /// 已取消
    Cancelled,
    /// 超时
    TimedOut,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut
        )
    }
}

/// 进度计数器
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    #[serde(default)]
    pub current: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub current_label: String,
}

impl Progress {
    pub fn new(current: u32, total: u32, current_label: impl Into<String>) -> Self {
        Self {
            current,
            total,
            current_label: current_label.into(),
        }
    }

    /// 计数器只能单调不减
    pub fn is_regression_from(&self, previous: &Progress) -> bool {
        self.current < previous.current || self.total < previous.total
    }
}

/// 终态错误信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFailure {
    pub message: String,
    pub recoverable: bool,
    pub kind: ErrorKind,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl TaskFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            recoverable: kind.recoverable(),
            kind,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// 按任务类型区分的结果载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPayload {
    Assignments(Vec<AssignmentRecord>),
    Recordings(Vec<RecordingRecord>),
    Transcript(TranscriptRecord),
}

/// 一次抓取任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionTask {
    pub id: String,
    pub kind: TaskKind,
    pub target: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: Progress,
    #[serde(default = "default_attempt")]
    pub attempt: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskFailure>,
}

fn default_attempt() -> u32 {
    1
}

impl ExtractionTask {
    pub fn new(kind: TaskKind, target: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            target: target.into(),
            status: TaskStatus::Pending,
            progress: Progress::default(),
            attempt: 1,
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn is_partial(&self) -> bool {
        self.status == TaskStatus::Completed && self.error.is_some()
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// 任务事件（持久化之后才广播）
#[derive(Debug, Clone)]
pub enum TaskEvent {
    Created {
        task: ExtractionTask,
    },
    StatusChanged {
        task: ExtractionTask,
        old: TaskStatus,
    },
    Progress {
        id: String,
        kind: TaskKind,
        progress: Progress,
    },
    Finished {
        task: ExtractionTask,
    },
}

impl TaskEvent {
    pub fn task_id(&self) -> &str {
        match self {
            Self::Created { task } | Self::StatusChanged { task, .. } | Self::Finished { task } => {
                &task.id
            }
            Self::Progress { id, .. } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        for s in [
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
            TaskStatus::TimedOut,
        ] {
            assert!(s.is_terminal());
        }
        assert!(!TaskStatus::Retrying.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
    }

    #[test]
    fn task_serializes_with_epoch_millis() {
        let task = ExtractionTask::new(TaskKind::Transcript, "https://zoom.us/rec/share/abc");
        let v = serde_json::to_value(&task).unwrap();
        assert_eq!(v["kind"], "TRANSCRIPT");
        assert_eq!(v["status"], "PENDING");
        assert!(v["createdAt"].is_i64());
        assert!(v.get("result").is_none());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let json = r#"{
            "id": "t1",
            "kind": "ASSIGNMENTS",
            "target": "https://x.instructure.com/courses/1/assignments",
            "status": "EXTRACTING",
            "progress": {"current": 2, "total": 10, "currentLabel": "HW 2"},
            "attempt": 1,
            "createdAt": 1700000000000,
            "updatedAt": 1700000000500,
            "schemaV2Field": {"anything": true}
        }"#;
        let task: ExtractionTask = serde_json::from_str(json).unwrap();
        assert_eq!(task.status, TaskStatus::Extracting);
        assert_eq!(task.progress.total, 10);
    }

    #[test]
    fn progress_regression_detection() {
        let prev = Progress::new(3, 10, "a");
        assert!(Progress::new(2, 10, "b").is_regression_from(&prev));
        assert!(!Progress::new(3, 10, "c").is_regression_from(&prev));
    }
}

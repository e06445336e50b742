//! 状态转换规则和验证

use super::types::TaskStatus;
use crate::error::TaskError;

/// 状态转换
pub struct StateTransition;

impl StateTransition {
    /// 验证状态转换是否合法
    pub fn validate(from: TaskStatus, to: TaskStatus) -> Result<(), TaskError> {
        // 终态不能转换
        if from.is_terminal() {
            return Err(TaskError::InvalidTransition { from, to });
        }

        let is_valid = match (from, to) {
            (TaskStatus::Pending, TaskStatus::TabOpened) => true,
            (TaskStatus::TabOpened, TaskStatus::Extracting) => true,

            // 重试循环
            (TaskStatus::Extracting, TaskStatus::Retrying) => true,
            (TaskStatus::Retrying, TaskStatus::Extracting) => true,

            (TaskStatus::Extracting, TaskStatus::Completed) => true,

            // 任意非终态都可以取消、失败或超时（页面检查、通道故障、标签页超时可能发生在提取之前）
            (_, TaskStatus::Cancelled) | (_, TaskStatus::Failed) | (_, TaskStatus::TimedOut) => {
                true
            }

            _ => false,
        };

        if is_valid {
            Ok(())
        } else {
            Err(TaskError::InvalidTransition { from, to })
        }
    }
}

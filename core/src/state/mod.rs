//! # 任务状态模块
//!
//! 负责抓取任务的生命周期、持久化和过期清理。
//!
//! ## 设计原则
//!
//! 1. **单一事实来源**：任何上下文读取任务状态都从存储读，不依赖本地变量
//! 2. **先持久化后通知**：每次状态或进度变化先写存储，再广播事件
//! 3. **终态冻结**：COMPLETED / FAILED / CANCELLED / TIMED_OUT 之后不再变化
//! 4. **每种类型一个活跃任务**：重复启动直接拒绝，不排队

pub mod manager;
pub mod store;
pub mod sweep;
pub mod transitions;
pub mod types;

pub use manager::TaskManager;
pub use store::{FileTaskStore, MemoryTaskStore, TaskStore};
pub use sweep::{spawn_sweeper, sweep, SweepPolicy, SweepReport};
pub use transitions::StateTransition;
pub use types::{
    ExtractionTask, Progress, TaskEvent, TaskFailure, TaskKind, TaskPayload, TaskStatus,
};

//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `gator_core::api` instead of reaching into internal modules.

pub use crate::config::{
    load_default, AppConfig, BackendConfig, LoggingConfig, RetryConfig, SitesConfig,
    StoreConfig, TabsConfig,
};
pub use crate::context::{AppContext, Services, ServicesFactory};
pub use crate::coordinator::Coordinator;
pub use crate::error::{ErrorCode, ErrorKind, GatorError, HostError, TaskError};
pub use crate::extract::{
    ElementHandle, ExtractionFailure, ExtractionOutcome, PageContext, PageSnapshot,
};
pub use crate::model::{
    AssignmentRecord, RecordingRecord, RubricItem, RubricRating, TranscriptRecord,
    TranscriptSegment, TranscriptStatus,
};
pub use crate::protocol::{Message, MessageBus, Reply};
pub use crate::retry::RetryPolicy;
pub use crate::sink::{submittable, ResultSink, SubmitReceipt};
pub use crate::state::{
    ExtractionTask, FileTaskStore, MemoryTaskStore, Progress, StateTransition, SweepReport,
    TaskFailure, TaskKind, TaskManager, TaskPayload, TaskStatus, TaskStore,
};
pub use crate::tab::{BrowserHost, TabId, TabInfo};

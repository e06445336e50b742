//! Wire shapes exchanged between the UI, the coordinator and page contexts.
//!
//! Every message that concerns a task carries its `extractionId`. Messages are
//! plain JSON so they can cross any isolation boundary unchanged.

use serde::{Deserialize, Serialize};

use crate::state::{ExtractionTask, Progress, TaskKind};

/// Inbound requests and outbound notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Start a task. Acknowledged immediately; the outcome arrives as `Result`.
    #[serde(rename_all = "camelCase")]
    Start { kind: TaskKind, target: String },

    /// Cancel the active task of `kind`, if any.
    #[serde(rename_all = "camelCase")]
    Cancel { kind: TaskKind },

    #[serde(rename_all = "camelCase")]
    Progress {
        extraction_id: String,
        kind: TaskKind,
        progress: Progress,
    },

    /// Terminal task, correlated by `extractionId`.
    #[serde(rename_all = "camelCase")]
    Result {
        extraction_id: String,
        task: ExtractionTask,
    },

    /// Liveness check.
    Ping,
}

impl Message {
    pub fn extraction_id(&self) -> Option<&str> {
        match self {
            Self::Progress { extraction_id, .. } | Self::Result { extraction_id, .. } => {
                Some(extraction_id)
            }
            _ => None,
        }
    }
}

/// Immediate answer to an inbound [`Message`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    #[serde(rename_all = "camelCase")]
    Ack { extraction_id: String },

    #[serde(rename_all = "camelCase")]
    Busy { kind: TaskKind, active_id: String },

    /// Cancellation requested; `extractionId` is absent when nothing was running.
    #[serde(rename_all = "camelCase")]
    Cancelling {
        kind: TaskKind,
        extraction_id: Option<String>,
    },

    Pong,

    /// Malformed or unsupported request.
    #[serde(rename_all = "camelCase")]
    Rejected { reason: String },
}

use thiserror::Error;

use crate::state::{TaskKind, TaskStatus};
use crate::tab::TabId;

#[derive(Error, Debug)]
pub enum GatorError {
    #[error("task error: {0}")]
    Task(#[from] TaskError),
    #[error("host error: {0}")]
    Host(#[from] HostError),
    #[error("command failed: {0}")]
    Command(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Errors raised by the task state machine and the task store.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("a {kind} task is already active ({active_id})")]
    Busy { kind: TaskKind, active_id: String },

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("task {id} is terminal ({status:?}) and can no longer change")]
    Terminal { id: String, status: TaskStatus },

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Errors surfaced by a browser host implementation.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("tab {0} no longer exists")]
    TabGone(TabId),

    #[error("message channel unavailable: {0}")]
    Communication(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("host failure: {0}")]
    Other(#[from] anyhow::Error),
}

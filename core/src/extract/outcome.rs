use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ErrorKind;
use crate::state::TaskFailure;

/// Failure side of an extraction attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionFailure {
    pub kind: ErrorKind,
    pub message: String,
    /// Page-structure snapshot or other debugging detail. `Null` when there is none.
    #[serde(default)]
    pub diagnostic: Value,
}

impl ExtractionFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            diagnostic: Value::Null,
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: Value) -> Self {
        self.diagnostic = diagnostic;
        self
    }

    /// Records how many attempts were spent before giving up.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        match &mut self.diagnostic {
            Value::Object(map) => {
                map.insert("attempts".to_string(), json!(attempts));
            }
            Value::Null => self.diagnostic = json!({ "attempts": attempts }),
            other => {
                let previous = other.take();
                self.diagnostic = json!({ "attempts": attempts, "detail": previous });
            }
        }
        self
    }

    pub fn recoverable(&self) -> bool {
        self.kind.recoverable()
    }

    pub fn into_task_failure(self) -> TaskFailure {
        TaskFailure::new(self.kind, self.message).with_details(self.diagnostic)
    }
}

impl std::fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome<T> {
    Success(T),
    Failure(ExtractionFailure),
}

impl<T> ExtractionOutcome<T> {
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure(ExtractionFailure::new(kind, message))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ExtractionOutcome<U> {
        match self {
            Self::Success(v) => ExtractionOutcome::Success(f(v)),
            Self::Failure(e) => ExtractionOutcome::Failure(e),
        }
    }

    pub fn into_result(self) -> Result<T, ExtractionFailure> {
        match self {
            Self::Success(v) => Ok(v),
            Self::Failure(e) => Err(e),
        }
    }
}

impl<T> From<Result<T, ExtractionFailure>> for ExtractionOutcome<T> {
    fn from(r: Result<T, ExtractionFailure>) -> Self {
        match r {
            Ok(v) => Self::Success(v),
            Err(e) => Self::Failure(e),
        }
    }
}

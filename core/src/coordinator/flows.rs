//! One flow per task kind. Each flow validates its target, drives tabs and
//! ladders, and reduces everything to a [`FlowEnd`].

use chrono::{Datelike, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::observer::TaskObserver;
use super::target::{assignments_target, recordings_target, transcript_target, TranscriptTarget};
use crate::config::{RetryConfig, SitesConfig, TabsConfig};
use crate::error::ErrorKind;
use crate::extract::diagnostic::page_structure;
use crate::extract::{
    extract_assignment_detail, extract_assignment_list, extract_transcript_once,
    find_recording_conversations, read_recording_message, AssignmentDetail, AssignmentSummary,
    ExtractionFailure, ExtractionOutcome, PageContext, PageSnapshot, RecordingConversation,
};
use crate::model::{AssignmentRecord, RecordingRecord, TranscriptRecord, TranscriptStatus};
use crate::retry::{with_retry, LadderObserver, NoopObserver};
use crate::state::{ExtractionTask, TaskFailure, TaskPayload};
use crate::tab::{
    EphemeralTabOptions, NoopTabObserver, TabController, TabLifecycleObserver,
};

/// Terminal shape of a flow before it is written to the task.
#[derive(Debug)]
pub(crate) enum FlowEnd {
    Completed {
        payload: TaskPayload,
        partial: Option<TaskFailure>,
    },
    Failed(ExtractionFailure),
}

impl From<ExtractionFailure> for FlowEnd {
    fn from(f: ExtractionFailure) -> Self {
        Self::Failed(f)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FlowSettings {
    pub retry: RetryConfig,
    pub tabs: TabsConfig,
    pub sites: SitesConfig,
}

pub(crate) struct FlowContext<'a> {
    pub tabs: &'a TabController,
    pub settings: &'a FlowSettings,
    pub task: &'a ExtractionTask,
    pub cancel: &'a CancellationToken,
    pub observer: &'a TaskObserver,
}

/// Items collected by a discovery flow plus its bookkeeping.
struct Batch<T> {
    items: Vec<T>,
    total: usize,
    failed: usize,
}

impl<T> Batch<T> {
    fn new(total: usize) -> Self {
        Self {
            items: Vec::with_capacity(total),
            total,
            failed: 0,
        }
    }

    fn partial(&self, noun: &str, extra: serde_json::Value) -> Option<TaskFailure> {
        if self.failed == 0 {
            return None;
        }
        let mut details = json!({
            "total": self.total,
            "processed": self.total,
            "failed": self.failed,
            "successful": self.total - self.failed,
        });
        if let (Some(d), Some(e)) = (details.as_object_mut(), extra.as_object()) {
            d.extend(e.clone());
        }
        Some(
            TaskFailure::new(
                ErrorKind::ContentNotFound,
                format!("{} of {} {} could not be read", self.failed, self.total, noun),
            )
            .with_details(details),
        )
    }
}

fn cancelled<T>() -> ExtractionOutcome<T> {
    ExtractionOutcome::failure(ErrorKind::Cancelled, "Extraction cancelled")
}

async fn snapshot_or_failure(page: &dyn PageContext) -> Result<PageSnapshot, ExtractionFailure> {
    page.snapshot()
        .await
        .map_err(|e| ExtractionFailure::new(ErrorKind::CommunicationFailure, e.to_string()))
}

// ---------------------------------------------------------------------------
// TRANSCRIPT
// ---------------------------------------------------------------------------

pub(crate) async fn transcript(cx: &FlowContext<'_>) -> FlowEnd {
    let target = match transcript_target(&cx.task.target, &cx.settings.sites) {
        Ok(t) => t,
        Err(f) => return f.into(),
    };

    let opts = cx.settings.tabs.transcript_options();
    match transcribe(cx, &target, &opts, cx.observer, cx.observer).await {
        ExtractionOutcome::Success(record) => {
            tracing::info!(task_id = %cx.task.id, segments = record.segment_count, "transcript extracted");
            FlowEnd::Completed {
                payload: TaskPayload::Transcript(record),
                partial: None,
            }
        }
        ExtractionOutcome::Failure(f) => f.into(),
    }
}

/// Opens `target` in its own tab and runs the transcript ladder there.
async fn transcribe(
    cx: &FlowContext<'_>,
    target: &TranscriptTarget,
    opts: &EphemeralTabOptions,
    tab_observer: &dyn TabLifecycleObserver,
    ladder_observer: &dyn LadderObserver,
) -> ExtractionOutcome<TranscriptRecord> {
    let policy = cx.settings.retry.transcript_policy();
    let settle = cx.settings.tabs.activation_settle();
    let cancel = cx.cancel;

    cx.tabs
        .run_in_ephemeral_tab(
            &cx.task.id,
            &target.url,
            opts,
            cancel,
            tab_observer,
            |page| async move {
                with_retry(policy, ladder_observer, cancel, |_| {
                    let page = page.clone();
                    async move { extract_transcript_once(&*page, settle).await }
                })
                .await
                .outcome
            },
        )
        .await
        .map(|mut record| {
            record.recording_id = target.recording_id.clone();
            record
        })
}

// ---------------------------------------------------------------------------
// ASSIGNMENTS
// ---------------------------------------------------------------------------

pub(crate) async fn assignments(cx: &FlowContext<'_>) -> FlowEnd {
    let target = match assignments_target(&cx.task.target, &cx.settings.sites) {
        Ok(t) => t,
        Err(f) => return f.into(),
    };

    let year = Utc::now().year();
    let policy = cx.settings.retry.page_policy();
    let cancel = cx.cancel;
    let opts = cx.settings.tabs.discovery_options();

    let outcome = cx
        .tabs
        .run_in_ephemeral_tab(
            &cx.task.id,
            &target.url,
            &opts,
            cancel,
            cx.observer,
            |page| async move {
                let listed = with_retry(policy, cx.observer, cancel, |_| {
                    let page = page.clone();
                    async move {
                        match snapshot_or_failure(&*page).await {
                            Ok(snapshot) => ExtractionOutcome::from(extract_assignment_list(&snapshot, year)),
                            Err(f) => ExtractionOutcome::Failure(f),
                        }
                    }
                })
                .await
                .outcome;

                match listed {
                    ExtractionOutcome::Success(summaries) => collect_assignments(cx, summaries).await,
                    ExtractionOutcome::Failure(f) => ExtractionOutcome::Failure(f),
                }
            },
        )
        .await;

    match outcome {
        ExtractionOutcome::Success(batch) => {
            let partial = batch.partial("assignments", json!({ "courseId": target.course_id }));
            tracing::info!(
                task_id = %cx.task.id,
                total = batch.total,
                failed = batch.failed,
                "assignments extracted"
            );
            FlowEnd::Completed {
                payload: TaskPayload::Assignments(batch.items),
                partial,
            }
        }
        ExtractionOutcome::Failure(f) => f.into(),
    }
}

fn assignment_record(summary: AssignmentSummary, detail: AssignmentDetail) -> AssignmentRecord {
    AssignmentRecord {
        title: summary.title,
        url: summary.url,
        due_date: summary.due_date,
        description: detail.description,
        rubric: detail.rubric,
        points_possible: summary.points_possible,
        status: summary.status,
        assignment_group: summary.assignment_group,
    }
}

async fn collect_assignments(
    cx: &FlowContext<'_>,
    summaries: Vec<AssignmentSummary>,
) -> ExtractionOutcome<Batch<AssignmentRecord>> {
    let total = summaries.len();
    let mut batch = Batch::new(total);
    let policy = cx.settings.retry.page_policy();
    let opts = cx.settings.tabs.detail_options();
    let cancel = cx.cancel;

    cx.observer.progress(0, total, "").await;

    for (i, summary) in summaries.into_iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::info!(task_id = %cx.task.id, processed = i, total, "assignments cancelled");
            return cancelled();
        }

        let detail = cx
            .tabs
            .run_in_ephemeral_tab(
                &cx.task.id,
                &summary.url,
                &opts,
                cancel,
                &NoopTabObserver,
                |page| async move {
                    with_retry(policy, &NoopObserver, cancel, |_| {
                        let page = page.clone();
                        async move {
                            match snapshot_or_failure(&*page).await {
                                Ok(snapshot) => ExtractionOutcome::from(extract_assignment_detail(&snapshot)),
                                Err(f) => ExtractionOutcome::Failure(f),
                            }
                        }
                    })
                    .await
                    .outcome
                },
            )
            .await;

        let detail = match detail {
            ExtractionOutcome::Success(d) => d,
            ExtractionOutcome::Failure(f) if f.kind == ErrorKind::Cancelled => {
                return ExtractionOutcome::Failure(f)
            }
            ExtractionOutcome::Failure(f) => {
                tracing::warn!(
                    task_id = %cx.task.id,
                    title = %summary.title,
                    kind = %f.kind,
                    error = %f.message,
                    "assignment detail unavailable, keeping summary"
                );
                batch.failed += 1;
                AssignmentDetail {
                    description: String::new(),
                    rubric: None,
                }
            }
        };

        let title = summary.title.clone();
        batch.items.push(assignment_record(summary, detail));
        cx.observer.progress(i + 1, total, &title).await;
    }

    ExtractionOutcome::Success(batch)
}

// ---------------------------------------------------------------------------
// RECORDINGS
// ---------------------------------------------------------------------------

fn conversations_of(snapshot: &PageSnapshot) -> Result<Vec<RecordingConversation>, ExtractionFailure> {
    let found = find_recording_conversations(snapshot);
    if found.is_empty() {
        let doc = snapshot.document();
        return Err(ExtractionFailure::new(
            ErrorKind::ContentNotFound,
            "No messages found with recordings",
        )
        .with_diagnostic(page_structure(&doc, &snapshot.url, snapshot.frames.len())));
    }
    Ok(found)
}

pub(crate) async fn recordings(cx: &FlowContext<'_>) -> FlowEnd {
    let target = match recordings_target(&cx.task.target, &cx.settings.sites) {
        Ok(t) => t,
        Err(f) => return f.into(),
    };

    let policy = cx.settings.retry.page_policy();
    let cancel = cx.cancel;
    let opts = cx.settings.tabs.discovery_options();
    let course_id = target.course_id.clone();

    let outcome = cx
        .tabs
        .run_in_ephemeral_tab(
            &cx.task.id,
            &target.url,
            &opts,
            cancel,
            cx.observer,
            |page| async move {
                let found = with_retry(policy, cx.observer, cancel, |_| {
                    let page = page.clone();
                    async move {
                        match snapshot_or_failure(&*page).await {
                            Ok(snapshot) => ExtractionOutcome::from(conversations_of(&snapshot)),
                            Err(f) => ExtractionOutcome::Failure(f),
                        }
                    }
                })
                .await
                .outcome;

                match found {
                    ExtractionOutcome::Success(conversations) => {
                        collect_recordings(cx, page, conversations, course_id).await
                    }
                    ExtractionOutcome::Failure(f) => ExtractionOutcome::Failure(f),
                }
            },
        )
        .await;

    match outcome {
        ExtractionOutcome::Success((batch, transcripts_ok)) => {
            let partial = batch.partial(
                "recordings",
                json!({
                    "courseId": target.course_id,
                    "transcriptSuccessful": transcripts_ok,
                }),
            );
            FlowEnd::Completed {
                payload: TaskPayload::Recordings(batch.items),
                partial,
            }
        }
        ExtractionOutcome::Failure(f) => f.into(),
    }
}

/// Clicks a conversation open and reads its announcement.
async fn open_message(
    page: &dyn PageContext,
    conversation: &RecordingConversation,
    settle: Duration,
) -> Result<crate::extract::RecordingMessage, String> {
    match page.click(&conversation.open).await {
        Ok(true) => {}
        Ok(false) => return Err(format!("could not open {}", conversation.open)),
        Err(e) => return Err(e.to_string()),
    }
    tokio::time::sleep(settle).await;
    let snapshot = page.snapshot().await.map_err(|e| e.to_string())?;
    read_recording_message(&snapshot).ok_or_else(|| "no recording link in message".to_string())
}

async fn collect_recordings(
    cx: &FlowContext<'_>,
    inbox: Arc<dyn PageContext>,
    conversations: Vec<RecordingConversation>,
    course_id: Option<String>,
) -> ExtractionOutcome<(Batch<RecordingRecord>, usize)> {
    let total = conversations.len();
    let mut batch = Batch::new(total);
    let mut transcripts_ok = 0;
    let settle = Duration::from_millis(cx.settings.tabs.settle_ms);
    let nested = EphemeralTabOptions {
        restore_origin: false,
        ..cx.settings.tabs.transcript_options()
    };

    cx.observer.progress(0, total, "").await;

    for (i, conversation) in conversations.iter().enumerate() {
        if cx.cancel.is_cancelled() {
            tracing::info!(task_id = %cx.task.id, processed = i, total, "recordings cancelled");
            return cancelled();
        }

        let message = match open_message(&*inbox, conversation, settle).await {
            Ok(m) => m,
            Err(reason) => {
                tracing::warn!(task_id = %cx.task.id, index = i, reason = %reason, "recording message unreadable");
                batch.failed += 1;
                cx.observer
                    .progress(i + 1, total, &format!("Skipped recording {} of {}", i + 1, total))
                    .await;
                continue;
            }
        };

        let transcript = match transcript_target(&message.url, &cx.settings.sites) {
            Ok(target) => {
                match transcribe(cx, &target, &nested, &NoopTabObserver, &NoopObserver).await {
                    ExtractionOutcome::Success(record) => {
                        transcripts_ok += 1;
                        TranscriptStatus::Success {
                            segment_count: record.segment_count,
                            segments: record.transcript_segments,
                            formatted_text: record.formatted_text,
                        }
                    }
                    ExtractionOutcome::Failure(f) if f.kind == ErrorKind::Cancelled => {
                        return ExtractionOutcome::Failure(f)
                    }
                    ExtractionOutcome::Failure(f) => {
                        batch.failed += 1;
                        TranscriptStatus::Failed {
                            recoverable: f.recoverable(),
                            error: f.message,
                        }
                    }
                }
            }
            Err(f) => {
                batch.failed += 1;
                TranscriptStatus::Failed {
                    recoverable: f.recoverable(),
                    error: f.message,
                }
            }
        };

        let label = message.title.clone();
        batch.items.push(RecordingRecord {
            title: message.title,
            url: message.url,
            host: message.host,
            date: conversation.date.clone(),
            course_id: course_id.clone(),
            recording_type: "zoom".to_string(),
            transcript: Some(transcript),
        });
        cx.observer.progress(i + 1, total, &label).await;
    }

    tracing::info!(task_id = %cx.task.id, total, transcripts_ok, "recordings extracted");
    ExtractionOutcome::Success((batch, transcripts_ok))
}

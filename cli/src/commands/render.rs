//! Plain-text and JSON rendering of tasks for the terminal.

use gator_core::api::{ExtractionTask, Message, TaskPayload, TaskStatus, TranscriptStatus};

pub fn progress_line(msg: &Message) -> Option<String> {
    match msg {
        Message::Progress {
            kind, progress, ..
        } => {
            let label = if progress.current_label.is_empty() {
                String::new()
            } else {
                format!(" {}", progress.current_label)
            };
            Some(format!(
                "[{}] {}/{}{}",
                kind, progress.current, progress.total, label
            ))
        }
        _ => None,
    }
}

pub fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "PENDING",
        TaskStatus::TabOpened => "TAB_OPENED",
        TaskStatus::Extracting => "EXTRACTING",
        TaskStatus::Retrying => "RETRYING",
        TaskStatus::Completed => "COMPLETED",
        TaskStatus::Failed => "FAILED",
        TaskStatus::TimedOut => "TIMED_OUT",
        TaskStatus::Cancelled => "CANCELLED",
    }
}

/// One line per task, used by `status`.
pub fn summary_line(task: &ExtractionTask) -> String {
    format!(
        "{}  {:<11}  {:<10}  {}/{}  attempt={}  {}",
        task.id,
        task.kind.as_str(),
        status_label(task.status),
        task.progress.current,
        task.progress.total,
        task.attempt,
        task.updated_at.format("%Y-%m-%d %H:%M:%S"),
    )
}

pub fn task_json(task: &ExtractionTask) -> String {
    serde_json::to_string_pretty(task).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
}

pub fn task_text(task: &ExtractionTask) -> String {
    let mut out = Vec::new();
    out.push(format!(
        "{} task {}: {}",
        task.kind,
        task.id,
        status_label(task.status)
    ));

    if let Some(err) = &task.error {
        let hint = if err.recoverable {
            "try again"
        } else {
            "check the page and start over"
        };
        out.push(format!(
            "  {} ({}, code {}, {})",
            err.message,
            err.kind,
            err.kind.error_code().as_u16(),
            hint
        ));
    }

    match &task.result {
        Some(TaskPayload::Assignments(items)) => {
            out.push(format!("  {} assignments", items.len()));
            for a in items {
                let due = a.due_date.as_deref().unwrap_or("no due date");
                let rubric = a
                    .rubric
                    .as_ref()
                    .map(|r| format!("{} criteria", r.len()))
                    .unwrap_or_else(|| "no rubric".to_string());
                out.push(format!(
                    "  - {} ({} pts, {}, {})",
                    a.title, a.points_possible, due, rubric
                ));
            }
        }
        Some(TaskPayload::Recordings(items)) => {
            out.push(format!("  {} recordings", items.len()));
            for r in items {
                let transcript = match &r.transcript {
                    Some(TranscriptStatus::Success { segment_count, .. }) => {
                        format!("{} segments", segment_count)
                    }
                    Some(TranscriptStatus::Failed { error, .. }) => {
                        format!("transcript failed: {}", error)
                    }
                    None => "no transcript".to_string(),
                };
                out.push(format!("  - {} [{}] {}", r.title, r.date, transcript));
            }
        }
        Some(TaskPayload::Transcript(t)) => {
            out.push(format!("  {} segments", t.segment_count));
            out.push(String::new());
            out.push(t.formatted_text.clone());
        }
        None => {}
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use gator_core::api::{
        ErrorKind, Progress, TaskFailure, TaskKind, TranscriptRecord, TranscriptSegment,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn progress_line_includes_label() {
        let msg = Message::Progress {
            extraction_id: "x".into(),
            kind: TaskKind::Assignments,
            progress: Progress::new(2, 10, "Essay 2"),
        };
        assert_eq!(
            progress_line(&msg).as_deref(),
            Some("[ASSIGNMENTS] 2/10 Essay 2")
        );
        assert_eq!(progress_line(&Message::Ping), None);
    }

    #[test]
    fn failed_task_shows_hint() {
        let mut task = ExtractionTask::new(TaskKind::Transcript, "https://x.zoom.us/rec/share/a");
        task.status = TaskStatus::Failed;
        task.error = Some(TaskFailure::new(ErrorKind::AccessRestricted, "Password required"));
        let text = task_text(&task);
        assert!(text.contains("FAILED"));
        assert!(text.contains("Password required"));
        assert!(text.contains("code 21"));
        assert!(text.contains("check the page"));
    }

    #[test]
    fn transcript_text_is_printed() {
        let mut task = ExtractionTask::new(TaskKind::Transcript, "https://x.zoom.us/rec/share/a");
        task.status = TaskStatus::Completed;
        task.result = Some(TaskPayload::Transcript(TranscriptRecord::new(
            "https://x.zoom.us/rec/share/a",
            vec![TranscriptSegment::new(5, "Hello class")],
        )));
        let text = task_text(&task);
        assert!(text.contains("1 segments"));
        assert!(text.contains("Hello class"));
    }
}

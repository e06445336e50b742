mod common;

use common::*;
use gator_core::api::{
    AppContext, BrowserHost, ElementHandle, ErrorKind, FileTaskStore, MemoryTaskStore, Message,
    Progress, Reply, TaskKind, TaskManager, TaskPayload, TaskStatus, TaskStore, TranscriptStatus,
};
use gator_core::tab::ManagedTab;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const REC_URL: &str = "https://school.zoom.us/rec/share/abc";

async fn start(ctx: &AppContext, kind: TaskKind, target: &str) -> String {
    match ctx
        .coordinator()
        .handle(Message::Start {
            kind,
            target: target.to_string(),
        })
        .await
    {
        Reply::Ack { extraction_id } => extraction_id,
        other => panic!("start was not acknowledged: {other:?}"),
    }
}

#[tokio::test]
async fn transcript_is_extracted_sorted_and_tab_closed() {
    let host = ScriptedHost::new();
    host.serve_html(
        REC_URL,
        transcript_page(&[("00:12", "twelve"), ("00:03", "three"), ("00:45", "forty five")]),
    );
    let ctx = context(&host);

    let id = start(&ctx, TaskKind::Transcript, REC_URL).await;
    let task = await_task(&ctx, &id).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.attempt, 1);
    let Some(TaskPayload::Transcript(record)) = task.result else {
        panic!("expected a transcript payload");
    };
    assert_eq!(record.recording_id.as_deref(), Some("abc"));
    let order: Vec<u32> = record
        .transcript_segments
        .iter()
        .map(|s| s.timestamp_seconds)
        .collect();
    assert_eq!(order, vec![3, 12, 45]);

    host.wait_until_closed().await;
    assert_eq!(host.created().len(), 1);
    assert_eq!(host.removed().len(), 1);
}

#[tokio::test]
async fn second_start_of_same_kind_is_busy() {
    let host = ScriptedHost::new();
    host.hang(REC_URL);
    let ctx = context(&host);

    let id = start(&ctx, TaskKind::Transcript, REC_URL).await;
    let before = ctx.manager().get(&id).await.unwrap();

    let reply = ctx
        .coordinator()
        .handle(Message::Start {
            kind: TaskKind::Transcript,
            target: REC_URL.to_string(),
        })
        .await;
    assert_eq!(
        reply,
        Reply::Busy {
            kind: TaskKind::Transcript,
            active_id: id.clone(),
        }
    );

    let after = ctx.manager().get(&id).await.unwrap();
    assert_eq!(after.status, before.status);
    assert_eq!(ctx.manager().list_active().await.unwrap().len(), 1);

    let reply = ctx
        .coordinator()
        .handle(Message::Cancel {
            kind: TaskKind::Transcript,
        })
        .await;
    assert_eq!(
        reply,
        Reply::Cancelling {
            kind: TaskKind::Transcript,
            extraction_id: Some(id.clone()),
        }
    );
    let task = await_task(&ctx, &id).await;
    assert_eq!(task.status, TaskStatus::Cancelled);

    host.wait_until_closed().await;
    assert_eq!(host.open_tabs(), 0);
}

#[tokio::test]
async fn other_kinds_run_alongside() {
    let host = ScriptedHost::new();
    host.hang(REC_URL);
    host.hang(COURSE_URL);
    let ctx = context(&host);

    let transcript = start(&ctx, TaskKind::Transcript, REC_URL).await;
    let assignments = start(&ctx, TaskKind::Assignments, COURSE_URL).await;
    assert_ne!(transcript, assignments);
    assert_eq!(ctx.manager().list_active().await.unwrap().len(), 2);

    ctx.shutdown();
    assert_eq!(await_task(&ctx, &transcript).await.status, TaskStatus::Cancelled);
    assert_eq!(await_task(&ctx, &assignments).await.status, TaskStatus::Cancelled);
}

#[tokio::test]
async fn managed_tab_closes_once() {
    let host = ScriptedHost::new();
    let arc: Arc<dyn BrowserHost> = Arc::new(host.clone());
    let tab = arc.create_tab(REC_URL, false).await.unwrap();
    let managed = ManagedTab::new(arc.clone(), tab, "task-1");

    // Completion and timeout both try to close the same tab.
    let (a, b) = tokio::join!(managed.close(), managed.close());
    assert!(a ^ b);
    assert!(managed.is_closed());
    drop(managed);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(host.removed(), vec![tab]);
}

#[tokio::test]
async fn content_not_found_exhausts_the_ladder() {
    let host = ScriptedHost::new();
    host.serve_html(REC_URL, "<html><body><video></video><p>nothing here</p></body></html>");
    let mut cfg = test_config();
    cfg.retry.transcript_max_attempts = 3;
    let ctx = context_with(&host, cfg, Arc::new(MemoryTaskStore::new()));

    let id = start(&ctx, TaskKind::Transcript, REC_URL).await;
    let task = await_task(&ctx, &id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.attempt, 3);
    let err = task.error.unwrap();
    assert_eq!(err.kind, ErrorKind::ContentNotFound);
    assert!(err.recoverable);
}

#[tokio::test]
async fn password_page_fails_on_first_attempt() {
    let host = ScriptedHost::new();
    host.serve_html(REC_URL, r#"<html><body><form><input type="password"></form></body></html>"#);
    let mut cfg = test_config();
    cfg.retry.transcript_max_attempts = 5;
    let ctx = context_with(&host, cfg, Arc::new(MemoryTaskStore::new()));

    let id = start(&ctx, TaskKind::Transcript, REC_URL).await;
    let task = await_task(&ctx, &id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.attempt, 1);
    let err = task.error.unwrap();
    assert_eq!(err.kind, ErrorKind::AccessRestricted);
    assert!(!err.recoverable);
}

#[tokio::test]
async fn slow_page_times_out() {
    let host = ScriptedHost::new();
    host.hang(REC_URL);
    let mut cfg = test_config();
    cfg.tabs.transcript_timeout_ms = 100;
    let ctx = context_with(&host, cfg, Arc::new(MemoryTaskStore::new()));

    let id = start(&ctx, TaskKind::Transcript, REC_URL).await;
    let task = await_task(&ctx, &id).await;

    assert_eq!(task.status, TaskStatus::TimedOut);
    let err = task.error.unwrap();
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert!(err.recoverable);

    host.wait_until_closed().await;
    assert_eq!(host.open_tabs(), 0);
}

#[tokio::test]
async fn invalid_target_fails_without_opening_a_tab() {
    let host = ScriptedHost::new();
    let ctx = context(&host);

    let id = start(&ctx, TaskKind::Assignments, "https://example.com/courses/1").await;
    let task = await_task(&ctx, &id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    let err = task.error.unwrap();
    assert_eq!(err.kind, ErrorKind::NotOnTargetPage);
    assert!(!err.recoverable);
    assert!(host.created().is_empty());
}

#[tokio::test]
async fn empty_assignment_index_is_content_not_found() {
    let host = ScriptedHost::new();
    host.serve_html(COURSE_URL, "<html><body><ul class=\"ig-list\"></ul></body></html>");
    let ctx = context(&host);

    let id = start(&ctx, TaskKind::Assignments, COURSE_URL).await;
    let task = await_task(&ctx, &id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    let err = task.error.unwrap();
    assert_eq!(err.kind, ErrorKind::ContentNotFound);
    assert!(err.recoverable);
}

#[tokio::test]
async fn missing_rubric_is_null_for_that_record_only() {
    let host = ScriptedHost::new();
    host.serve_html(
        COURSE_URL,
        assignment_index(&[
            ("/courses/42/assignments/1", "Essay 1"),
            ("/courses/42/assignments/2", "Essay 2"),
            ("/courses/42/assignments/3", "Essay 3"),
        ]),
    );
    host.serve_html(
        "https://school.instructure.com/courses/42/assignments/1",
        assignment_detail("Write about chapter 1", true),
    );
    host.serve_html(
        "https://school.instructure.com/courses/42/assignments/2",
        assignment_detail("Write about chapter 2", false),
    );
    host.serve_html(
        "https://school.instructure.com/courses/42/assignments/3",
        assignment_detail("Write about chapter 3", true),
    );
    let ctx = context(&host);

    let id = start(&ctx, TaskKind::Assignments, COURSE_URL).await;
    let task = await_task(&ctx, &id).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert!(!task.is_partial());
    assert_eq!(task.progress, Progress::new(3, 3, "Essay 3"));
    let Some(TaskPayload::Assignments(records)) = task.result else {
        panic!("expected assignments");
    };
    assert_eq!(records.len(), 3);
    assert!(records[0].rubric.is_some());
    assert_eq!(records[1].rubric, None);
    assert!(records[2].rubric.is_some());
    assert_eq!(records[1].description, "Write about chapter 2");
    assert_eq!(records[0].rubric.as_ref().unwrap()[0].criterion, "Thesis");

    host.wait_until_closed().await;
    assert_eq!(host.created().len(), 4);
    assert_eq!(host.removed().len(), 4);
}

#[tokio::test]
async fn unreadable_detail_keeps_summary_and_marks_partial() {
    let host = ScriptedHost::new();
    host.serve_html(
        COURSE_URL,
        assignment_index(&[
            ("/courses/42/assignments/1", "Quiz 1"),
            ("/courses/42/assignments/2", "Quiz 2"),
        ]),
    );
    host.serve_html(
        "https://school.instructure.com/courses/42/assignments/1",
        assignment_detail("Answer the questions", false),
    );
    let ctx = context(&host);

    let id = start(&ctx, TaskKind::Assignments, COURSE_URL).await;
    let task = await_task(&ctx, &id).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.is_partial());
    let err = task.error.as_ref().unwrap();
    assert_eq!(err.details["failed"], 1);
    assert_eq!(err.details["successful"], 1);
    assert_eq!(err.details["courseId"], "42");
    let Some(TaskPayload::Assignments(records)) = task.result else {
        panic!("expected assignments");
    };
    assert_eq!(records[1].title, "Quiz 2");
    assert_eq!(records[1].description, "");
}

#[tokio::test]
async fn cancel_mid_loop_keeps_progress() {
    let host = ScriptedHost::new();
    let rows: Vec<(String, String)> = (1..=10)
        .map(|i| (format!("/courses/42/assignments/{i}"), format!("Item {i}")))
        .collect();
    let refs: Vec<(&str, &str)> = rows.iter().map(|(h, t)| (h.as_str(), t.as_str())).collect();
    host.serve_html(COURSE_URL, assignment_index(&refs));
    for i in 1..=10 {
        host.serve_html(
            &format!("https://school.instructure.com/courses/42/assignments/{i}"),
            assignment_detail("body", true),
        );
    }
    host.hang("https://school.instructure.com/courses/42/assignments/3");
    let ctx = context(&host);
    let mut events = ctx.coordinator().subscribe();

    let id = start(&ctx, TaskKind::Assignments, COURSE_URL).await;

    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(msg) = events.recv().await {
                if progress_of(&msg, &id) == Some((2, 10)) {
                    break;
                }
            }
        }
    })
    .await;
    assert!(reached.is_ok(), "never reached 2 of 10");

    ctx.coordinator().cancel(TaskKind::Assignments).await.unwrap();
    let task = await_task(&ctx, &id).await;

    assert_eq!(task.status, TaskStatus::Cancelled);
    assert_eq!(task.progress.current, 2);
    assert_eq!(task.progress.total, 10);

    tokio::time::sleep(Duration::from_millis(50)).await;
    while let Ok(msg) = events.try_recv() {
        if let Some((current, _)) = progress_of(&msg, &id) {
            assert!(current <= 2, "progress moved past the cancel point");
        }
    }

    host.wait_until_closed().await;
    assert_eq!(host.open_tabs(), 0);
}

#[tokio::test]
async fn recordings_collect_transcripts_per_message() {
    let host = ScriptedHost::new();
    let inbox = r#"<html><body>
        <div data-testid="conversation">
            <span color="brand">Sep 3</span>
            <span data-testid="last-message-content">[Recording Available] Lecture 2</span>
            <div data-testid="open-conversation-for-12"></div>
        </div>
        <div data-testid="conversation">
            <span color="brand">Sep 5</span>
            <span data-testid="last-message-content">[Recording Available] Lecture 3</span>
            <div data-testid="open-conversation-for-13"></div>
        </div>
    </body></html>"#;
    let message = |topic: &str, url: &str| {
        format!(
            "<html><body><span>[Recording Available]\nTopic: {topic}\nHost: Dr. Smith\nRecording URL: {url}</span></body></html>"
        )
    };
    host.serve(
        INBOX_URL,
        PageScript::new(inbox)
            .click(
                ElementHandle::new(OPEN_CONVERSATION, 0),
                message("Lecture 2", "https://school.zoom.us/rec/share/r2"),
            )
            .click(
                ElementHandle::new(OPEN_CONVERSATION, 1),
                message("Lecture 3", "https://school.zoom.us/rec/share/r3"),
            ),
    );
    host.serve_html(
        "https://school.zoom.us/rec/share/r2",
        transcript_page(&[("00:01", "welcome back")]),
    );
    host.serve_html(
        "https://school.zoom.us/rec/share/r3",
        r#"<html><body><input type="password"></body></html>"#,
    );
    let ctx = context(&host);

    let id = start(&ctx, TaskKind::Recordings, INBOX_URL).await;
    let task = await_task(&ctx, &id).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.is_partial());
    let details = &task.error.as_ref().unwrap().details;
    assert_eq!(details["transcriptSuccessful"], 1);
    assert_eq!(details["courseId"], "42");

    let Some(TaskPayload::Recordings(records)) = task.result else {
        panic!("expected recordings");
    };
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].title, "Lecture 2");
    assert_eq!(records[0].date, "Sep 3");
    assert_eq!(records[0].course_id.as_deref(), Some("42"));
    assert!(matches!(
        records[0].transcript,
        Some(TranscriptStatus::Success { segment_count: 1, .. })
    ));
    assert!(matches!(
        records[1].transcript,
        Some(TranscriptStatus::Failed { recoverable: false, .. })
    ));

    host.wait_until_closed().await;
    assert_eq!(host.open_tabs(), 0);
}

#[tokio::test]
async fn inbox_without_recordings_fails() {
    let host = ScriptedHost::new();
    host.serve_html(
        INBOX_URL,
        r#"<html><body><div data-testid="conversation">
            <span data-testid="last-message-content">Office hours moved</span>
        </div></body></html>"#,
    );
    let ctx = context(&host);

    let id = start(&ctx, TaskKind::Recordings, INBOX_URL).await;
    let task = await_task(&ctx, &id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.unwrap().kind, ErrorKind::ContentNotFound);
}

#[tokio::test]
async fn active_task_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    let first: Arc<dyn TaskStore> = Arc::new(FileTaskStore::open(dir.path()).await.unwrap());
    let manager = TaskManager::new(first);
    let task = manager
        .begin(TaskKind::Assignments, COURSE_URL)
        .await
        .unwrap();
    manager
        .transition(&task.id, TaskStatus::TabOpened)
        .await
        .unwrap();
    manager
        .transition(&task.id, TaskStatus::Extracting)
        .await
        .unwrap();
    let saved = manager
        .update_progress(&task.id, Progress::new(4, 9, "Essay 4"))
        .await
        .unwrap();
    drop(manager);

    let reopened: Arc<dyn TaskStore> = Arc::new(FileTaskStore::open(dir.path()).await.unwrap());
    let manager = TaskManager::new(reopened);
    let active = manager.list_active().await.unwrap();

    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, saved.id);
    assert_eq!(active[0].status, TaskStatus::Extracting);
    assert_eq!(active[0].progress, saved.progress);

    let busy = manager.begin(TaskKind::Assignments, COURSE_URL).await;
    assert!(busy.is_err());
}

#[tokio::test]
async fn orphaned_task_is_cancelled_from_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn TaskStore> = Arc::new(FileTaskStore::open(dir.path()).await.unwrap());
    let orphan = TaskManager::new(store.clone())
        .begin(TaskKind::Transcript, REC_URL)
        .await
        .unwrap();

    let host = ScriptedHost::new();
    let ctx = context_with(&host, test_config(), store);
    let cancelled = ctx
        .coordinator()
        .cancel(TaskKind::Transcript)
        .await
        .unwrap();

    assert_eq!(cancelled.as_deref(), Some(orphan.id.as_str()));
    let task = ctx.manager().get(&orphan.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert_eq!(ctx.coordinator().cancel(TaskKind::Transcript).await.unwrap(), None);
}

#[tokio::test]
async fn oversized_timestamps_do_not_wedge_the_kind() {
    let host = ScriptedHost::new();
    host.serve_html(
        REC_URL,
        transcript_page(&[("00:05", "hello"), ("99999999:00", "impossible label")]),
    );
    let ctx = context(&host);

    let id = start(&ctx, TaskKind::Transcript, REC_URL).await;
    let task = await_task(&ctx, &id).await;
    assert_eq!(task.status, TaskStatus::Completed);
    let Some(TaskPayload::Transcript(record)) = task.result else {
        panic!("expected a transcript payload");
    };
    let seconds: Vec<u32> = record
        .transcript_segments
        .iter()
        .map(|s| s.timestamp_seconds)
        .collect();
    assert_eq!(seconds, vec![5, 6]);

    let again = start(&ctx, TaskKind::Transcript, REC_URL).await;
    assert_ne!(again, id);
    await_task(&ctx, &again).await;
}

#[tokio::test]
async fn panicking_flow_fails_and_frees_the_kind() {
    let host = ScriptedHost::new();
    host.serve_html(REC_URL, transcript_page(&[("00:05", "hello")]));
    host.panic_on(REC_URL);
    let ctx = context(&host);

    let id = start(&ctx, TaskKind::Transcript, REC_URL).await;
    let task = await_task(&ctx, &id).await;
    assert_eq!(task.status, TaskStatus::Failed);
    let failure = task.error.expect("failure recorded");
    assert_eq!(failure.kind, ErrorKind::ContentNotFound);
    assert!(!failure.recoverable);

    host.wait_until_closed().await;
    assert_eq!(host.open_tabs(), 0);

    let reply = ctx
        .coordinator()
        .handle(Message::Start {
            kind: TaskKind::Transcript,
            target: REC_URL.to_string(),
        })
        .await;
    assert!(matches!(reply, Reply::Ack { .. }), "kind still busy: {reply:?}");
}

#[tokio::test]
async fn unknown_ids_leave_no_listeners_behind() {
    let host = ScriptedHost::new();
    let ctx = context(&host);

    for i in 0..5 {
        let res = ctx.coordinator().await_result(&format!("missing-{i}")).await;
        assert!(res.is_err());
    }
    assert_eq!(ctx.coordinator().bus().listeners().pending(), 0);
}

#[tokio::test]
async fn abandoned_wait_releases_its_listener() {
    let host = ScriptedHost::new();
    host.hang(REC_URL);
    let ctx = context(&host);

    let id = start(&ctx, TaskKind::Transcript, REC_URL).await;
    let waited = tokio::time::timeout(
        Duration::from_millis(20),
        ctx.coordinator().await_result(&id),
    )
    .await;
    assert!(waited.is_err());
    assert_eq!(ctx.coordinator().bus().listeners().pending(), 0);

    ctx.coordinator().cancel(TaskKind::Transcript).await.unwrap();
    assert_eq!(await_task(&ctx, &id).await.status, TaskStatus::Cancelled);
}

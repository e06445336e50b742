use gator_core::api::{
    submittable, AppContext, ExtractionTask, GatorError, Message, Reply, TaskError, TaskKind,
    TaskStatus,
};
use tokio::sync::broadcast;

use super::cli::ScrapeArgs;
use super::render;

/// 0 on success (partial batches included), 130 when cancelled, 1 otherwise.
pub fn exit_code_for_task(task: &ExtractionTask) -> i32 {
    match task.status {
        TaskStatus::Completed => 0,
        TaskStatus::Cancelled => 130,
        _ => 1,
    }
}

pub async fn run_scrape(args: ScrapeArgs, ctx: &AppContext, json: bool) -> Result<i32, GatorError> {
    let coordinator = ctx.coordinator();
    let kind: TaskKind = args.kind.into();
    if args.submit && ctx.sink().is_none() {
        return Err(GatorError::Config(
            "--submit needs [backend] enabled = true or GATOR_BACKEND_URL".to_string(),
        ));
    }

    let mut events = coordinator.subscribe();
    let start = Message::Start {
        kind,
        target: args.url.clone(),
    };
    let id = match coordinator.handle(start).await {
        Reply::Ack { extraction_id } => extraction_id,
        Reply::Busy { kind, active_id } => return Err(TaskError::Busy { kind, active_id }.into()),
        Reply::Rejected { reason } => return Err(GatorError::Command(reason)),
        other => return Err(GatorError::Command(format!("unexpected reply: {other:?}"))),
    };
    eprintln!("started {} task {}", kind, id);

    let watched = id.clone();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(msg) if msg.extraction_id() == Some(watched.as_str()) => {
                    if let Some(line) = render::progress_line(&msg) {
                        eprintln!("{line}");
                    }
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let task = tokio::select! {
        res = coordinator.await_result(&id) => res?,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("cancelling {} task {}", kind, id);
            coordinator.cancel(kind).await?;
            coordinator.await_result(&id).await?
        }
    };
    printer.abort();

    if json {
        println!("{}", render::task_json(&task));
    } else {
        println!("{}", render::task_text(&task));
    }

    if args.submit {
        submit(ctx, &task).await?;
    }
    Ok(exit_code_for_task(&task))
}

async fn submit(ctx: &AppContext, task: &ExtractionTask) -> Result<(), GatorError> {
    let Some(sink) = ctx.sink() else {
        return Ok(());
    };
    if submittable(task).is_none() {
        eprintln!(
            "nothing to submit: task is {}",
            render::status_label(task.status)
        );
        return Ok(());
    }
    let receipt = sink.submit(task).await?;
    tracing::info!(task_id = %task.id, sink = sink.name(), endpoint = %receipt.endpoint, status = receipt.status, "result submitted");
    eprintln!("submitted to {} ({})", receipt.endpoint, receipt.status);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_status() {
        let mut task = ExtractionTask::new(TaskKind::Assignments, "u");
        task.status = TaskStatus::Completed;
        assert_eq!(exit_code_for_task(&task), 0);
        task.status = TaskStatus::Cancelled;
        assert_eq!(exit_code_for_task(&task), 130);
        task.status = TaskStatus::TimedOut;
        assert_eq!(exit_code_for_task(&task), 1);
    }
}

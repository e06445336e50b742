//! Store-side commands: listing, inspecting, cancelling and sweeping tasks.

use gator_core::api::{AppContext, GatorError, TaskKind};

use super::render;

pub async fn run_status(ctx: &AppContext, json: bool) -> Result<i32, GatorError> {
    let active = ctx.manager().list_active().await?;
    if json {
        let out = serde_json::to_string_pretty(&active).map_err(|e| GatorError::Anyhow(e.into()))?;
        println!("{out}");
        return Ok(0);
    }
    if active.is_empty() {
        println!("no active tasks");
    }
    for task in &active {
        println!("{}", render::summary_line(task));
    }
    Ok(0)
}

pub async fn run_show(ctx: &AppContext, id: &str, json: bool) -> Result<i32, GatorError> {
    let task = ctx.manager().get(id).await?;
    if json {
        println!("{}", render::task_json(&task));
    } else {
        println!("{}", render::task_text(&task));
    }
    Ok(0)
}

/// Only tasks left active by another process can be reached here; they are
/// cancelled directly in the store.
pub async fn run_cancel(ctx: &AppContext, kind: TaskKind) -> Result<i32, GatorError> {
    match ctx.coordinator().cancel(kind).await? {
        Some(id) => println!("cancelled {} task {}", kind, id),
        None => println!("no active {} task", kind),
    }
    Ok(0)
}

pub async fn run_sweep(ctx: &AppContext) -> Result<i32, GatorError> {
    let report = ctx.sweep_now().await?;
    println!(
        "removed {} tasks ({} expired, {} abandoned)",
        report.removed(),
        report.expired.len(),
        report.abandoned.len()
    );
    Ok(0)
}

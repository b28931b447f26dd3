//! `vdm list [--status <status>]` — print every task, optionally filtered.

use anyhow::Result;
use vdm_core::model::TaskStatus;

use super::StatusFilter;
use crate::cli::AppContext;

pub fn run_list(ctx: &AppContext, status: Option<StatusFilter>) -> Result<()> {
    let tasks = match status {
        Some(filter) => ctx.queue.by_status(TaskStatus::from(filter)),
        None => ctx.queue.all(),
    };
    if tasks.is_empty() {
        println!("No tasks in queue.");
        return Ok(());
    }
    println!("{:<6} {:<12} {:<7} {}", "ID", "STATUS", "PROG%", "URL");
    for task in tasks {
        println!(
            "{:<6} {:<12} {:<7.1} {}",
            task.id,
            format!("{:?}", task.status),
            task.progress,
            task.descriptor.url
        );
    }
    Ok(())
}
